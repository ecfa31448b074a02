use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::cache::{BlobStore, key_hash};
use crate::ocr::{RegionKind, TextRegion, TranslatedRegion};

const CACHE_NAMESPACE: &str = "tr";
const SUMMARY_MARK: char = '…';

/// A translation service; no network implementation ships with the crate.
pub trait TranslationBackend: Send + Sync {
    /// Translates every text in one request; the result must keep order and length.
    fn translate_batch(&self, texts: &[String], source: &str, target: &str) -> Result<Vec<String>>;

    fn translate_text(&self, text: &str, target: &str) -> Result<String>;

    /// Shortens a translation to roughly `max_chars`.
    fn shorten(&self, _original: &str, current: &str, max_chars: usize) -> Result<String> {
        Ok(heuristic_shorten(current, max_chars))
    }
}

/// Direct, single-text translation used when a rendered text still reads
/// as untranslated.
pub trait Retranslate: Send + Sync {
    fn retranslate(&self, original: &str) -> Result<String>;
}

/// Shortens a translation that does not fit its balloon.
pub trait Summarizer: Send + Sync {
    fn shorten(&self, original: &str, current: &str, max_chars: usize) -> Result<String>;
}

/// Cuts at the last word boundary within the budget.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicSummarizer;

impl Summarizer for HeuristicSummarizer {
    fn shorten(&self, _original: &str, current: &str, max_chars: usize) -> Result<String> {
        Ok(heuristic_shorten(current, max_chars))
    }
}

pub fn heuristic_shorten(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let head: String = text.chars().take(max_chars.saturating_sub(1)).collect();
    let shortened = head
        .rsplit_once(' ')
        .map(|(before, _)| before)
        .unwrap_or(&head)
        .trim();
    if shortened.is_empty() {
        let cut: String = text.chars().take(max_chars).collect();
        return format!("{}{}", cut.trim_end(), SUMMARY_MARK);
    }
    format!("{}{}", shortened, SUMMARY_MARK)
}

/// Hard limit for summaries coming back from a backend.
pub fn clamp_to_budget(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    format!("{}{}", cut.trim_end(), SUMMARY_MARK)
}

/// Short sound effects that are left untranslated.
pub fn is_sound_effect(text: &str) -> bool {
    let cleaned = text.trim();
    if cleaned.is_empty() || cleaned.split_whitespace().count() > 2 {
        return false;
    }
    let length = cleaned.chars().count();
    if length <= 7 && crate::ocr::text::is_upper_text(cleaned) {
        return true;
    }
    cleaned.contains(['!', '?']) && length <= 10
}

/// Backend wrapper caching every translation by content hash.
pub struct CachedTranslator<B: TranslationBackend> {
    backend: B,
    cache: Arc<dyn BlobStore>,
    source_lang: String,
    target_lang: String,
}

impl<B: TranslationBackend> CachedTranslator<B> {
    pub fn new(
        backend: B,
        cache: Arc<dyn BlobStore>,
        source_lang: impl Into<String>,
        target_lang: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            cache,
            source_lang: source_lang.into(),
            target_lang: target_lang.into(),
        }
    }

    fn cache_key(&self, text: &str) -> String {
        format!(
            "{}:{}:{}",
            CACHE_NAMESPACE,
            self.target_lang,
            key_hash(text.as_bytes())
        )
    }

    fn cached(&self, text: &str) -> Option<String> {
        let blob = self.cache.get(&self.cache_key(text))?;
        String::from_utf8(blob).ok()
    }

    fn remember(&self, text: &str, translated: &str) {
        if let Err(err) = self.cache.set(&self.cache_key(text), translated.as_bytes()) {
            warn!("translate: failed to cache translation: {:#}", err);
        }
    }

    /// Single text through the cache.
    pub fn translate_text_cached(&self, text: &str) -> Result<String> {
        if let Some(hit) = self.cached(text) {
            return Ok(hit);
        }
        let translated = self.backend.translate_text(text, &self.target_lang)?;
        self.remember(text, &translated);
        Ok(translated)
    }

    /// Translates regions with one batch call for every cache miss. A
    /// failed batch falls back to per-text calls, and a failed text keeps
    /// its source.
    pub fn translate_regions(&self, regions: &[TextRegion]) -> Vec<TranslatedRegion> {
        let mut translations: Vec<Option<String>> = vec![None; regions.len()];
        let mut kinds: Vec<Option<RegionKind>> = vec![None; regions.len()];
        let mut missing: Vec<usize> = Vec::new();

        for (idx, region) in regions.iter().enumerate() {
            if is_sound_effect(&region.text) {
                translations[idx] = Some(region.text.clone());
                kinds[idx] = Some(RegionKind::Onomatopoeia);
            } else if let Some(hit) = self.cached(&region.text) {
                translations[idx] = Some(hit);
            } else {
                missing.push(idx);
            }
        }

        if !missing.is_empty() {
            let texts: Vec<String> = missing.iter().map(|idx| regions[*idx].text.clone()).collect();
            match self.translate_batch_checked(&texts) {
                Ok(batch) => {
                    for (idx, translated) in missing.iter().zip(batch) {
                        self.remember(&regions[*idx].text, &translated);
                        translations[*idx] = Some(translated);
                    }
                }
                Err(err) => {
                    warn!(
                        "translate: batch of {} failed, translating one by one: {:#}",
                        texts.len(),
                        err
                    );
                    for idx in &missing {
                        let text = &regions[*idx].text;
                        match self.translate_text_cached(text) {
                            Ok(translated) => translations[*idx] = Some(translated),
                            Err(err) => warn!(
                                "translate: keeping source for {}: {:#}",
                                regions[*idx].id, err
                            ),
                        }
                    }
                }
            }
        }

        regions
            .iter()
            .zip(translations)
            .zip(kinds)
            .map(|((region, translated), region_kind)| TranslatedRegion {
                id: region.id.clone(),
                original_text: region.text.clone(),
                translated_text: translated
                    .filter(|text| !text.is_empty())
                    .unwrap_or_else(|| region.text.clone()),
                bbox: region.bbox,
                confidence: region.confidence,
                region_kind,
            })
            .collect()
    }

    fn translate_batch_checked(&self, texts: &[String]) -> Result<Vec<String>> {
        let batch = self
            .backend
            .translate_batch(texts, &self.source_lang, &self.target_lang)?;
        if batch.len() != texts.len() {
            anyhow::bail!(
                "batch returned {} translations for {} texts",
                batch.len(),
                texts.len()
            );
        }
        debug!("translate: batch of {} translated", texts.len());
        Ok(batch)
    }
}

impl<B: TranslationBackend> Retranslate for CachedTranslator<B> {
    fn retranslate(&self, original: &str) -> Result<String> {
        let translated = self.backend.translate_text(original, &self.target_lang)?;
        self.remember(original, &translated);
        Ok(translated)
    }
}

impl<B: TranslationBackend> Summarizer for CachedTranslator<B> {
    fn shorten(&self, original: &str, current: &str, max_chars: usize) -> Result<String> {
        let current = current.trim();
        if current.chars().count() <= max_chars {
            return Ok(current.to_string());
        }
        let shortened = self.backend.shorten(original, current, max_chars)?;
        Ok(clamp_to_budget(&shortened, max_chars))
    }
}
