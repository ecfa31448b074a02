mod classify;
mod filter;
mod geom;
mod group;
mod merge;
mod parse;
pub(crate) mod text;

use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::cache::{BlobStore, key_hash};
use crate::error::PageError;
use crate::ocr::{Consolidation, ConsolidationMetrics, RawPage, TextDetector, TextRegion};
use crate::settings::ConsolidationConfig;

pub use classify::{RegionClass, classify_region};
pub use geom::{
    NormalizedBBox, axis_gap_px, x_gap_px, x_overlap_ratio, y_gap_px, y_overlap_ratio,
};
pub use parse::regions_from_detections;

const CACHE_NAMESPACE: &str = "ocr";
const READING_BUCKET_PX: f32 = 4.0;

/// Turns raw word/paragraph detections into ordered per-balloon regions.
///
/// The engine holds no per-call state: every call returns its own
/// [`ConsolidationMetrics`], so one instance can serve concurrent pages.
#[derive(Clone)]
pub struct ConsolidationEngine {
    config: ConsolidationConfig,
    cache: Option<Arc<dyn BlobStore>>,
}

impl ConsolidationEngine {
    pub fn new(config: ConsolidationConfig) -> Self {
        Self {
            config,
            cache: None,
        }
    }

    pub fn with_cache(mut self, cache: Arc<dyn BlobStore>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn config(&self) -> &ConsolidationConfig {
        &self.config
    }

    /// Consolidates the detections of one page image, reusing a cached result
    /// for identical image bytes so the detector is not called again.
    pub fn consolidate_image(
        &self,
        image_bytes: &[u8],
        detector: &dyn TextDetector,
    ) -> Result<Consolidation> {
        let cache_key = format!("{}:{}", CACHE_NAMESPACE, key_hash(image_bytes));
        if let Some(mut cached) = self.load_cached(&cache_key) {
            info!("ocr: cache hit ({} regions)", cached.regions.len());
            cached.metrics.cache_hit = true;
            return Ok(cached);
        }

        let page = detector
            .detect(image_bytes)
            .map_err(|err| PageError::Detection(format!("{:#}", err)))?;
        let consolidation = self.consolidate(&page);
        self.store_cached(&cache_key, &consolidation);
        Ok(consolidation)
    }

    /// Consolidates raw pixel-space detections of a page.
    pub fn consolidate(&self, page: &RawPage) -> Consolidation {
        let (raw_regions, invalid) =
            regions_from_detections(&page.detections, page.width, page.height);
        let mut consolidation = self.consolidate_regions(&raw_regions, page.width, page.height);
        consolidation.metrics.invalid_bbox_count = invalid;
        consolidation
    }

    /// Consolidates already-normalized regions, with the fallback pass when the
    /// first pass looks implausibly sparse.
    pub fn consolidate_regions(
        &self,
        raw_regions: &[TextRegion],
        page_w: u32,
        page_h: u32,
    ) -> Consolidation {
        let primary = self.post_process(raw_regions, page_w, page_h, false);
        if !self.config.enable_fallback
            || raw_regions.is_empty()
            || !self.should_retry(raw_regions, &primary.regions)
        {
            return primary;
        }

        info!(
            "ocr: sparse first pass ({} raw, {} kept); retrying with loosened filters",
            raw_regions.len(),
            primary.regions.len()
        );
        let mut fallback = self.post_process(raw_regions, page_w, page_h, true);
        fallback.metrics.fallback_used = true;
        fallback
    }

    /// One full pass: lines, blocks, filter, merge, reading order.
    pub fn post_process(
        &self,
        regions: &[TextRegion],
        page_w: u32,
        page_h: u32,
        fallback: bool,
    ) -> Consolidation {
        let mut metrics = ConsolidationMetrics {
            regions_detected_raw: regions.len(),
            ..ConsolidationMetrics::default()
        };
        if regions.is_empty() {
            return Consolidation {
                regions: Vec::new(),
                metrics,
            };
        }

        let lines = group::group_by_lines(regions, page_w, page_h, &self.config);
        metrics.regions_after_line_grouping = lines.len();

        let blocks = group::group_lines_into_blocks(&lines, page_h, &self.config);
        metrics.regions_after_paragraph_grouping = blocks.len();

        let filtered = filter::filter_regions(blocks, page_w, page_h, &self.config, fallback);
        metrics.regions_after_filter = filtered.kept.len();
        metrics.discarded_region_count = filtered.discarded;

        let mut merged = merge::merge_nearby_regions(filtered.kept, page_w, page_h, &self.config);
        metrics.regions_after_merge = merged.len();
        metrics.merged_region_count = metrics.regions_after_filter.saturating_sub(merged.len());

        sort_reading_order(&mut merged, page_h);
        debug!(
            "ocr: raw={} lines={} blocks={} filtered={} merged={} fallback={}",
            metrics.regions_detected_raw,
            metrics.regions_after_line_grouping,
            metrics.regions_after_paragraph_grouping,
            metrics.regions_after_filter,
            metrics.regions_after_merge,
            fallback
        );

        Consolidation {
            regions: merged,
            metrics,
        }
    }

    fn should_retry(&self, raw: &[TextRegion], processed: &[TextRegion]) -> bool {
        if raw.len() <= 2 || processed.is_empty() {
            return true;
        }

        let raw_text = raw
            .iter()
            .filter(|region| !region.text.is_empty())
            .map(|region| region.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        let total_chars = raw_text.chars().count();
        let ascii_letters = raw_text
            .chars()
            .filter(|ch| ch.is_ascii_alphabetic())
            .count();

        if raw.len() < 5 && total_chars < 25 {
            return true;
        }
        if processed.len() < 2 && ascii_letters > 0 && total_chars < 40 {
            return true;
        }

        let avg_area =
            raw.iter().map(|region| region.bbox.area_ratio()).sum::<f32>() / raw.len() as f32;
        avg_area < self.config.min_area_ratio * 0.75
    }

    fn load_cached(&self, key: &str) -> Option<Consolidation> {
        let cache = self.cache.as_ref()?;
        let blob = cache.get(key)?;
        match serde_json::from_slice::<Consolidation>(&blob) {
            Ok(cached) => Some(cached),
            Err(err) => {
                warn!("ocr: ignoring unreadable cache entry {}: {}", key, err);
                None
            }
        }
    }

    fn store_cached(&self, key: &str, consolidation: &Consolidation) {
        let Some(cache) = self.cache.as_ref() else {
            return;
        };
        let stored = match serde_json::to_vec(consolidation) {
            Ok(bytes) => cache.set(key, &bytes),
            Err(err) => Err(err.into()),
        };
        if let Err(err) = stored {
            warn!("ocr: failed to cache {}: {:#}", key, err);
        }
    }
}

/// Top-to-bottom in coarse 4px bands, left-to-right inside a band.
fn sort_reading_order(regions: &mut [TextRegion], page_h: u32) {
    regions.sort_by(|a, b| {
        let band_a = (a.bbox.y_min * page_h as f32 / READING_BUCKET_PX).floor();
        let band_b = (b.bbox.y_min * page_h as f32 / READING_BUCKET_PX).floor();
        band_a
            .total_cmp(&band_b)
            .then(a.bbox.x_min.total_cmp(&b.bbox.x_min))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(text: &str, bbox: NormalizedBBox) -> TextRegion {
        TextRegion {
            id: text.to_string(),
            text: text.to_string(),
            bbox,
            confidence: Some(0.9),
        }
    }

    #[test]
    fn reading_order_uses_coarse_bands() {
        let mut regions = vec![
            region("right", NormalizedBBox::new(0.6, 0.1010, 0.8, 0.15)),
            region("below", NormalizedBBox::new(0.1, 0.3, 0.3, 0.35)),
            region("left", NormalizedBBox::new(0.1, 0.1015, 0.3, 0.15)),
        ];
        sort_reading_order(&mut regions, 1000);
        let order: Vec<&str> = regions.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(order, vec!["left", "right", "below"]);
    }

    #[test]
    fn sparse_pages_trigger_fallback() {
        let engine = ConsolidationEngine::new(ConsolidationConfig::default());
        let raw = vec![region("Hi", NormalizedBBox::new(0.1, 0.1, 0.13, 0.12))];
        assert!(engine.should_retry(&raw, &[]));
    }

    #[test]
    fn dense_pages_skip_fallback() {
        let engine = ConsolidationEngine::new(ConsolidationConfig::default());
        let raw: Vec<TextRegion> = (0..6)
            .map(|i| {
                let y = 0.1 + i as f32 * 0.1;
                region(
                    "plenty of words here",
                    NormalizedBBox::new(0.1, y, 0.4, y + 0.03),
                )
            })
            .collect();
        assert!(!engine.should_retry(&raw, &raw[..3]));
    }

    #[test]
    fn disabled_fallback_keeps_first_pass() {
        let config = ConsolidationConfig {
            enable_fallback: false,
            ..ConsolidationConfig::default()
        };
        let engine = ConsolidationEngine::new(config);
        let raw = vec![region("Hi", NormalizedBBox::new(0.1, 0.1, 0.13, 0.12))];
        let result = engine.consolidate_regions(&raw, 1000, 1000);
        assert!(!result.metrics.fallback_used);
        assert!(result.regions.is_empty());
    }
}
