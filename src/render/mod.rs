mod font;
mod layout;
mod mask;
mod paint;
mod rect;
mod style;

use anyhow::{Context, Result, bail};
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::PageError;
use crate::ocr::TranslatedRegion;
use crate::settings::RenderConfig;
use crate::translator::{Retranslate, Summarizer, clamp_to_budget};

pub use font::{FontBook, FontMetrics, load_font_metrics};
pub use layout::{LayoutResult, check_overflow, fit_to_box, measure_block, truncate_to_fit, wrap};
pub use mask::{
    CleanPass, build_balloon_mask, clean_region, crop_luma, dark_ratio, edge_density,
    has_residual_text,
};
pub use paint::{PlacedBlock, PlacedLine, paint_blocks};
pub use rect::{PixelRect, axis_padding};
pub use style::{RegionStyle, decide_style, looks_like_onomatopoeia};

const ENGLISH_HINTS: [&str; 23] = [
    "the", "and", "of", "you", "i", "my", "your", "is", "are", "was", "were", "when", "what",
    "who", "hello", "hi", "why", "where", "how", "brother", "sister", "long", "time",
];
const TOKEN_TRIM: &[char] = &[
    '.', ',', ';', ':', '!', '?', '¡', '¿', '(', ')', '[', ']', '{', '}', '"', '\'',
];

/// Counters of one render call, plus every layout that was attempted to
/// completion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RenderMetrics {
    pub overflow_count: usize,
    pub retry_count: usize,
    pub cleanup_retry_count: usize,
    pub untranslated_skip_count: usize,
    pub overflow_skip_count: usize,
    pub min_font_hit_count: usize,
    pub summarize_triggered_count: usize,
    pub region_error_count: usize,
    pub layouts: Vec<LayoutResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderResult {
    pub output_image: PathBuf,
    #[serde(flatten)]
    pub metrics: RenderMetrics,
}

/// Cleans source lettering out of balloons and paints translations back.
pub struct RenderEngine {
    config: RenderConfig,
    fonts: FontBook,
    retranslator: Option<Arc<dyn Retranslate>>,
    summarizer: Option<Arc<dyn Summarizer>>,
}

impl RenderEngine {
    pub fn new(config: RenderConfig) -> Result<Self> {
        let fonts = FontBook::from_config(&config)?;
        Ok(Self::with_fonts(config, fonts))
    }

    pub fn with_fonts(config: RenderConfig, fonts: FontBook) -> Self {
        Self {
            config,
            fonts,
            retranslator: None,
            summarizer: None,
        }
    }

    pub fn with_retranslator(mut self, retranslator: Arc<dyn Retranslate>) -> Self {
        self.retranslator = Some(retranslator);
        self
    }

    pub fn with_summarizer(mut self, summarizer: Arc<dyn Summarizer>) -> Self {
        self.summarizer = Some(summarizer);
        self
    }

    /// Renders `regions` onto the image at `input` and saves the result, by
    /// default as `<stem>_translated.png` next to the input.
    pub fn render_page(
        &self,
        input: &Path,
        regions: &[TranslatedRegion],
        output: Option<&Path>,
    ) -> Result<RenderResult> {
        if !input.exists() {
            return Err(PageError::ImageNotFound(input.to_path_buf()).into());
        }
        let page = image::open(input)
            .with_context(|| format!("failed to decode image: {}", input.display()))?
            .to_rgba8();

        let (painted, metrics) = self.render_image(page, regions)?;

        let output_image = match output {
            Some(path) => path.to_path_buf(),
            None => default_output_path(input),
        };
        painted
            .save(&output_image)
            .with_context(|| format!("failed to save image: {}", output_image.display()))?;
        info!(
            "render: {} regions, {} painted, saved {}",
            regions.len(),
            metrics.layouts.len().saturating_sub(metrics.overflow_skip_count),
            output_image.display()
        );
        Ok(RenderResult {
            output_image,
            metrics,
        })
    }

    /// Renders in memory. Regions are cleaned one by one; text is painted
    /// in a single pass once every balloon is clean.
    pub fn render_image(
        &self,
        mut page: RgbaImage,
        regions: &[TranslatedRegion],
    ) -> Result<(RgbaImage, RenderMetrics)> {
        let mut metrics = RenderMetrics::default();
        let mut blocks = Vec::new();

        for region in regions {
            match self.render_region(&mut page, region, &mut metrics) {
                Ok(Some(block)) => blocks.push(block),
                Ok(None) => {}
                Err(err) => {
                    metrics.region_error_count += 1;
                    warn!("render: region {} failed: {:#}", region.id, err);
                }
            }
        }

        if !blocks.is_empty() && !self.fonts.can_paint() {
            warn!("render: layout-only font book, {} blocks left unpainted", blocks.len());
        }
        let painted = paint_blocks(&page, &blocks, &self.fonts)?;
        Ok((painted, metrics))
    }

    fn render_region(
        &self,
        page: &mut RgbaImage,
        region: &TranslatedRegion,
        metrics: &mut RenderMetrics,
    ) -> Result<Option<PlacedBlock>> {
        let config = &self.config;
        let style = decide_style(region, config);

        let mut text = region.translated_text.clone();
        if looks_untranslated(&text) {
            text = self.retry_translation(region);
            if looks_untranslated(&text) {
                metrics.untranslated_skip_count += 1;
                warn!("render: skipping region {}: text looks untranslated", region.id);
                return Ok(None);
            }
        }
        if style.keep_original {
            text = region.original_text.clone();
        }

        let (page_w, page_h) = page.dimensions();
        if page_w == 0 || page_h == 0 {
            bail!("page has no pixels");
        }
        let outer = PixelRect::from_normalized(&region.bbox, page_w, page_h).grow_to_min(
            config.min_render_size_px,
            page_w,
            page_h,
        );
        let pad_x = axis_padding(outer.width(), config.padding_px, style.padding);
        let pad_y = axis_padding(outer.height(), config.padding_px, style.padding);
        let area = outer.inset(pad_x, pad_y);
        if area.is_empty() {
            bail!("box collapsed to nothing after padding");
        }

        let mask = build_balloon_mask(page, area, config.mask_tolerance);
        let before = crop_luma(page, area);
        clean_region(page, area, mask.as_ref(), style.fill, CleanPass::FIRST);
        let after = crop_luma(page, area);
        if has_residual_text(&before, &after) {
            metrics.cleanup_retry_count += 1;
            debug!("render: region {} still shows lettering, cleaning again", region.id);
            clean_region(page, area, mask.as_ref(), style.fill, CleanPass::RETRY);
        }

        let box_w = area.width();
        let box_h = area.height();
        let padding = pad_x.min(pad_y);
        let inner_w = box_w.saturating_sub(padding * 2).max(1);
        let inner_h = box_h.saturating_sub(padding * 2).max(1);
        let max_font = style.max_font(config);
        let min_font = config.min_font_size.max(style.min_font);
        let fonts = &self.fonts;

        let mut layout = fit_to_box(
            &style.layout_text(&text),
            inner_w,
            inner_h,
            fonts,
            max_font,
            min_font,
            style.line_height,
        );
        let mut overflow = check_overflow(&layout, box_w, box_h, padding);

        if overflow || !layout.fits {
            metrics.overflow_count += 1;
            metrics.retry_count += 1;
            layout = fit_to_box(
                &normalize_text(&text),
                inner_w,
                inner_h,
                fonts,
                layout.font_size.min(config.max_font_size.saturating_sub(1)),
                config.min_font_size.max(layout.font_size.saturating_sub(2)),
                (config.line_height * 0.95).max(1.1),
            );
            overflow = check_overflow(&layout, box_w, box_h, padding);
        }

        if layout.font_size < config.min_readable_font {
            metrics.min_font_hit_count += 1;
        }

        if let Some(summarizer) = self.summarizer.as_ref() {
            let wants_summary = overflow || layout.font_size < config.min_readable_font;
            if wants_summary
                && !style.keep_original
                && text.chars().count() > config.summary_min_delta
            {
                let budget = self.summary_budget(box_w, box_h);
                match summarizer.shorten(&region.original_text, &text, budget) {
                    Ok(shortened) => {
                        metrics.summarize_triggered_count += 1;
                        text = clamp_to_budget(&shortened, budget);
                        debug!("render: region {} shortened to {} chars", region.id, budget);
                        layout = fit_to_box(
                            &style.layout_text(&text),
                            inner_w,
                            inner_h,
                            fonts,
                            max_font,
                            min_font,
                            style.line_height,
                        );
                        overflow = check_overflow(&layout, box_w, box_h, padding);
                    }
                    Err(err) => {
                        warn!("render: could not shorten region {}: {:#}", region.id, err)
                    }
                }
            }
        }

        if overflow && layout.font_size <= config.min_font_size {
            layout = truncate_to_fit(&layout, inner_w, inner_h, fonts);
            overflow = check_overflow(&layout, box_w, box_h, padding);
        }

        metrics.layouts.push(layout.clone());
        if overflow || !layout.fits {
            metrics.overflow_skip_count += 1;
            warn!(
                "render: skipping region {}: {}x{} block overflows {}x{} box",
                region.id, layout.block_width, layout.block_height, box_w, box_h
            );
            return Ok(None);
        }

        Ok(Some(self.place(&layout, area)))
    }

    fn summary_budget(&self, box_w: u32, box_h: u32) -> usize {
        let config = &self.config;
        let by_area = (box_w as usize * box_h as usize) / config.min_readable_font.max(1) as usize;
        config
            .summary_max_chars
            .min(by_area)
            .max(config.summary_min_delta)
    }

    fn retry_translation(&self, region: &TranslatedRegion) -> String {
        let Some(retranslator) = self.retranslator.as_ref() else {
            return region.translated_text.clone();
        };
        if region.original_text.trim().is_empty() {
            return region.translated_text.clone();
        }
        match retranslator.retranslate(&region.original_text) {
            Ok(text) => text,
            Err(err) => {
                warn!("render: retranslation of {} failed: {:#}", region.id, err);
                region.translated_text.clone()
            }
        }
    }

    /// Centers the block in `area` and each line within the block.
    fn place(&self, layout: &LayoutResult, area: PixelRect) -> PlacedBlock {
        let size = layout.font_size as f32;
        let block_x = area.x1 + area.width().saturating_sub(layout.block_width) / 2;
        let block_y = area.y1 + area.height().saturating_sub(layout.block_height) / 2;
        let lines = layout
            .lines
            .iter()
            .enumerate()
            .map(|(idx, text)| {
                let line_w = self.fonts.measure(text, size);
                let offset = ((layout.block_width as f32 - line_w) / 2.0).max(0.0).floor();
                PlacedLine {
                    text: text.clone(),
                    x: block_x as f32 + offset,
                    top: block_y as f32 + idx as f32 * layout.line_height,
                }
            })
            .collect();
        PlacedBlock {
            font_size: layout.font_size,
            lines,
        }
    }
}

fn default_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_else(|| "page".to_string());
    input.with_file_name(format!("{}_translated.png", stem))
}

/// Collapses whitespace runs, no-break spaces included, to single spaces.
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Heuristic for text that still reads as English: common English words
/// make up at least 35% of the alphabetic tokens, or 20% when most tokens
/// are plain ASCII.
pub fn looks_untranslated(text: &str) -> bool {
    let tokens: Vec<String> = text
        .split_whitespace()
        .map(|token| token.trim_matches(TOKEN_TRIM).to_lowercase())
        .filter(|token| token.chars().any(char::is_alphabetic))
        .collect();
    if tokens.is_empty() {
        return false;
    }
    let total = tokens.len() as f32;
    let hits = tokens
        .iter()
        .filter(|token| ENGLISH_HINTS.contains(&token.as_str()))
        .count() as f32;
    let ascii = tokens.iter().filter(|token| token.is_ascii()).count() as f32;
    let english_ratio = hits / total;
    english_ratio >= 0.35 || (english_ratio >= 0.2 && ascii / total > 0.6)
}
