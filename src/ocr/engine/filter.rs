use crate::ocr::TextRegion;
use crate::settings::ConsolidationConfig;

use super::classify::{RegionClass, classify_region};
use super::text::{is_repeated_char, is_symbol_noise, non_alnum_ratio};

pub(super) struct FilterOutcome {
    pub(super) kept: Vec<TextRegion>,
    pub(super) discarded: usize,
}

/// Thresholds in effect for one pass; the fallback pass loosens the
/// confidence floor and the minimum area.
struct FilterThresholds {
    min_confidence: f32,
    min_area_ratio: f32,
}

impl FilterThresholds {
    fn for_pass(config: &ConsolidationConfig, fallback: bool) -> Self {
        if fallback {
            Self {
                min_confidence: config.min_confidence * config.fallback_confidence_factor,
                min_area_ratio: config.min_area_ratio * config.fallback_area_factor,
            }
        } else {
            Self {
                min_confidence: config.min_confidence,
                min_area_ratio: config.min_area_ratio,
            }
        }
    }
}

pub(super) fn filter_regions(
    regions: Vec<TextRegion>,
    page_w: u32,
    page_h: u32,
    config: &ConsolidationConfig,
    fallback: bool,
) -> FilterOutcome {
    let thresholds = FilterThresholds::for_pass(config, fallback);
    let mut kept = Vec::with_capacity(regions.len());
    let mut discarded = 0usize;

    for region in regions {
        if is_region_valid(&region, page_w, page_h, config, &thresholds) {
            kept.push(region);
        } else {
            discarded += 1;
        }
    }

    FilterOutcome { kept, discarded }
}

fn is_region_valid(
    region: &TextRegion,
    page_w: u32,
    page_h: u32,
    config: &ConsolidationConfig,
    thresholds: &FilterThresholds,
) -> bool {
    let text = region.text.trim();
    if text.chars().count() < 3 {
        return false;
    }

    let confidence = region.confidence.unwrap_or(1.0);
    if confidence < thresholds.min_confidence {
        return false;
    }

    let bbox = &region.bbox;
    let area_ratio = bbox.area_ratio();
    if area_ratio < thresholds.min_area_ratio || area_ratio > config.max_area_ratio {
        return false;
    }
    if bbox.width_px(page_w) < config.min_width_px as f32
        || bbox.height_px(page_h) < config.min_height_px as f32
    {
        return false;
    }

    if is_symbol_noise(text) || is_repeated_char(text) {
        return false;
    }
    if non_alnum_ratio(text) > 0.6 {
        return false;
    }

    if config.filter_non_dialogue {
        let class = classify_region(text, bbox, Some(confidence), page_w, page_h, config);
        if class == RegionClass::NonDialogue {
            return false;
        }
    }
    true
}
