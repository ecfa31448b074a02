use image::Rgba;

use crate::ocr::text::is_upper_text;
use crate::ocr::{RegionKind, TranslatedRegion};
use crate::settings::RenderConfig;

const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
const PAPER: Rgba<u8> = Rgba([245, 242, 232, 255]);
const SOFT_WHITE: Rgba<u8> = Rgba([255, 255, 255, 220]);

/// How one region is cleaned and typeset.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionStyle {
    pub kind: RegionKind,
    pub fill: Rgba<u8>,
    /// Added to the interior padding; may be negative.
    pub padding: i32,
    pub line_height: f32,
    pub font_bonus: i32,
    pub min_font: u32,
    pub wrap: bool,
    /// Paint the source text instead of the translation.
    pub keep_original: bool,
}

impl RegionStyle {
    /// Font ceiling after the style bonus, capped by the configured ceiling.
    pub fn max_font(&self, config: &RenderConfig) -> u32 {
        let bumped = config.max_font_size as i64 + self.font_bonus as i64;
        bumped.clamp(1, config.font_ceiling.max(1) as i64) as u32
    }

    /// Text handed to the layout engine.
    pub fn layout_text(&self, text: &str) -> String {
        if self.wrap {
            text.to_string()
        } else {
            text.replace(' ', "\u{a0}")
        }
    }
}

pub fn decide_style(region: &TranslatedRegion, config: &RenderConfig) -> RegionStyle {
    let mut style = RegionStyle {
        kind: RegionKind::Dialogue,
        fill: WHITE,
        padding: 0,
        line_height: config.line_height,
        font_bonus: 0,
        min_font: config.min_font_size,
        wrap: true,
        keep_original: false,
    };

    match region.region_kind {
        Some(RegionKind::Narration) => {
            style.kind = RegionKind::Narration;
            style.fill = PAPER;
            style.padding = 2;
            style.line_height = (config.line_height * 0.95).max(1.05);
            style.font_bonus = -2;
        }
        Some(RegionKind::Onomatopoeia) => apply_onomatopoeia(&mut style, config),
        _ if looks_like_onomatopoeia(&region.translated_text) => {
            apply_onomatopoeia(&mut style, config)
        }
        _ => {}
    }
    style
}

fn apply_onomatopoeia(style: &mut RegionStyle, config: &RenderConfig) {
    style.kind = RegionKind::Onomatopoeia;
    style.fill = SOFT_WHITE;
    style.padding = -1;
    style.line_height = (config.line_height * 0.9).max(1.0);
    style.font_bonus = 6;
    style.wrap = false;
    style.keep_original = true;
}

/// Short shouted text: all caps within eight characters, or at most two
/// purely alphabetic uppercase words.
pub fn looks_like_onomatopoeia(text: &str) -> bool {
    let cleaned = text.trim();
    if cleaned.is_empty() {
        return false;
    }
    if is_upper_text(cleaned) && cleaned.chars().count() <= 8 {
        return true;
    }
    cleaned.split_whitespace().count() <= 2
        && cleaned.chars().all(char::is_alphabetic)
        && is_upper_text(cleaned)
}
