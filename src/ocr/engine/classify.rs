use serde::{Deserialize, Serialize};

use crate::settings::ConsolidationConfig;

use super::geom::NormalizedBBox;
use super::text::{
    char_ratio, has_lowercase, is_repeated_char, is_symbol_noise, is_upper_text, non_alnum_ratio,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionClass {
    Dialogue,
    NonDialogue,
    Unknown,
}

const DIALOGUE_PUNCTUATION: [char; 4] = ['?', '!', '…', '—'];

/// Decides whether a detection reads like dialogue or like page furniture.
///
/// Rules are checked in order and the first match wins. The classifier only
/// answers `NonDialogue` when the evidence is strong: anything ambiguous is
/// `Unknown` and left to the caller.
pub fn classify_region(
    text: &str,
    bbox: &NormalizedBBox,
    confidence: Option<f32>,
    page_w: u32,
    page_h: u32,
    config: &ConsolidationConfig,
) -> RegionClass {
    let cleaned = text.trim();
    if cleaned.is_empty() {
        return RegionClass::NonDialogue;
    }
    if confidence.is_some_and(|conf| conf < config.classifier_min_confidence) {
        return RegionClass::NonDialogue;
    }

    let area_ratio = bbox.area_ratio();
    if area_ratio <= 0.0
        || area_ratio < config.min_area_ratio * 0.5
        || area_ratio > config.max_area_ratio
    {
        return RegionClass::NonDialogue;
    }
    if bbox.width_px(page_w) < config.min_width_px as f32
        || bbox.height_px(page_h) < config.min_height_px as f32
    {
        return RegionClass::NonDialogue;
    }

    if is_symbol_noise(cleaned) || is_repeated_char(cleaned) {
        return RegionClass::NonDialogue;
    }

    let digit_ratio = char_ratio(cleaned, |ch| ch.is_ascii_digit());
    let symbol_ratio = non_alnum_ratio(cleaned);
    if digit_ratio > 0.6 || symbol_ratio > 0.6 {
        return RegionClass::NonDialogue;
    }
    let length = cleaned.chars().count();
    if length <= 2 && symbol_ratio > 0.0 {
        return RegionClass::NonDialogue;
    }
    // page numbers, short SFX
    if is_upper_text(cleaned) && length <= 4 {
        return RegionClass::NonDialogue;
    }

    let word_count = cleaned.split_whitespace().count();
    let has_lower = has_lowercase(cleaned);
    if word_count >= 4 && has_lower {
        return RegionClass::Dialogue;
    }
    if has_lower && cleaned.contains(DIALOGUE_PUNCTUATION) {
        return RegionClass::Dialogue;
    }
    let ascii_letter_ratio = char_ratio(cleaned, |ch| ch.is_ascii_alphabetic());
    if ascii_letter_ratio > 0.4 && has_lower && word_count >= 2 {
        return RegionClass::Dialogue;
    }

    RegionClass::Unknown
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(text: &str, bbox: NormalizedBBox, confidence: f32) -> RegionClass {
        classify_region(
            text,
            &bbox,
            Some(confidence),
            1000,
            1000,
            &ConsolidationConfig::default(),
        )
    }

    fn mid_bbox() -> NormalizedBBox {
        NormalizedBBox::new(0.1, 0.1, 0.2, 0.2)
    }

    fn dialogue_bbox() -> NormalizedBBox {
        NormalizedBBox::new(0.3, 0.3, 0.6, 0.35)
    }

    #[test]
    fn digits_and_short_sfx_are_noise() {
        assert_eq!(classify("33 1103", mid_bbox(), 0.9), RegionClass::NonDialogue);
        assert_eq!(classify("BAM!", mid_bbox(), 0.9), RegionClass::NonDialogue);
        assert_eq!(classify("?!", mid_bbox(), 0.9), RegionClass::NonDialogue);
        assert_eq!(classify("zzzz", mid_bbox(), 0.9), RegionClass::NonDialogue);
    }

    #[test]
    fn only_ascii_digits_count_as_digits() {
        assert_eq!(
            classify("½½½½½½½ ok", dialogue_bbox(), 0.9),
            RegionClass::Unknown
        );
        assert_eq!(
            classify("ⅫⅫⅫⅫⅫⅫⅫ ok", dialogue_bbox(), 0.9),
            RegionClass::Unknown
        );
    }

    #[test]
    fn low_confidence_and_geometry_are_noise() {
        assert_eq!(
            classify("Hello, are you ok?", dialogue_bbox(), 0.2),
            RegionClass::NonDialogue
        );
        let sliver = NormalizedBBox::new(0.1, 0.1, 0.5, 0.105);
        assert_eq!(
            classify("Hello, are you ok?", sliver, 0.9),
            RegionClass::NonDialogue
        );
        let huge = NormalizedBBox::new(0.0, 0.0, 0.9, 0.9);
        assert_eq!(
            classify("Hello, are you ok?", huge, 0.9),
            RegionClass::NonDialogue
        );
    }

    #[test]
    fn prose_is_dialogue() {
        assert_eq!(
            classify("Hello, are you ok?", dialogue_bbox(), 0.9),
            RegionClass::Dialogue
        );
        assert_eq!(classify("Wait!", dialogue_bbox(), 0.9), RegionClass::Dialogue);
        assert_eq!(
            classify("see you", dialogue_bbox(), 0.9),
            RegionClass::Dialogue
        );
    }

    #[test]
    fn ambiguous_text_stays_unknown() {
        let class = classify("THE NOT WAY?", dialogue_bbox(), 0.6);
        assert!(matches!(class, RegionClass::Unknown | RegionClass::Dialogue));
        assert_eq!(classify("KABOOM", dialogue_bbox(), 0.9), RegionClass::Unknown);
    }
}
