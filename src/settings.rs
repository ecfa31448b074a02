use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

const DEFAULT_SETTINGS_TOML: &str = include_str!("../settings.toml");
const HOME_DIR_NAME: &str = ".comic-translator-rust";

/// Thresholds of the OCR consolidation pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsolidationConfig {
    pub min_confidence: f32,
    pub classifier_min_confidence: f32,
    pub min_area_ratio: f32,
    pub max_area_ratio: f32,
    pub min_width_px: u32,
    pub min_height_px: u32,
    pub line_tolerance_px: u32,
    pub block_gap_px: u32,
    pub min_x_overlap_ratio: f32,
    pub merge_gap_px: u32,
    pub merge_min_overlap_ratio: f32,
    pub merge_max_area_growth_ratio: f32,
    pub merge_min_height_ratio: f32,
    pub merge_max_center_distance_ratio: f32,
    pub merge_min_alignment_overlap: f32,
    pub merge_max_characters: usize,
    pub merge_gutter_gap_px: u32,
    pub enable_fallback: bool,
    pub filter_non_dialogue: bool,
    /// Multiplies `min_confidence` on the fallback pass.
    pub fallback_confidence_factor: f32,
    /// Multiplies `min_area_ratio` on the fallback pass.
    pub fallback_area_factor: f32,
}

impl Default for ConsolidationConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.55,
            classifier_min_confidence: 0.4,
            min_area_ratio: 0.0004,
            max_area_ratio: 0.25,
            min_width_px: 8,
            min_height_px: 8,
            line_tolerance_px: 10,
            block_gap_px: 18,
            min_x_overlap_ratio: 0.15,
            merge_gap_px: 16,
            merge_min_overlap_ratio: 0.1,
            merge_max_area_growth_ratio: 1.6,
            merge_min_height_ratio: 0.55,
            merge_max_center_distance_ratio: 0.45,
            merge_min_alignment_overlap: 0.12,
            merge_max_characters: 320,
            merge_gutter_gap_px: 48,
            enable_fallback: true,
            filter_non_dialogue: true,
            fallback_confidence_factor: 0.7,
            fallback_area_factor: 0.5,
        }
    }
}

/// Font bounds and cleanup knobs of the render engine.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderConfig {
    pub max_font_size: u32,
    pub min_font_size: u32,
    /// Hard ceiling after style bonuses.
    pub font_ceiling: u32,
    pub line_height: f32,
    pub padding_px: u32,
    pub min_render_size_px: u32,
    pub min_readable_font: u32,
    pub summary_max_chars: usize,
    pub summary_min_delta: usize,
    pub mask_tolerance: u8,
    pub font_path: Option<PathBuf>,
    pub font_family: Option<String>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            max_font_size: 42,
            min_font_size: 10,
            font_ceiling: 64,
            line_height: 1.2,
            padding_px: 6,
            min_render_size_px: 6,
            min_readable_font: 14,
            summary_max_chars: 160,
            summary_min_delta: 16,
            mask_tolerance: 28,
            font_path: None,
            font_family: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub ocr: ConsolidationConfig,
    pub render: RenderConfig,
    pub cache_dir: Option<PathBuf>,
    pub source_lang: String,
    pub target_lang: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            ocr: ConsolidationConfig::default(),
            render: RenderConfig::default(),
            cache_dir: None,
            source_lang: "en".to_string(),
            target_lang: "es".to_string(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    ocr: Option<OcrSettings>,
    render: Option<RenderSettings>,
    cache: Option<CacheSettings>,
    translation: Option<TranslationSettings>,
}

#[derive(Debug, Default, Deserialize)]
struct OcrSettings {
    min_confidence: Option<f32>,
    classifier_min_confidence: Option<f32>,
    min_area_ratio: Option<f32>,
    max_area_ratio: Option<f32>,
    min_width_px: Option<u32>,
    min_height_px: Option<u32>,
    line_tolerance_px: Option<u32>,
    block_gap_px: Option<u32>,
    min_x_overlap_ratio: Option<f32>,
    merge_gap_px: Option<u32>,
    merge_min_overlap_ratio: Option<f32>,
    merge_max_area_growth_ratio: Option<f32>,
    merge_min_height_ratio: Option<f32>,
    merge_max_center_distance_ratio: Option<f32>,
    merge_min_alignment_overlap: Option<f32>,
    merge_max_characters: Option<usize>,
    merge_gutter_gap_px: Option<u32>,
    enable_fallback: Option<bool>,
    filter_non_dialogue: Option<bool>,
    fallback_confidence_factor: Option<f32>,
    fallback_area_factor: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
struct RenderSettings {
    max_font_size: Option<u32>,
    min_font_size: Option<u32>,
    font_ceiling: Option<u32>,
    line_height: Option<f32>,
    padding_px: Option<u32>,
    min_render_size_px: Option<u32>,
    min_readable_font: Option<u32>,
    summary_max_chars: Option<usize>,
    summary_min_delta: Option<usize>,
    mask_tolerance: Option<u8>,
    font_path: Option<String>,
    font_family: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct CacheSettings {
    dir: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct TranslationSettings {
    source_lang: Option<String>,
    target_lang: Option<String>,
}

/// Loads settings: built-in defaults, then the working directory, then the
/// home directory, then `extra_path`; later layers override earlier ones.
pub fn load_settings(extra_path: Option<&Path>) -> Result<Settings> {
    let mut settings = Settings::default();
    let defaults: SettingsFile =
        toml::from_str(DEFAULT_SETTINGS_TOML).with_context(|| "failed to parse built-in settings")?;
    settings.merge(defaults);

    let mut ordered_paths = vec![
        PathBuf::from("settings.toml"),
        PathBuf::from("settings.local.toml"),
    ];
    if let Some(home) = home_dir() {
        ordered_paths.push(home.join("settings.toml"));
        ordered_paths.push(home.join("settings.local.toml"));
    }
    if let Some(extra) = extra_path {
        if !extra.exists() {
            return Err(anyhow!("settings file not found: {}", extra.display()));
        }
        ordered_paths.push(extra.to_path_buf());
    }

    for path in ordered_paths {
        if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("failed to read settings: {}", path.display()))?;
            settings.merge_toml(&content, &path)?;
        }
    }

    Ok(settings)
}

impl Settings {
    fn merge_toml(&mut self, content: &str, origin: &Path) -> Result<()> {
        let parsed: SettingsFile = toml::from_str(content)
            .with_context(|| format!("failed to parse settings: {}", origin.display()))?;
        self.merge(parsed);
        Ok(())
    }

    fn merge(&mut self, incoming: SettingsFile) {
        if let Some(ocr) = incoming.ocr {
            merge_ocr(&mut self.ocr, ocr);
        }
        if let Some(render) = incoming.render {
            merge_render(&mut self.render, render);
        }
        if let Some(cache) = incoming.cache {
            if let Some(dir) = cache.dir.filter(|dir| !dir.trim().is_empty()) {
                self.cache_dir = Some(PathBuf::from(dir));
            }
        }
        if let Some(translation) = incoming.translation {
            if let Some(lang) = translation.source_lang.filter(|lang| !lang.trim().is_empty()) {
                self.source_lang = lang;
            }
            if let Some(lang) = translation.target_lang.filter(|lang| !lang.trim().is_empty()) {
                self.target_lang = lang;
            }
        }
    }
}

fn set_positive_f32(target: &mut f32, value: Option<f32>) {
    if let Some(value) = value {
        if value > 0.0 {
            *target = value;
        }
    }
}

fn set_positive_u32(target: &mut u32, value: Option<u32>) {
    if let Some(value) = value {
        if value > 0 {
            *target = value;
        }
    }
}

fn merge_ocr(config: &mut ConsolidationConfig, ocr: OcrSettings) {
    set_positive_f32(&mut config.min_confidence, ocr.min_confidence);
    set_positive_f32(
        &mut config.classifier_min_confidence,
        ocr.classifier_min_confidence,
    );
    set_positive_f32(&mut config.min_area_ratio, ocr.min_area_ratio);
    set_positive_f32(&mut config.max_area_ratio, ocr.max_area_ratio);
    set_positive_u32(&mut config.min_width_px, ocr.min_width_px);
    set_positive_u32(&mut config.min_height_px, ocr.min_height_px);
    set_positive_u32(&mut config.line_tolerance_px, ocr.line_tolerance_px);
    set_positive_u32(&mut config.block_gap_px, ocr.block_gap_px);
    set_positive_f32(&mut config.min_x_overlap_ratio, ocr.min_x_overlap_ratio);
    set_positive_u32(&mut config.merge_gap_px, ocr.merge_gap_px);
    set_positive_f32(&mut config.merge_min_overlap_ratio, ocr.merge_min_overlap_ratio);
    set_positive_f32(
        &mut config.merge_max_area_growth_ratio,
        ocr.merge_max_area_growth_ratio,
    );
    set_positive_f32(&mut config.merge_min_height_ratio, ocr.merge_min_height_ratio);
    set_positive_f32(
        &mut config.merge_max_center_distance_ratio,
        ocr.merge_max_center_distance_ratio,
    );
    set_positive_f32(
        &mut config.merge_min_alignment_overlap,
        ocr.merge_min_alignment_overlap,
    );
    if let Some(limit) = ocr.merge_max_characters {
        if limit > 0 {
            config.merge_max_characters = limit;
        }
    }
    set_positive_u32(&mut config.merge_gutter_gap_px, ocr.merge_gutter_gap_px);
    if let Some(enabled) = ocr.enable_fallback {
        config.enable_fallback = enabled;
    }
    if let Some(enabled) = ocr.filter_non_dialogue {
        config.filter_non_dialogue = enabled;
    }
    set_positive_f32(
        &mut config.fallback_confidence_factor,
        ocr.fallback_confidence_factor,
    );
    set_positive_f32(&mut config.fallback_area_factor, ocr.fallback_area_factor);
}

fn merge_render(config: &mut RenderConfig, render: RenderSettings) {
    set_positive_u32(&mut config.max_font_size, render.max_font_size);
    set_positive_u32(&mut config.min_font_size, render.min_font_size);
    set_positive_u32(&mut config.font_ceiling, render.font_ceiling);
    set_positive_f32(&mut config.line_height, render.line_height);
    if let Some(padding) = render.padding_px {
        config.padding_px = padding;
    }
    set_positive_u32(&mut config.min_render_size_px, render.min_render_size_px);
    set_positive_u32(&mut config.min_readable_font, render.min_readable_font);
    if let Some(limit) = render.summary_max_chars {
        if limit > 0 {
            config.summary_max_chars = limit;
        }
    }
    if let Some(delta) = render.summary_min_delta {
        config.summary_min_delta = delta;
    }
    if let Some(tolerance) = render.mask_tolerance {
        if tolerance > 0 {
            config.mask_tolerance = tolerance;
        }
    }
    if let Some(path) = render.font_path.filter(|path| !path.trim().is_empty()) {
        config.font_path = Some(PathBuf::from(path));
    }
    if let Some(family) = render.font_family.filter(|family| !family.trim().is_empty()) {
        config.font_family = Some(family);
    }
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().and_then(|home| {
        let home = home.trim();
        if home.is_empty() {
            None
        } else {
            Some(Path::new(home).join(HOME_DIR_NAME))
        }
    })
}
