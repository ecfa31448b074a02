mod engine;

use anyhow::Result;
use serde::{Deserialize, Serialize};

pub use engine::{
    ConsolidationEngine, NormalizedBBox, RegionClass, axis_gap_px, classify_region,
    regions_from_detections, x_gap_px, x_overlap_ratio, y_gap_px, y_overlap_ratio,
};
pub(crate) use engine::text;

/// One OCR detection at any granularity: word, line, paragraph or merged block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextRegion {
    pub id: String,
    pub text: String,
    pub bbox: NormalizedBBox,
    #[serde(default)]
    pub confidence: Option<f32>,
}

/// Rendering style tag attached to a translated region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegionKind {
    Dialogue,
    Narration,
    Onomatopoeia,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslatedRegion {
    pub id: String,
    pub original_text: String,
    pub translated_text: String,
    pub bbox: NormalizedBBox,
    #[serde(default)]
    pub confidence: Option<f32>,
    #[serde(default)]
    pub region_kind: Option<RegionKind>,
}

/// A raw detection as produced by an OCR backend, in page pixels.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawDetection {
    pub text: String,
    /// Polygon vertices; OCR backends may omit a coordinate, which reads as 0.
    pub vertices: Vec<Vertex>,
    #[serde(default)]
    pub confidence: Option<f32>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Vertex {
    #[serde(default)]
    pub x: Option<f32>,
    #[serde(default)]
    pub y: Option<f32>,
}

impl Vertex {
    pub fn new(x: f32, y: f32) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawPage {
    pub width: u32,
    pub height: u32,
    pub detections: Vec<RawDetection>,
}

/// Source of raw detections for a page image.
pub trait TextDetector: Send + Sync {
    fn detect(&self, image_bytes: &[u8]) -> Result<RawPage>;
}

/// Per-call stage counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsolidationMetrics {
    pub regions_detected_raw: usize,
    pub regions_after_line_grouping: usize,
    pub regions_after_paragraph_grouping: usize,
    pub regions_after_filter: usize,
    pub regions_after_merge: usize,
    pub invalid_bbox_count: usize,
    pub discarded_region_count: usize,
    pub merged_region_count: usize,
    pub fallback_used: bool,
    #[serde(default)]
    pub cache_hit: bool,
}

/// Regions in reading order plus the metrics of the call that produced them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Consolidation {
    pub regions: Vec<TextRegion>,
    pub metrics: ConsolidationMetrics,
}

/// Detector replaying a fixed page of detections, e.g. one loaded from a
/// JSON file produced by an external OCR run.
#[derive(Debug, Clone)]
pub struct StaticDetector {
    page: RawPage,
}

impl StaticDetector {
    pub fn new(page: RawPage) -> Self {
        Self { page }
    }

    pub fn from_json_file(path: &std::path::Path) -> Result<Self> {
        use anyhow::Context;
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read detections: {}", path.display()))?;
        let page: RawPage = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse detections: {}", path.display()))?;
        Ok(Self::new(page))
    }
}

impl TextDetector for StaticDetector {
    fn detect(&self, _image_bytes: &[u8]) -> Result<RawPage> {
        Ok(self.page.clone())
    }
}
