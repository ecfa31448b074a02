pub mod cache;
pub mod error;
pub mod logging;
pub mod ocr;
pub mod pipeline;
pub mod render;
pub mod settings;
pub mod translator;

#[cfg(test)]
mod test_util;

pub use cache::{BlobStore, FsBlobStore, MemoryBlobStore, key_hash};
pub use error::PageError;
pub use ocr::{
    Consolidation, ConsolidationEngine, ConsolidationMetrics, NormalizedBBox, RawDetection,
    RawPage, RegionKind, StaticDetector, TextDetector, TextRegion, TranslatedRegion, Vertex,
};
pub use pipeline::{PageJob, PagePipeline, PageReport};
pub use render::{LayoutResult, RenderEngine, RenderMetrics, RenderResult};
pub use settings::{ConsolidationConfig, RenderConfig, Settings, load_settings};
pub use translator::{
    CachedTranslator, HeuristicSummarizer, Retranslate, Summarizer, TranslationBackend,
};
