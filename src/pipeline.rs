use anyhow::{Context, Result, anyhow};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::info;

use crate::cache::BlobStore;
use crate::error::PageError;
use crate::ocr::{ConsolidationEngine, ConsolidationMetrics, TextDetector, TranslatedRegion};
use crate::render::{RenderEngine, RenderResult};
use crate::settings::Settings;
use crate::translator::{CachedTranslator, TranslationBackend};

/// One page to process.
#[derive(Debug, Clone)]
pub struct PageJob {
    pub image: PathBuf,
    pub output: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PageReport {
    pub image: PathBuf,
    pub consolidation: ConsolidationMetrics,
    pub regions: Vec<TranslatedRegion>,
    pub render: RenderResult,
}

/// Consolidate, translate and render, page by page.
pub struct PagePipeline<B: TranslationBackend + 'static> {
    consolidation: ConsolidationEngine,
    translator: Arc<CachedTranslator<B>>,
    renderer: RenderEngine,
}

impl<B: TranslationBackend + 'static> PagePipeline<B> {
    pub fn new(settings: &Settings, backend: B, cache: Arc<dyn BlobStore>) -> Result<Self> {
        let renderer = RenderEngine::new(settings.render.clone())?;
        Ok(Self::from_parts(settings, backend, cache, renderer))
    }

    /// Builds the pipeline around an existing render engine; the translator
    /// is wired in as its retranslation and summarization capability.
    pub fn from_parts(
        settings: &Settings,
        backend: B,
        cache: Arc<dyn BlobStore>,
        renderer: RenderEngine,
    ) -> Self {
        let consolidation =
            ConsolidationEngine::new(settings.ocr.clone()).with_cache(Arc::clone(&cache));
        let translator = Arc::new(CachedTranslator::new(
            backend,
            cache,
            settings.source_lang.clone(),
            settings.target_lang.clone(),
        ));
        let renderer = renderer
            .with_retranslator(translator.clone())
            .with_summarizer(translator.clone());
        Self {
            consolidation,
            translator,
            renderer,
        }
    }

    pub fn process_page(
        &self,
        image: &Path,
        output: Option<&Path>,
        detector: &dyn TextDetector,
    ) -> Result<PageReport> {
        if !image.exists() {
            return Err(PageError::ImageNotFound(image.to_path_buf()).into());
        }
        let bytes = std::fs::read(image)
            .with_context(|| format!("failed to read image: {}", image.display()))?;

        let consolidation = self.consolidation.consolidate_image(&bytes, detector)?;
        let regions = self.translator.translate_regions(&consolidation.regions);
        let render = self.renderer.render_page(image, &regions, output)?;
        info!(
            "pipeline: {} -> {} regions, {} skipped",
            image.display(),
            regions.len(),
            render.metrics.overflow_skip_count + render.metrics.untranslated_skip_count
        );

        Ok(PageReport {
            image: image.to_path_buf(),
            consolidation: consolidation.metrics,
            regions,
            render,
        })
    }

    /// Processes independent pages on blocking worker threads, at most one
    /// per CPU at a time. Reports come back in input order.
    pub async fn process_pages(
        self: Arc<Self>,
        pages: Vec<PageJob>,
        detector: Arc<dyn TextDetector>,
    ) -> Vec<Result<PageReport>> {
        let permits = Arc::new(Semaphore::new(num_cpus::get().max(1)));
        let mut handles = Vec::with_capacity(pages.len());

        for page in pages {
            let pipeline = Arc::clone(&self);
            let detector = Arc::clone(&detector);
            let permits = Arc::clone(&permits);
            handles.push(tokio::spawn(async move {
                let _permit = permits
                    .acquire_owned()
                    .await
                    .map_err(|err| anyhow!("worker pool closed: {}", err))?;
                tokio::task::spawn_blocking(move || {
                    pipeline.process_page(&page.image, page.output.as_deref(), detector.as_ref())
                })
                .await
                .map_err(|err| anyhow!("page task failed: {}", err))?
            }));
        }

        let mut reports = Vec::with_capacity(handles.len());
        for handle in handles {
            let report = match handle.await {
                Ok(report) => report,
                Err(err) => Err(anyhow!("page task failed: {}", err)),
            };
            reports.push(report);
        }
        reports
    }
}
