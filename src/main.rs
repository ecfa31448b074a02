use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use comic_translator_rust::{
    ConsolidationEngine, FsBlobStore, HeuristicSummarizer, RenderEngine, Settings, StaticDetector,
    TranslatedRegion, load_settings, logging,
};

#[derive(Parser, Debug)]
#[command(
    name = "comic-translator-rust",
    version,
    about = "Consolidate comic OCR detections and paint translations back onto pages"
)]
struct Cli {
    /// Read extra settings from a local TOML file
    #[arg(short = 'r', long = "settings", global = true)]
    settings: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(long = "verbose", global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Group raw OCR detections into dialogue regions and print them as JSON
    Consolidate {
        /// Page image (hashed for the OCR cache)
        #[arg(short = 'i', long = "image")]
        image: PathBuf,

        /// JSON file with {width, height, detections}
        #[arg(short = 'd', long = "detections")]
        detections: PathBuf,
    },
    /// Clean balloons and paint translated regions onto a page
    Render {
        /// Page image
        #[arg(short = 'i', long = "image")]
        image: PathBuf,

        /// JSON array of translated regions
        #[arg(short = 'g', long = "regions")]
        regions: PathBuf,

        /// Output image (default: <stem>_translated.png next to the input)
        #[arg(short = 'o', long = "output")]
        output: Option<PathBuf>,

        /// Font file used for layout and painting
        #[arg(short = 'f', long = "font")]
        font: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose)?;
    let settings = load_settings(cli.settings.as_deref())?;

    let output = match cli.command {
        Command::Consolidate { image, detections } => {
            consolidate(&settings, &image, &detections)?
        }
        Command::Render {
            image,
            regions,
            output,
            font,
        } => render(settings, &image, &regions, output.as_deref(), font)?,
    };
    println!("{}", output);
    Ok(())
}

fn consolidate(settings: &Settings, image: &Path, detections: &Path) -> Result<String> {
    let bytes =
        std::fs::read(image).with_context(|| format!("failed to read image: {}", image.display()))?;
    let detector = StaticDetector::from_json_file(detections)?;
    let mut engine = ConsolidationEngine::new(settings.ocr.clone());
    if let Some(dir) = settings.cache_dir.as_ref() {
        engine = engine.with_cache(Arc::new(FsBlobStore::new(dir)?));
    }
    let consolidation = engine.consolidate_image(&bytes, &detector)?;
    serde_json::to_string_pretty(&consolidation).with_context(|| "failed to serialize regions")
}

fn render(
    mut settings: Settings,
    image: &Path,
    regions: &Path,
    output: Option<&Path>,
    font: Option<PathBuf>,
) -> Result<String> {
    let raw = std::fs::read_to_string(regions)
        .with_context(|| format!("failed to read regions: {}", regions.display()))?;
    let regions: Vec<TranslatedRegion> = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse regions: {}", regions.display()))?;
    if font.is_some() {
        settings.render.font_path = font;
    }
    let engine = RenderEngine::new(settings.render)?.with_summarizer(Arc::new(HeuristicSummarizer));
    let result = engine.render_page(image, &regions, output)?;
    serde_json::to_string_pretty(&result).with_context(|| "failed to serialize render result")
}
