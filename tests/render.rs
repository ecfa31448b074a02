use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Result, bail};
use comic_translator_rust::render::FontBook;
use comic_translator_rust::{
    HeuristicSummarizer, NormalizedBBox, PageError, RegionKind, RenderConfig, RenderEngine,
    Retranslate, Summarizer, TranslatedRegion,
};
use image::{Rgba, RgbaImage};

const STORM: &str = "La tormenta se acerca rápidamente desde las montañas del norte y todos deben refugiarse antes del anochecer para estar seguros.";

fn region(original: &str, translated: &str, bbox: NormalizedBBox) -> TranslatedRegion {
    TranslatedRegion {
        id: "r1".to_string(),
        original_text: original.to_string(),
        translated_text: translated.to_string(),
        bbox,
        confidence: Some(0.9),
        region_kind: None,
    }
}

fn engine(config: RenderConfig) -> RenderEngine {
    RenderEngine::with_fonts(config, FontBook::estimated())
}

fn blank_page(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_pixel(width, height, Rgba([250, 250, 250, 255]))
}

/// Light oval balloon with a row of dark strokes, on mid-gray artwork.
fn oval_balloon_page() -> RgbaImage {
    RgbaImage::from_fn(400, 200, |x, y| {
        let dx = (x as f32 - 200.0) / 100.0;
        let dy = (y as f32 - 100.0) / 60.0;
        if dx * dx + dy * dy > 1.0 {
            Rgba([140, 140, 140, 255])
        } else if (160..240).contains(&x) && (95..105).contains(&y) && x % 4 < 2 {
            Rgba([20, 20, 20, 255])
        } else {
            Rgba([250, 250, 250, 255])
        }
    })
}

struct FixedSummary {
    reply: String,
    calls: AtomicUsize,
}

impl FixedSummary {
    fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            calls: AtomicUsize::new(0),
        }
    }
}

impl Summarizer for FixedSummary {
    fn shorten(&self, _original: &str, _current: &str, _max_chars: usize) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.reply.clone())
    }
}

struct FixedRetranslation(&'static str);

impl Retranslate for FixedRetranslation {
    fn retranslate(&self, _original: &str) -> Result<String> {
        Ok(self.0.to_string())
    }
}

struct BrokenSummary;

impl Summarizer for BrokenSummary {
    fn shorten(&self, _original: &str, _current: &str, _max_chars: usize) -> Result<String> {
        bail!("summary service unavailable")
    }
}

#[test]
fn long_text_in_an_oval_is_shortened_and_paint_stays_inside() {
    let summary = Arc::new(FixedSummary::new("Vamos ya."));
    let engine = engine(RenderConfig::default()).with_summarizer(summary.clone());
    let long_text = [STORM, STORM, STORM].join(" ");
    let regions = vec![region(
        "The storm is coming",
        &long_text,
        NormalizedBBox::new(0.25, 0.2, 0.75, 0.8),
    )];

    let (painted, metrics) = engine
        .render_image(oval_balloon_page(), &regions)
        .expect("render");

    assert_eq!(summary.calls.load(Ordering::SeqCst), 1);
    assert_eq!(metrics.summarize_triggered_count, 1);
    assert!(metrics.min_font_hit_count >= 1);
    assert_eq!(metrics.overflow_skip_count, 0);
    assert_eq!(metrics.cleanup_retry_count, 0);
    assert_eq!(metrics.layouts.len(), 1);
    assert!(metrics.layouts[0].fits);
    assert_eq!(metrics.layouts[0].lines.join(" "), "Vamos ya.");

    assert_eq!(painted.get_pixel(107, 47).0, [140, 140, 140, 255]);
    assert!(painted.get_pixel(200, 100)[0] >= 250);
}

#[test]
fn word_boundary_summary_fits_the_oval() {
    let engine = engine(RenderConfig::default()).with_summarizer(Arc::new(HeuristicSummarizer));
    let long_text = [STORM, STORM, STORM].join(" ");
    let regions = vec![region(
        "The storm is coming",
        &long_text,
        NormalizedBBox::new(0.25, 0.2, 0.75, 0.8),
    )];

    let (_, metrics) = engine
        .render_image(oval_balloon_page(), &regions)
        .expect("render");

    assert_eq!(metrics.summarize_triggered_count, 1);
    assert_eq!(metrics.overflow_skip_count, 0);
    assert!(metrics.layouts[0].fits);
    let painted_text = metrics.layouts[0].lines.join(" ");
    assert!(painted_text.starts_with("La tormenta se acerca"));
    assert!(painted_text.ends_with('…'));
    assert!(painted_text.chars().count() <= RenderConfig::default().summary_max_chars);
}

#[test]
fn translation_ink_lands_inside_the_balloon() {
    // needs an installed sans font; nothing to assert on machines without one
    let Ok(engine) = RenderEngine::new(RenderConfig::default()) else {
        return;
    };
    let page = RgbaImage::from_pixel(300, 200, Rgba([255, 255, 255, 255]));
    let regions = vec![region(
        "Hello my friend",
        "Hola amigo, mío",
        NormalizedBBox::new(0.1, 0.1, 0.9, 0.9),
    )];

    let (painted, metrics) = engine.render_image(page, &regions).expect("render");

    assert_eq!(metrics.layouts.len(), 1);
    assert!(metrics.layouts[0].fits);
    let (mut inside, mut outside) = (0usize, 0usize);
    for (x, y, pixel) in painted.enumerate_pixels() {
        let [r, g, b, _] = pixel.0;
        let luma = (r as u32 * 299 + g as u32 * 587 + b as u32 * 114) / 1000;
        if luma >= 128 {
            continue;
        }
        if (30..270).contains(&x) && (20..180).contains(&y) {
            inside += 1;
        } else {
            outside += 1;
        }
    }
    assert!(inside > 0, "no glyph reached the page");
    assert_eq!(outside, 0);
}

#[test]
fn lettering_the_mask_cannot_reach_is_cleaned_on_retry() {
    let page = RgbaImage::from_fn(200, 100, |x, _| {
        let bar = [40..52, 80..92, 120..132].iter().any(|bar| bar.contains(&x));
        if bar {
            Rgba([10, 10, 10, 255])
        } else {
            Rgba([250, 250, 250, 255])
        }
    });
    let regions = vec![region(
        "Hello friend",
        "Hola amigo",
        NormalizedBBox::new(0.1, 0.2, 0.9, 0.8),
    )];

    let (painted, metrics) = engine(RenderConfig::default())
        .render_image(page, &regions)
        .expect("render");

    assert_eq!(metrics.cleanup_retry_count, 1);
    assert_eq!(painted.get_pixel(45, 50).0, [255, 255, 255, 255]);
    assert_eq!(painted.get_pixel(45, 5).0, [10, 10, 10, 255]);
}

#[test]
fn untranslated_text_is_retranslated_before_painting() {
    let english = "Where are you going, brother?";
    let regions = vec![region(english, english, NormalizedBBox::new(0.1, 0.1, 0.9, 0.3))];

    let engine = engine(RenderConfig::default())
        .with_retranslator(Arc::new(FixedRetranslation("¿Adónde vas, hermano?")));
    let (_, metrics) = engine
        .render_image(blank_page(240, 180), &regions)
        .expect("render");

    assert_eq!(metrics.untranslated_skip_count, 0);
    assert!(
        metrics.layouts[0]
            .lines
            .iter()
            .any(|line| line.contains("hermano"))
    );
}

#[test]
fn untranslated_text_without_a_retranslator_is_skipped() {
    let english = "Where are you going, brother?";
    let regions = vec![region(english, english, NormalizedBBox::new(0.1, 0.1, 0.9, 0.3))];

    let (_, metrics) = engine(RenderConfig::default())
        .render_image(blank_page(240, 180), &regions)
        .expect("render");

    assert_eq!(metrics.untranslated_skip_count, 1);
    assert!(metrics.layouts.is_empty());
}

#[test]
fn text_that_cannot_fit_is_never_painted() {
    let config = RenderConfig {
        max_font_size: 30,
        min_font_size: 16,
        min_readable_font: 18,
        ..RenderConfig::default()
    };
    let regions = vec![
        region(
            "Original text",
            "Este texto es intencionadamente largo y no debería dibujarse si no cabe en la caja porque se saldría del globo.",
            NormalizedBBox::new(0.1, 0.1, 0.4, 0.2),
        ),
        region(
            "Okay",
            "Vale",
            NormalizedBBox::new(0.1, 0.5, 0.9, 0.9),
        ),
    ];

    let (_, metrics) = engine(config)
        .render_image(blank_page(240, 180), &regions)
        .expect("render");

    assert_eq!(metrics.overflow_skip_count, 1);
    assert!(metrics.overflow_count >= 1);
    assert!(metrics.min_font_hit_count >= 1);
    let unfit = metrics.layouts.iter().filter(|layout| !layout.fits).count();
    assert_eq!(unfit, metrics.overflow_skip_count);
}

#[test]
fn failing_summarizer_does_not_fail_the_page() {
    let engine = engine(RenderConfig::default()).with_summarizer(Arc::new(BrokenSummary));
    let long_text = [STORM, STORM, STORM].join(" ");
    let regions = vec![region(
        "The storm is coming",
        &long_text,
        NormalizedBBox::new(0.25, 0.2, 0.75, 0.8),
    )];

    let (_, metrics) = engine
        .render_image(oval_balloon_page(), &regions)
        .expect("render");

    assert_eq!(metrics.summarize_triggered_count, 0);
    assert_eq!(metrics.region_error_count, 0);
    assert_eq!(metrics.layouts.len(), 1);
}

#[test]
fn sound_effects_keep_the_original_lettering() {
    let mut sfx = region("BOOM", "PUM", NormalizedBBox::new(0.1, 0.1, 0.9, 0.5));
    sfx.region_kind = Some(RegionKind::Onomatopoeia);

    let (_, metrics) = engine(RenderConfig::default())
        .render_image(blank_page(240, 180), &[sfx])
        .expect("render");

    assert_eq!(metrics.layouts.len(), 1);
    assert_eq!(metrics.layouts[0].lines, vec!["BOOM".to_string()]);
}

#[test]
fn rendered_page_is_saved_next_to_the_input() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = dir.path().join("page-07.png");
    blank_page(240, 180).save(&input).expect("save input");
    let regions = vec![region(
        "Good morning",
        "Buenos días",
        NormalizedBBox::new(0.1, 0.1, 0.9, 0.4),
    )];

    let result = engine(RenderConfig::default())
        .render_page(&input, &regions, None)
        .expect("render");

    assert_eq!(result.output_image, dir.path().join("page-07_translated.png"));
    assert!(result.output_image.exists());
    let saved = image::open(&result.output_image).expect("decode output");
    assert_eq!((saved.width(), saved.height()), (240, 180));
}

#[test]
fn missing_input_is_reported_as_such() {
    let dir = tempfile::tempdir().expect("tempdir");
    let missing = dir.path().join("nope.png");
    let err = engine(RenderConfig::default())
        .render_page(&missing, &[], None)
        .expect_err("missing image");
    assert!(matches!(
        err.downcast_ref::<PageError>(),
        Some(PageError::ImageNotFound(path)) if path == &missing
    ));
}
