use std::sync::Arc;

use anyhow::{Result, bail};
use comic_translator_rust::{
    ConsolidationConfig, ConsolidationEngine, MemoryBlobStore, PageError, RawDetection, RawPage,
    StaticDetector, TextDetector, Vertex,
};

fn word(text: &str, x: f32, y: f32, w: f32, h: f32) -> RawDetection {
    RawDetection {
        text: text.to_string(),
        vertices: vec![
            Vertex::new(x, y),
            Vertex::new(x + w, y),
            Vertex::new(x + w, y + h),
            Vertex::new(x, y + h),
        ],
        confidence: Some(0.9),
    }
}

/// Four lines of five 40x20 words starting at (x, y).
fn balloon(label: &str, x: f32, y: f32) -> Vec<RawDetection> {
    let mut words = Vec::new();
    for row in 0..4 {
        for col in 0..5 {
            words.push(word(
                label,
                x + col as f32 * 48.0,
                y + row as f32 * 26.0,
                40.0,
                20.0,
            ));
        }
    }
    words
}

/// Nine balloons on a 3x3 panel grid, separated by wide gutters.
fn grid_page() -> RawPage {
    let labels = [
        "alpha", "bravo", "charlie", "delta", "echo", "foxtrot", "golf", "hotel", "india",
    ];
    let origins = [50.0, 380.0, 710.0];
    let mut detections = Vec::new();
    for (idx, label) in labels.iter().enumerate() {
        detections.extend(balloon(label, origins[idx % 3], origins[idx / 3]));
    }
    RawPage {
        width: 1000,
        height: 1000,
        detections,
    }
}

fn single_balloon_page() -> RawPage {
    let lines = [
        ["Where", "are", "you"],
        ["going", "so", "late"],
        ["tonight,", "my", "friend?"],
    ];
    let mut detections = Vec::new();
    for (row, words) in lines.iter().enumerate() {
        for (col, text) in words.iter().enumerate() {
            detections.push(word(
                text,
                100.0 + col as f32 * 70.0,
                100.0 + row as f32 * 25.0,
                60.0,
                20.0,
            ));
        }
    }
    RawPage {
        width: 1000,
        height: 1000,
        detections,
    }
}

struct FailingDetector;

impl TextDetector for FailingDetector {
    fn detect(&self, _image_bytes: &[u8]) -> Result<RawPage> {
        bail!("vision service unavailable")
    }
}

#[test]
fn word_level_detections_collapse_into_one_balloon() {
    let engine = ConsolidationEngine::new(ConsolidationConfig::default());
    let result = engine.consolidate(&single_balloon_page());

    assert_eq!(result.regions.len(), 1);
    assert_eq!(
        result.regions[0].text,
        "Where are you going so late tonight, my friend?"
    );
    assert_eq!(result.metrics.regions_detected_raw, 9);
    assert_eq!(result.metrics.regions_after_line_grouping, 3);
    assert_eq!(result.metrics.regions_after_paragraph_grouping, 1);
    assert!(!result.metrics.fallback_used);
}

#[test]
fn balloons_across_gutters_stay_apart() {
    let engine = ConsolidationEngine::new(ConsolidationConfig::default());
    let result = engine.consolidate(&grid_page());

    assert_eq!(result.metrics.regions_detected_raw, 180);
    assert_eq!(result.metrics.regions_after_line_grouping, 36);
    assert_eq!(result.regions.len(), 9);
    assert_eq!(result.metrics.regions_after_merge, result.regions.len());
    for region in &result.regions {
        let label = region.text.split(' ').next().unwrap_or_default();
        assert!(region.text.split(' ').all(|token| token == label));
        assert_eq!(region.text.split(' ').count(), 20);
    }
}

#[test]
fn regions_come_back_in_reading_order() {
    let engine = ConsolidationEngine::new(ConsolidationConfig::default());
    let result = engine.consolidate(&grid_page());
    let order = result
        .regions
        .iter()
        .filter_map(|region| region.text.split(' ').next())
        .collect::<Vec<_>>()
        .join(", ");
    insta::assert_snapshot!(order, @"alpha, bravo, charlie, delta, echo, foxtrot, golf, hotel, india");
}

#[test]
fn same_page_consolidates_the_same_way_every_time() {
    let engine = ConsolidationEngine::new(ConsolidationConfig::default());
    let first = engine.consolidate(&grid_page());
    let second = engine.consolidate(&grid_page());

    assert_eq!(first.regions.len(), second.regions.len());
    for (a, b) in first.regions.iter().zip(&second.regions) {
        assert_eq!(a.id, b.id);
        assert_eq!(a.bbox, b.bbox);
        assert_eq!(a.text, b.text);
    }
    assert_eq!(first.metrics, second.metrics);
}

#[test]
fn consolidating_twice_changes_nothing() {
    let engine = ConsolidationEngine::new(ConsolidationConfig::default());
    let first = engine.consolidate(&grid_page());
    let second = engine.consolidate_regions(&first.regions, 1000, 1000);

    assert_eq!(second.regions.len(), first.regions.len());
    for (before, after) in first.regions.iter().zip(&second.regions) {
        assert_eq!(before.text, after.text);
        assert_eq!(before.bbox, after.bbox);
    }
}

#[test]
fn page_furniture_and_shaky_reads_are_dropped() {
    let mut page = single_balloon_page();
    page.detections.push(word("12", 100.0, 900.0, 20.0, 20.0));
    page.detections.push(word("....", 500.0, 900.0, 40.0, 20.0));
    page.detections.push(word("!?!?!", 800.0, 900.0, 50.0, 20.0));
    let mut shaky = word("Nobody trusts this line", 100.0, 600.0, 200.0, 20.0);
    shaky.confidence = Some(0.3);
    page.detections.push(shaky);

    let engine = ConsolidationEngine::new(ConsolidationConfig::default());
    let result = engine.consolidate(&page);

    assert_eq!(result.regions.len(), 1);
    assert_eq!(result.metrics.discarded_region_count, 4);
    assert!(result.regions[0].text.starts_with("Where are you"));
}

#[test]
fn collapsed_polygons_are_counted_not_kept() {
    let mut page = single_balloon_page();
    page.detections.push(word("flat", 300.0, 400.0, 0.0, 20.0));
    page.detections.push(RawDetection {
        text: "empty".to_string(),
        vertices: Vec::new(),
        confidence: None,
    });

    let engine = ConsolidationEngine::new(ConsolidationConfig::default());
    let result = engine.consolidate(&page);
    assert_eq!(result.metrics.invalid_bbox_count, 2);
    assert_eq!(result.metrics.regions_detected_raw, 9);
    assert_eq!(result.regions.len(), 1);
}

#[test]
fn short_greeting_goes_through_the_fallback_pass() {
    let page = RawPage {
        width: 1000,
        height: 1000,
        detections: vec![
            word("Hi", 100.0, 100.0, 30.0, 20.0),
            word("there", 138.0, 100.0, 60.0, 20.0),
            word("friend", 206.0, 100.0, 70.0, 20.0),
        ],
    };
    let engine = ConsolidationEngine::new(ConsolidationConfig::default());
    let result = engine.consolidate(&page);

    assert!(result.metrics.fallback_used);
    assert_eq!(result.regions.len(), 1);
    assert_eq!(result.regions[0].text, "Hi there friend");
}

#[test]
fn empty_page_yields_nothing() {
    let engine = ConsolidationEngine::new(ConsolidationConfig::default());
    let result = engine.consolidate(&RawPage {
        width: 1000,
        height: 1000,
        detections: Vec::new(),
    });
    assert!(result.regions.is_empty());
    assert!(!result.metrics.fallback_used);
}

#[test]
fn identical_image_bytes_reuse_the_cached_result() {
    let cache = Arc::new(MemoryBlobStore::new());
    let engine = ConsolidationEngine::new(ConsolidationConfig::default()).with_cache(cache.clone());
    let image = b"page-one-bytes".to_vec();

    let first = engine
        .consolidate_image(&image, &StaticDetector::new(single_balloon_page()))
        .expect("first run");
    assert!(!first.metrics.cache_hit);
    assert_eq!(cache.len(), 1);

    let second = engine
        .consolidate_image(&image, &FailingDetector)
        .expect("cached run");
    assert!(second.metrics.cache_hit);
    assert_eq!(second.regions, first.regions);

    let err = engine
        .consolidate_image(b"another page", &FailingDetector)
        .expect_err("uncached page must hit the detector");
    assert!(matches!(
        err.downcast_ref::<PageError>(),
        Some(PageError::Detection(_))
    ));
}
