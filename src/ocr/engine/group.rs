use std::cmp::Ordering;

use crate::ocr::TextRegion;
use crate::settings::ConsolidationConfig;

use super::geom::{NormalizedBBox, x_gap_px, x_overlap_ratio};
use super::text::{join_fragments, weighted_confidence};

/// Collapses a run of regions into one: space-joined text, union box,
/// length-weighted confidence.
pub(super) fn aggregate_regions(regions: &[TextRegion], id: String) -> Option<TextRegion> {
    let bbox = NormalizedBBox::union_all(regions.iter().map(|region| &region.bbox))?;
    let text = join_fragments(regions.iter().map(|region| region.text.as_str()));
    let confidence = weighted_confidence(
        regions
            .iter()
            .map(|region| (region.text.as_str(), region.confidence)),
    );
    Some(TextRegion {
        id,
        text,
        bbox,
        confidence,
    })
}

pub(super) fn by_top_left(a: &TextRegion, b: &TextRegion) -> Ordering {
    a.bbox
        .y_min
        .total_cmp(&b.bbox.y_min)
        .then(a.bbox.x_min.total_cmp(&b.bbox.x_min))
}

/// Groups detections whose vertical centers sit within the line tolerance of
/// a line's average center. A detection never joins a line across a panel
/// gutter; it is matched against the most recent compatible line.
pub(super) fn group_by_lines(
    regions: &[TextRegion],
    page_w: u32,
    page_h: u32,
    config: &ConsolidationConfig,
) -> Vec<TextRegion> {
    let mut sorted: Vec<&TextRegion> = regions.iter().collect();
    sorted.sort_by(|a, b| by_top_left(a, b));

    let tolerance = config.line_tolerance_px as f32;
    let gutter = config.merge_gutter_gap_px as f32;
    let mut lines: Vec<(NormalizedBBox, Vec<&TextRegion>)> = Vec::new();
    for region in sorted {
        let center = region.bbox.center_y();
        let open = lines.iter_mut().rev().find(|(line_bbox, members)| {
            let line_center =
                members.iter().map(|r| r.bbox.center_y()).sum::<f32>() / members.len() as f32;
            (center - line_center).abs() * page_h as f32 <= tolerance
                && x_gap_px(line_bbox, &region.bbox, page_w) <= gutter
        });
        match open {
            Some((line_bbox, members)) => {
                *line_bbox = line_bbox.union(&region.bbox);
                members.push(region);
            }
            None => lines.push((region.bbox, vec![region])),
        }
    }

    lines
        .into_iter()
        .enumerate()
        .filter_map(|(idx, (_, mut members))| {
            members.sort_by(|a, b| a.bbox.x_min.total_cmp(&b.bbox.x_min));
            let owned: Vec<TextRegion> = members.into_iter().cloned().collect();
            aggregate_regions(&owned, format!("line-{}", idx))
        })
        .collect()
}

/// Stacks lines into paragraph blocks while they overlap horizontally and
/// the vertical gap stays small.
pub(super) fn group_lines_into_blocks(
    lines: &[TextRegion],
    page_h: u32,
    config: &ConsolidationConfig,
) -> Vec<TextRegion> {
    let mut ordered: Vec<&TextRegion> = lines.iter().collect();
    ordered.sort_by(|a, b| by_top_left(a, b));

    let mut blocks: Vec<(NormalizedBBox, Vec<TextRegion>)> = Vec::new();
    for line in ordered {
        let open = blocks.iter_mut().rev().find(|(block_bbox, _)| {
            let overlap = x_overlap_ratio(block_bbox, &line.bbox);
            let gap_px = ((line.bbox.y_min - block_bbox.y_max) * page_h as f32).max(0.0);
            overlap >= config.min_x_overlap_ratio && gap_px <= config.block_gap_px as f32
        });
        match open {
            Some((block_bbox, members)) => {
                *block_bbox = block_bbox.union(&line.bbox);
                members.push(line.clone());
            }
            None => blocks.push((line.bbox, vec![line.clone()])),
        }
    }

    blocks
        .into_iter()
        .enumerate()
        .filter_map(|(idx, (_, members))| aggregate_regions(&members, format!("block-{}", idx)))
        .collect()
}
