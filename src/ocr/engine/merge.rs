use std::collections::VecDeque;

use crate::ocr::TextRegion;
use crate::settings::ConsolidationConfig;

use super::geom::{NormalizedBBox, x_gap_px, x_overlap_ratio, y_gap_px, y_overlap_ratio};
use super::group::{aggregate_regions, by_top_left};

/// Running state of one merge group.
struct Accumulator {
    members: Vec<TextRegion>,
    chars: usize,
}

impl Accumulator {
    fn new(seed: TextRegion) -> Self {
        let chars = seed.text.chars().count();
        Self {
            members: vec![seed],
            chars,
        }
    }

    /// Union of every member, recomputed since absorption moves it.
    fn bbox(&self) -> Option<NormalizedBBox> {
        NormalizedBBox::union_all(self.members.iter().map(|member| &member.bbox))
    }

    fn absorb(&mut self, region: TextRegion) {
        self.chars += region.text.chars().count();
        self.members.push(region);
    }
}

/// Joins neighbouring regions that most likely belong to one balloon.
pub(super) fn merge_nearby_regions(
    regions: Vec<TextRegion>,
    page_w: u32,
    page_h: u32,
    config: &ConsolidationConfig,
) -> Vec<TextRegion> {
    let mut pending: Vec<TextRegion> = regions;
    pending.sort_by(by_top_left);
    let mut worklist: VecDeque<TextRegion> = pending.into();
    let mut merged = Vec::new();

    while let Some(seed) = worklist.pop_front() {
        let mut acc = Accumulator::new(seed);
        loop {
            let mut absorbed_any = false;
            let mut idx = 0;
            while idx < worklist.len() {
                let Some(current) = acc.bbox() else {
                    break;
                };
                if can_merge(&current, acc.chars, &worklist[idx], page_w, page_h, config) {
                    if let Some(candidate) = worklist.remove(idx) {
                        acc.absorb(candidate);
                        absorbed_any = true;
                    }
                } else {
                    idx += 1;
                }
            }
            if !absorbed_any {
                break;
            }
        }
        let id = format!("merged-{}", acc.members.len());
        if let Some(region) = aggregate_regions(&acc.members, id) {
            merged.push(region);
        }
    }

    merged
}

fn can_merge(
    current: &NormalizedBBox,
    current_chars: usize,
    candidate: &TextRegion,
    page_w: u32,
    page_h: u32,
    config: &ConsolidationConfig,
) -> bool {
    let other = &candidate.bbox;
    let x_gap = x_gap_px(current, other, page_w);
    let y_gap = y_gap_px(current, other, page_h);

    // panel gutter
    let gutter = config.merge_gutter_gap_px as f32;
    if x_gap > gutter || y_gap > gutter {
        return false;
    }

    let x_overlap = x_overlap_ratio(current, other);
    let y_overlap = y_overlap_ratio(current, other);
    let merge_gap = config.merge_gap_px as f32;
    let min_overlap = config.merge_min_overlap_ratio;
    let close = (x_overlap >= min_overlap && y_gap <= merge_gap)
        || (y_overlap >= min_overlap && x_gap <= merge_gap)
        || (x_gap <= merge_gap && y_gap <= merge_gap);
    if !close {
        return false;
    }

    let current_h = current.height_px(page_h);
    let other_h = other.height_px(page_h);
    if current_h <= 0.0 || other_h <= 0.0 {
        return false;
    }
    if current_h.min(other_h) / current_h.max(other_h) < config.merge_min_height_ratio {
        return false;
    }

    let center_delta = (current.center_y() - other.center_y()).abs() * page_h as f32;
    let avg_h = (current_h + other_h) / 2.0;
    if center_delta / avg_h.max(1e-6) > config.merge_max_center_distance_ratio {
        return false;
    }

    if x_overlap.max(y_overlap) < config.merge_min_alignment_overlap {
        return false;
    }

    let combined_area = current.area_ratio() + other.area_ratio();
    if combined_area <= 0.0 {
        return false;
    }
    if current.union(other).area_ratio() / combined_area > config.merge_max_area_growth_ratio {
        return false;
    }

    current_chars + candidate.text.chars().count() <= config.merge_max_characters
}
