use serde::{Deserialize, Serialize};

use super::font::FontBook;

pub(crate) const NO_BREAK_SPACE: char = '\u{a0}';
const ELLIPSIS: &str = "...";

/// Outcome of fitting text into a box at one font size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutResult {
    pub font_size: u32,
    pub lines: Vec<String>,
    /// Distance between baselines in pixels.
    pub line_height: f32,
    pub fits: bool,
    pub block_width: u32,
    pub block_height: u32,
}

/// Greedy word wrap per explicit paragraph. A word wider than the limit
/// still gets a line of its own; words are never split.
pub fn wrap(text: &str, max_width_px: f32, font_size: u32, font: &FontBook) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    let size = font_size as f32;
    let mut lines = Vec::new();

    for paragraph in text.lines() {
        let mut words = paragraph
            .split(|ch: char| ch.is_whitespace() && ch != NO_BREAK_SPACE)
            .filter(|word| !word.is_empty());
        let Some(first) = words.next() else {
            lines.push(String::new());
            continue;
        };

        let mut current = first.to_string();
        for word in words {
            let candidate = format!("{} {}", current, word);
            if font.measure(&candidate, size) <= max_width_px {
                current = candidate;
            } else {
                lines.push(std::mem::replace(&mut current, word.to_string()));
            }
        }
        lines.push(current);
    }

    lines
}

/// Width of the widest line and the stacked height, in whole pixels.
pub fn measure_block(
    lines: &[String],
    font_size: u32,
    line_height: f32,
    font: &FontBook,
) -> (u32, u32) {
    if lines.is_empty() {
        return (0, 0);
    }
    let size = font_size as f32;
    let width = lines
        .iter()
        .map(|line| font.measure(line, size))
        .fold(0.0f32, f32::max);
    let line_px = (size * line_height).floor() as u32;
    (width.ceil() as u32, line_px.saturating_mul(lines.len() as u32))
}

fn layout_at(
    text: &str,
    box_w: u32,
    box_h: u32,
    font_size: u32,
    line_height: f32,
    font: &FontBook,
) -> LayoutResult {
    let lines = wrap(text, box_w as f32, font_size, font);
    let (block_width, block_height) = measure_block(&lines, font_size, line_height, font);
    LayoutResult {
        font_size,
        fits: block_width <= box_w && block_height <= box_h,
        line_height: font_size as f32 * line_height,
        lines,
        block_width,
        block_height,
    }
}

/// Binary search for the largest font size in `[min_font, max_font]` whose
/// wrapped block fits the box. When nothing fits, the `min_font` attempt is
/// returned with `fits == false`.
pub fn fit_to_box(
    text: &str,
    box_w: u32,
    box_h: u32,
    font: &FontBook,
    max_font: u32,
    min_font: u32,
    line_height: f32,
) -> LayoutResult {
    let mut best: Option<LayoutResult> = None;
    let (mut low, mut high) = (min_font as i64, max_font as i64);

    while low <= high {
        let mid = (low + high) / 2;
        let current = layout_at(text, box_w, box_h, mid as u32, line_height, font);
        if current.fits {
            best = Some(current);
            low = mid + 1;
        } else {
            high = mid - 1;
        }
    }

    best.unwrap_or_else(|| layout_at(text, box_w, box_h, min_font, line_height, font))
}

/// True when the block exceeds `box - 2 * padding` on either axis.
pub fn check_overflow(result: &LayoutResult, box_w: u32, box_h: u32, padding: u32) -> bool {
    let max_w = box_w.saturating_sub(padding * 2);
    let max_h = box_h.saturating_sub(padding * 2);
    result.block_width > max_w || result.block_height > max_h
}

/// Cuts each line's tail until it plus an ellipsis fits `max_width`.
pub fn truncate_to_fit(
    result: &LayoutResult,
    max_width: u32,
    max_height: u32,
    font: &FontBook,
) -> LayoutResult {
    let size = result.font_size as f32;
    let limit = max_width as f32;
    let lines: Vec<String> = result
        .lines
        .iter()
        .map(|line| {
            let mut truncated = line.clone();
            while !truncated.is_empty()
                && font.measure(&format!("{}{}", truncated, ELLIPSIS), size) > limit
            {
                truncated.pop();
            }
            if truncated == *line {
                truncated
            } else {
                format!("{}{}", truncated.trim_end(), ELLIPSIS)
            }
        })
        .collect();

    let multiplier = if result.font_size > 0 {
        result.line_height / size
    } else {
        1.0
    };
    let (block_width, block_height) = measure_block(&lines, result.font_size, multiplier, font);
    LayoutResult {
        font_size: result.font_size,
        fits: block_width <= max_width && block_height <= max_height,
        line_height: result.line_height,
        lines,
        block_width,
        block_height,
    }
}
