use serde::{Deserialize, Serialize};

/// Bounding box relative to the page, every coordinate in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedBBox {
    pub x_min: f32,
    pub y_min: f32,
    pub x_max: f32,
    pub y_max: f32,
}

impl NormalizedBBox {
    /// Builds a box and clamps it, so the result always satisfies the invariants.
    pub fn new(x_min: f32, y_min: f32, x_max: f32, y_max: f32) -> Self {
        Self {
            x_min,
            y_min,
            x_max,
            y_max,
        }
        .clamp()
    }

    /// Saturates every coordinate into `[0, 1]` and swaps reversed pairs.
    pub fn clamp(&self) -> Self {
        let mut x_min = saturate(self.x_min);
        let mut y_min = saturate(self.y_min);
        let mut x_max = saturate(self.x_max);
        let mut y_max = saturate(self.y_max);
        if x_min > x_max {
            std::mem::swap(&mut x_min, &mut x_max);
        }
        if y_min > y_max {
            std::mem::swap(&mut y_min, &mut y_max);
        }
        Self {
            x_min,
            y_min,
            x_max,
            y_max,
        }
    }

    pub fn width(&self) -> f32 {
        (self.x_max - self.x_min).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.y_max - self.y_min).max(0.0)
    }

    /// Area as a fraction of the page area.
    pub fn area_ratio(&self) -> f32 {
        self.width() * self.height()
    }

    pub fn center_y(&self) -> f32 {
        (self.y_min + self.y_max) / 2.0
    }

    pub fn width_px(&self, page_w: u32) -> f32 {
        self.width() * page_w as f32
    }

    pub fn height_px(&self, page_h: u32) -> f32 {
        self.height() * page_h as f32
    }

    /// Tightest box enclosing both.
    pub fn union(&self, other: &Self) -> Self {
        Self {
            x_min: self.x_min.min(other.x_min),
            y_min: self.y_min.min(other.y_min),
            x_max: self.x_max.max(other.x_max),
            y_max: self.y_max.max(other.y_max),
        }
        .clamp()
    }

    /// Tightest box enclosing every input; `None` for an empty input.
    pub fn union_all<'a, I>(boxes: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a NormalizedBBox>,
    {
        boxes
            .into_iter()
            .fold(None, |acc: Option<Self>, bbox| match acc {
                Some(current) => Some(current.union(bbox)),
                None => Some(bbox.clamp()),
            })
    }
}

fn saturate(value: f32) -> f32 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 1.0)
}

/// Horizontal overlap divided by the narrower width; 0 when disjoint or degenerate.
pub fn x_overlap_ratio(a: &NormalizedBBox, b: &NormalizedBBox) -> f32 {
    span_overlap_ratio((a.x_min, a.x_max), (b.x_min, b.x_max))
}

/// Vertical overlap divided by the shorter height; 0 when disjoint or degenerate.
pub fn y_overlap_ratio(a: &NormalizedBBox, b: &NormalizedBBox) -> f32 {
    span_overlap_ratio((a.y_min, a.y_max), (b.y_min, b.y_max))
}

fn span_overlap_ratio(a: (f32, f32), b: (f32, f32)) -> f32 {
    let overlap = a.1.min(b.1) - a.0.max(b.0);
    if overlap <= 0.0 {
        return 0.0;
    }
    let smaller = (a.1 - a.0).min(b.1 - b.0);
    if smaller <= 0.0 {
        return 0.0;
    }
    overlap / smaller
}

/// Pixel gap between two normalized spans of one axis; 0 when they overlap or touch.
pub fn axis_gap_px(a: (f32, f32), b: (f32, f32), scale: u32) -> f32 {
    let scale = scale as f32;
    if a.1 < b.0 {
        (b.0 - a.1) * scale
    } else if b.1 < a.0 {
        (a.0 - b.1) * scale
    } else {
        0.0
    }
}

pub fn x_gap_px(a: &NormalizedBBox, b: &NormalizedBBox, page_w: u32) -> f32 {
    axis_gap_px((a.x_min, a.x_max), (b.x_min, b.x_max), page_w)
}

pub fn y_gap_px(a: &NormalizedBBox, b: &NormalizedBBox, page_h: u32) -> f32 {
    axis_gap_px((a.y_min, a.y_max), (b.y_min, b.y_max), page_h)
}
