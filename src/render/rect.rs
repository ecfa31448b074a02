use crate::ocr::NormalizedBBox;

/// Half-open pixel rectangle `[x1, x2) x [y1, y2)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
}

impl PixelRect {
    pub fn width(&self) -> u32 {
        self.x2.saturating_sub(self.x1)
    }

    pub fn height(&self) -> u32 {
        self.y2.saturating_sub(self.y1)
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    /// Normalized box to pixels, at least one pixel wide and inside the page.
    pub fn from_normalized(bbox: &NormalizedBBox, page_w: u32, page_h: u32) -> Self {
        let clamped = bbox.clamp();
        let max_x = page_w.saturating_sub(1);
        let max_y = page_h.saturating_sub(1);
        let x1 = ((clamped.x_min * page_w as f32) as u32).min(max_x);
        let y1 = ((clamped.y_min * page_h as f32) as u32).min(max_y);
        let x2 = ((clamped.x_max * page_w as f32) as u32)
            .min(page_w)
            .max(x1 + 1);
        let y2 = ((clamped.y_max * page_h as f32) as u32)
            .min(page_h)
            .max(y1 + 1);
        Self { x1, y1, x2, y2 }
    }

    /// Grows the rectangle symmetrically up to `min_size` on each axis,
    /// staying inside the page.
    pub fn grow_to_min(self, min_size: u32, page_w: u32, page_h: u32) -> Self {
        let need_x = min_size.saturating_sub(self.width());
        let need_y = min_size.saturating_sub(self.height());
        if need_x == 0 && need_y == 0 {
            return self;
        }
        Self {
            x1: self.x1.saturating_sub(need_x / 2),
            x2: (self.x2 + need_x - need_x / 2).min(page_w),
            y1: self.y1.saturating_sub(need_y / 2),
            y2: (self.y2 + need_y - need_y / 2).min(page_h),
        }
    }

    /// Shrinks by `pad_x` / `pad_y` on each side.
    pub fn inset(self, pad_x: u32, pad_y: u32) -> Self {
        let x1 = self.x1 + pad_x;
        let y1 = self.y1 + pad_y;
        Self {
            x1,
            y1,
            x2: self.x2.saturating_sub(pad_x).max(x1),
            y2: self.y2.saturating_sub(pad_y).max(y1),
        }
    }
}

/// Interior padding along one axis of length `side`: the base padding scaled
/// down for small boxes, plus the style delta, never more than half the side.
pub fn axis_padding(side: u32, base_padding: u32, style_padding: i32) -> u32 {
    let scaled = ((side as f32 * 0.05) as u32).max(2);
    let raw = base_padding.min(scaled) as i64 + style_padding as i64;
    let cap = (side as i64 - 2).max(0) / 2;
    raw.min(cap).max(0) as u32
}
