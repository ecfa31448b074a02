use crate::ocr::{RawDetection, TextRegion};

use super::geom::NormalizedBBox;

/// Converts pixel-space polygons into normalized regions.
///
/// Returns the valid regions plus the number of detections dropped because
/// their polygon collapsed to zero width or height.
pub fn regions_from_detections(
    detections: &[RawDetection],
    width: u32,
    height: u32,
) -> (Vec<TextRegion>, usize) {
    let mut regions = Vec::with_capacity(detections.len());
    let mut invalid = 0usize;
    if width == 0 || height == 0 {
        return (regions, detections.len());
    }

    for (idx, detection) in detections.iter().enumerate() {
        let Some((x_min, y_min, x_max, y_max)) = polygon_extent(detection) else {
            invalid += 1;
            continue;
        };
        if x_min == x_max || y_min == y_max {
            invalid += 1;
            continue;
        }
        let bbox = NormalizedBBox::new(
            x_min / width as f32,
            y_min / height as f32,
            x_max / width as f32,
            y_max / height as f32,
        );
        if bbox.width() <= 0.0 || bbox.height() <= 0.0 {
            invalid += 1;
            continue;
        }
        regions.push(TextRegion {
            id: (idx + 1).to_string(),
            text: detection.text.clone(),
            bbox,
            confidence: detection.confidence,
        });
    }

    (regions, invalid)
}

fn polygon_extent(detection: &RawDetection) -> Option<(f32, f32, f32, f32)> {
    let mut iter = detection
        .vertices
        .iter()
        .map(|vertex| (vertex.x.unwrap_or(0.0), vertex.y.unwrap_or(0.0)));
    let (x0, y0) = iter.next()?;
    let mut extent = (x0, y0, x0, y0);
    for (x, y) in iter {
        extent.0 = extent.0.min(x);
        extent.1 = extent.1.min(y);
        extent.2 = extent.2.max(x);
        extent.3 = extent.3.max(y);
    }
    Some(extent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::Vertex;

    fn quad(text: &str, x0: f32, y0: f32, x1: f32, y1: f32) -> RawDetection {
        RawDetection {
            text: text.to_string(),
            vertices: vec![
                Vertex::new(x0, y0),
                Vertex::new(x1, y0),
                Vertex::new(x1, y1),
                Vertex::new(x0, y1),
            ],
            confidence: Some(0.9),
        }
    }

    #[test]
    fn normalizes_and_counts_degenerate_polygons() {
        let detections = vec![
            quad("Hi", 100.0, 50.0, 200.0, 70.0),
            quad("flat", 100.0, 50.0, 200.0, 50.0),
            RawDetection {
                text: "empty".to_string(),
                vertices: Vec::new(),
                confidence: None,
            },
        ];
        let (regions, invalid) = regions_from_detections(&detections, 1000, 500);
        assert_eq!(invalid, 2);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].id, "1");
        assert_eq!(regions[0].bbox, NormalizedBBox::new(0.1, 0.1, 0.2, 0.14));
    }

    #[test]
    fn missing_coordinates_read_as_zero() {
        let detection = RawDetection {
            text: "edge".to_string(),
            vertices: vec![
                crate::ocr::Vertex { x: None, y: None },
                Vertex::new(50.0, 40.0),
            ],
            confidence: None,
        };
        let (regions, invalid) = regions_from_detections(&[detection], 100, 100);
        assert_eq!(invalid, 0);
        assert_eq!(regions[0].bbox, NormalizedBBox::new(0.0, 0.0, 0.5, 0.4));
    }
}
