//! Bounding-box helpers shared by the ONNX engines.

/// A candidate box in `[x1, y1, x2, y2]` form with its score.
#[derive(Clone, Debug, PartialEq)]
pub struct ScoredBox {
    pub bbox: [f64; 4],
    pub score: f64,
}

/// IoU between two bounding boxes represented as `[x1, y1, x2, y2]`.
pub fn bbox_iou(a: &[f64; 4], b: &[f64; 4]) -> f64 {
    let x1 = a[0].max(b[0]);
    let y1 = a[1].max(b[1]);
    let x2 = a[2].min(b[2]);
    let y2 = a[3].min(b[3]);

    let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    if inter == 0.0 {
        return 0.0;
    }

    let area_a = (a[2] - a[0]) * (a[3] - a[1]);
    let area_b = (b[2] - b[0]) * (b[3] - b[1]);
    inter / (area_a + area_b - inter)
}

/// Greedy NMS: sort by score descending, suppress boxes overlapping a kept
/// box by more than `iou_thresh`.
pub fn nms(dets: &mut [ScoredBox], iou_thresh: f64) -> Vec<ScoredBox> {
    dets.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep = Vec::new();
    let mut suppressed = vec![false; dets.len()];

    for i in 0..dets.len() {
        if suppressed[i] {
            continue;
        }
        keep.push(dets[i].clone());
        for j in (i + 1)..dets.len() {
            if !suppressed[j] && bbox_iou(&dets[i].bbox, &dets[j].bbox) > iou_thresh {
                suppressed[j] = true;
            }
        }
    }
    keep
}

/// Converts a float box to integer `(x, y, width, height)` clipped to the
/// image bounds.
pub fn clip_to_image(bbox: &[f64; 4], width: u32, height: u32) -> (i32, i32, i32, i32) {
    let w = width as f64;
    let h = height as f64;
    let x1 = bbox[0].clamp(0.0, w);
    let y1 = bbox[1].clamp(0.0, h);
    let x2 = bbox[2].clamp(0.0, w);
    let y2 = bbox[3].clamp(0.0, h);
    (
        x1 as i32,
        y1 as i32,
        (x2 - x1).max(0.0) as i32,
        (y2 - y1).max(0.0) as i32,
    )
}

pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn scored(x1: f64, y1: f64, x2: f64, y2: f64, score: f64) -> ScoredBox {
        ScoredBox {
            bbox: [x1, y1, x2, y2],
            score,
        }
    }

    #[test]
    fn test_bbox_iou_perfect_overlap() {
        let a = [0.0, 0.0, 10.0, 10.0];
        assert_relative_eq!(bbox_iou(&a, &a), 1.0);
    }

    #[test]
    fn test_bbox_iou_no_overlap() {
        assert_relative_eq!(
            bbox_iou(&[0.0, 0.0, 10.0, 10.0], &[20.0, 20.0, 30.0, 30.0]),
            0.0
        );
    }

    #[test]
    fn test_bbox_iou_partial() {
        // intersection 50, union 150
        assert_relative_eq!(
            bbox_iou(&[0.0, 0.0, 10.0, 10.0], &[5.0, 0.0, 15.0, 10.0]),
            50.0 / 150.0
        );
    }

    #[test]
    fn test_nms_suppresses_overlapping() {
        let mut dets = vec![
            scored(5.0, 5.0, 105.0, 105.0, 0.7),
            scored(0.0, 0.0, 100.0, 100.0, 0.9),
        ];
        let kept = nms(&mut dets, 0.3);
        assert_eq!(kept.len(), 1);
        assert_relative_eq!(kept[0].score, 0.9);
    }

    #[test]
    fn test_nms_keeps_separate() {
        let mut dets = vec![
            scored(0.0, 0.0, 50.0, 50.0, 0.9),
            scored(200.0, 200.0, 250.0, 250.0, 0.8),
        ];
        assert_eq!(nms(&mut dets, 0.3).len(), 2);
    }

    #[test]
    fn test_nms_empty_input() {
        assert!(nms(&mut [], 0.3).is_empty());
    }

    #[test]
    fn test_clip_to_image() {
        assert_eq!(clip_to_image(&[-10.0, 5.0, 50.0, 300.0], 100, 200), (0, 5, 50, 195));
        assert_eq!(clip_to_image(&[150.0, 0.0, 180.0, 10.0], 100, 200), (100, 0, 0, 10));
    }

    #[test]
    fn test_sigmoid() {
        assert!((sigmoid(0.0) - 0.5).abs() < 1e-6);
        assert!((sigmoid(10.0) - 1.0).abs() < 0.001);
        assert!(sigmoid(-10.0) < 0.001);
    }
}
