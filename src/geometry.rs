//! Pure coordinate math shared by the codec, cropper and mask renderer.

use crate::error::CvError;

/// An axis-aligned box in absolute pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
}

impl BoundingBox {
    pub fn new(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Self {
        Self {
            xmin,
            ymin,
            xmax,
            ymax,
        }
    }

    /// Zero or negative area. Degenerate boxes are skipped by callers, never
    /// a fatal error.
    pub fn is_degenerate(&self) -> bool {
        self.xmax <= self.xmin || self.ymax <= self.ymin
    }

    /// The four corners, clockwise from the top-left.
    pub fn corners(&self) -> Vec<(f64, f64)> {
        vec![
            (self.xmin, self.ymin),
            (self.xmax, self.ymin),
            (self.xmax, self.ymax),
            (self.xmin, self.ymax),
        ]
    }

    pub fn width(&self) -> f64 {
        self.xmax - self.xmin
    }

    pub fn height(&self) -> f64 {
        self.ymax - self.ymin
    }
}

/// Convert a normalized center/size box to absolute corner coordinates.
///
/// `cx, cy, w, h` are fractions of the image dimensions. Out-of-range
/// fractions are accepted and produce an out-of-range box; clamping happens
/// downstream in [`clamp_and_pad`].
pub fn normalized_to_absolute(
    cx: f64,
    cy: f64,
    w: f64,
    h: f64,
    img_w: u32,
    img_h: u32,
) -> BoundingBox {
    let abs_cx = cx * img_w as f64;
    let abs_cy = cy * img_h as f64;
    let abs_w = w * img_w as f64;
    let abs_h = h * img_h as f64;
    BoundingBox::new(
        abs_cx - abs_w / 2.0,
        abs_cy - abs_h / 2.0,
        abs_cx + abs_w / 2.0,
        abs_cy + abs_h / 2.0,
    )
}

/// Inverse of [`normalized_to_absolute`]: center/size fractions of a box.
pub fn absolute_to_normalized(bbox: &BoundingBox, img_w: u32, img_h: u32) -> (f64, f64, f64, f64) {
    let w = img_w as f64;
    let h = img_h as f64;
    (
        (bbox.xmin + bbox.xmax) / 2.0 / w,
        (bbox.ymin + bbox.ymax) / 2.0 / h,
        bbox.width() / w,
        bbox.height() / h,
    )
}

/// Grow a box by `pad_x`/`pad_y` pixels on each side, then clamp every edge
/// to `[0, img_w] x [0, img_h]`. The result may be degenerate; callers check
/// [`BoundingBox::is_degenerate`] and skip.
pub fn clamp_and_pad(
    bbox: &BoundingBox,
    pad_x: f64,
    pad_y: f64,
    img_w: u32,
    img_h: u32,
) -> BoundingBox {
    let w = img_w as f64;
    let h = img_h as f64;
    BoundingBox::new(
        (bbox.xmin - pad_x).clamp(0.0, w),
        (bbox.ymin - pad_y).clamp(0.0, h),
        (bbox.xmax + pad_x).clamp(0.0, w),
        (bbox.ymax + pad_y).clamp(0.0, h),
    )
}

/// Min/max reduction of a polygon to its bounding box, clamped to the image.
///
/// Fewer than three points cannot form a region and is reported as a
/// malformed shape.
pub fn polygon_to_bounding_box(
    points: &[(f64, f64)],
    img_w: u32,
    img_h: u32,
) -> Result<BoundingBox, CvError> {
    if points.len() < 3 {
        return Err(CvError::MalformedShape {
            label: String::new(),
            points: points.len(),
        });
    }
    let (xmin, ymin, xmax, ymax) = points.iter().fold(
        (f64::MAX, f64::MAX, f64::MIN, f64::MIN),
        |(xmin, ymin, xmax, ymax), &(x, y)| (xmin.min(x), ymin.min(y), xmax.max(x), ymax.max(y)),
    );
    Ok(clamp_and_pad(
        &BoundingBox::new(xmin, ymin, xmax, ymax),
        0.0,
        0.0,
        img_w,
        img_h,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn normalized_to_absolute_centered_box() {
        let bbox = normalized_to_absolute(0.5, 0.5, 0.2, 0.2, 100, 100);
        assert!((bbox.xmin - 40.0).abs() < EPS);
        assert!((bbox.ymin - 40.0).abs() < EPS);
        assert!((bbox.xmax - 60.0).abs() < EPS);
        assert!((bbox.ymax - 60.0).abs() < EPS);
    }

    #[test]
    fn normalize_round_trip() {
        for &(cx, cy, w, h) in &[
            (0.5, 0.5, 0.2, 0.2),
            (0.1, 0.9, 0.05, 0.1),
            (0.33, 0.66, 1.0, 0.5),
        ] {
            let bbox = normalized_to_absolute(cx, cy, w, h, 640, 480);
            let (cx2, cy2, w2, h2) = absolute_to_normalized(&bbox, 640, 480);
            assert!((cx - cx2).abs() < EPS);
            assert!((cy - cy2).abs() < EPS);
            assert!((w - w2).abs() < EPS);
            assert!((h - h2).abs() < EPS);
        }
    }

    #[test]
    fn clamp_and_pad_stays_in_image() {
        let bbox = BoundingBox::new(-50.0, 10.0, 250.0, 90.0);
        let clamped = clamp_and_pad(&bbox, 1000.0, 1000.0, 200, 100);
        assert_eq!(clamped, BoundingBox::new(0.0, 0.0, 200.0, 100.0));
    }

    #[test]
    fn pad_grows_box() {
        let bbox = BoundingBox::new(40.0, 40.0, 60.0, 60.0);
        let padded = clamp_and_pad(&bbox, 5.0, 2.0, 100, 100);
        assert_eq!(padded, BoundingBox::new(35.0, 38.0, 65.0, 62.0));
    }

    #[test]
    fn pad_can_make_box_degenerate_after_clamp() {
        // Box entirely left of the image: both x edges clamp to 0
        let bbox = BoundingBox::new(-30.0, 10.0, -10.0, 20.0);
        let clamped = clamp_and_pad(&bbox, 0.0, 0.0, 100, 100);
        assert!(clamped.is_degenerate());
    }

    #[test]
    fn polygon_bounding_box_reduction() {
        let points = [(10.0, 20.0), (50.0, 5.0), (30.0, 120.0)];
        let bbox = polygon_to_bounding_box(&points, 100, 100).unwrap();
        assert_eq!(bbox, BoundingBox::new(10.0, 5.0, 50.0, 100.0));
    }

    #[test]
    fn polygon_with_two_points_is_malformed() {
        let points = [(0.0, 0.0), (10.0, 10.0)];
        assert!(matches!(
            polygon_to_bounding_box(&points, 100, 100),
            Err(CvError::MalformedShape { points: 2, .. })
        ));
    }

    #[test]
    fn corners_are_clockwise() {
        let bbox = BoundingBox::new(1.0, 2.0, 3.0, 4.0);
        assert_eq!(
            bbox.corners(),
            vec![(1.0, 2.0), (3.0, 2.0), (3.0, 4.0), (1.0, 4.0)]
        );
    }
}
