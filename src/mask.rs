//! Rasterization of annotated regions into a binary mask and the pixel
//! policies applied through it.

use image::{Rgb, RgbImage};

use crate::config::PixelPolicy;
use crate::error::CvError;
use crate::types::Shape;

/// A binary raster matching an image's pixel grid. `true` inside the union
/// of all rasterized shapes.
#[derive(Debug, Clone)]
pub struct RegionMask {
    width: u32,
    height: u32,
    data: Vec<bool>,
}

impl RegionMask {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![false; width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Out-of-range coordinates read as `false`.
    pub fn get(&self, x: u32, y: u32) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }
        self.data[y as usize * self.width as usize + x as usize]
    }

    fn set(&mut self, x: u32, y: u32) {
        self.data[y as usize * self.width as usize + x as usize] = true;
    }

    pub fn count_inside(&self) -> usize {
        self.data.iter().filter(|&&v| v).count()
    }
}

/// Rasterize every well-formed shape into one mask.
///
/// Shapes with fewer than three points or non-finite coordinates are skipped
/// with a warning, never fatal.
pub fn build_mask(img_w: u32, img_h: u32, shapes: &[Shape]) -> (RegionMask, Vec<CvError>) {
    let mut mask = RegionMask::new(img_w, img_h);
    let mut warnings = Vec::new();

    for shape in shapes {
        let points = shape.points();
        if points.len() < 3 {
            warnings.push(CvError::MalformedShape {
                label: shape.label.clone(),
                points: points.len(),
            });
            continue;
        }
        if points.iter().any(|&(x, y)| !x.is_finite() || !y.is_finite()) {
            warnings.push(CvError::MalformedShape {
                label: shape.label.clone(),
                points: points.len(),
            });
            continue;
        }
        fill_polygon(&mut mask, points);
    }

    (mask, warnings)
}

// Scanline fill with the nonzero winding rule, sampling at pixel centers.
fn fill_polygon(mask: &mut RegionMask, points: &[(f64, f64)]) {
    let n = points.len();
    let mut crossings: Vec<(f64, i32)> = Vec::with_capacity(n);

    for y in 0..mask.height {
        let scan = y as f64 + 0.5;
        crossings.clear();
        for i in 0..n {
            let (x0, y0) = points[i];
            let (x1, y1) = points[(i + 1) % n];
            // Half-open edge interval so shared vertices count once
            let crosses = (y0 <= scan && y1 > scan) || (y1 <= scan && y0 > scan);
            if crosses {
                let t = (scan - y0) / (y1 - y0);
                let x = x0 + t * (x1 - x0);
                let dir = if y1 > y0 { 1 } else { -1 };
                crossings.push((x, dir));
            }
        }
        crossings.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut winding = 0;
        let mut span_start = 0.0;
        for &(x, dir) in &crossings {
            if winding == 0 {
                span_start = x;
            }
            winding += dir;
            if winding == 0 {
                fill_span(mask, y, span_start, x);
            }
        }
    }
}

// Set pixels whose centers fall in [x_start, x_end) on row y.
fn fill_span(mask: &mut RegionMask, y: u32, x_start: f64, x_end: f64) {
    let first = (x_start - 0.5).ceil().max(0.0) as i64;
    let last = (x_end - 0.5).floor().min(mask.width as f64 - 1.0) as i64;
    for x in first..=last {
        // Pixel center x + 0.5 must lie strictly before the span end
        if (x as f64 + 0.5) >= x_end {
            break;
        }
        mask.set(x as u32, y);
    }
}

/// Apply one pixel-selection policy through the mask.
///
/// Operates on a copy; the caller's buffer is never mutated. A mask smaller
/// than the image treats uncovered pixels as outside.
pub fn apply_policy(image: &RgbImage, mask: &RegionMask, policy: PixelPolicy) -> RgbImage {
    const BLACK: Rgb<u8> = Rgb([0, 0, 0]);
    const WHITE: Rgb<u8> = Rgb([255, 255, 255]);

    let mut out = image.clone();
    for (x, y, pixel) in out.enumerate_pixels_mut() {
        let inside = mask.get(x, y);
        match policy {
            PixelPolicy::ZeroOutside => {
                if !inside {
                    *pixel = BLACK;
                }
            }
            PixelPolicy::WhiteInside => {
                if inside {
                    *pixel = WHITE;
                }
            }
            PixelPolicy::WhiteInsideBlackOutside => {
                *pixel = if inside { WHITE } else { BLACK };
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ShapeGeometry;

    fn rect_shape(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Shape {
        Shape {
            label: "test".to_string(),
            geometry: ShapeGeometry::Rectangle(vec![
                (xmin, ymin),
                (xmax, ymin),
                (xmax, ymax),
                (xmin, ymax),
            ]),
            class_id: None,
        }
    }

    #[test]
    fn full_image_rectangle_fills_everything() {
        let shapes = [rect_shape(0.0, 0.0, 8.0, 8.0)];
        let (mask, warnings) = build_mask(8, 8, &shapes);
        assert!(warnings.is_empty());
        assert_eq!(mask.count_inside(), 64);
    }

    #[test]
    fn partial_rectangle_fills_its_area() {
        let shapes = [rect_shape(2.0, 2.0, 6.0, 5.0)];
        let (mask, _) = build_mask(10, 10, &shapes);
        assert_eq!(mask.count_inside(), 4 * 3);
        assert!(mask.get(2, 2));
        assert!(mask.get(5, 4));
        assert!(!mask.get(6, 2));
        assert!(!mask.get(2, 5));
    }

    #[test]
    fn triangle_fills_half_the_square() {
        let shapes = [Shape {
            label: "tri".to_string(),
            geometry: ShapeGeometry::Polygon(vec![(0.0, 0.0), (10.0, 0.0), (0.0, 10.0)]),
            class_id: None,
        }];
        let (mask, _) = build_mask(10, 10, &shapes);
        let inside = mask.count_inside();
        assert!(inside > 35 && inside < 65, "triangle area was {inside}");
        assert!(mask.get(0, 0));
        assert!(!mask.get(9, 9));
    }

    #[test]
    fn malformed_shapes_are_skipped_with_warning() {
        let shapes = [Shape {
            label: "bad".to_string(),
            geometry: ShapeGeometry::Polygon(vec![(0.0, 0.0), (5.0, 5.0)]),
            class_id: None,
        }];
        let (mask, warnings) = build_mask(10, 10, &shapes);
        assert_eq!(mask.count_inside(), 0);
        assert!(matches!(
            warnings.as_slice(),
            [CvError::MalformedShape { points: 2, .. }]
        ));
    }

    #[test]
    fn zero_outside_on_full_mask_is_identity() {
        let shapes = [rect_shape(0.0, 0.0, 4.0, 4.0)];
        let (mask, _) = build_mask(4, 4, &shapes);
        let mut image = RgbImage::new(4, 4);
        for (i, pixel) in image.pixels_mut().enumerate() {
            *pixel = Rgb([i as u8, 2 * i as u8, 3 * i as u8]);
        }
        let result = apply_policy(&image, &mask, PixelPolicy::ZeroOutside);
        assert_eq!(result, image);
    }

    #[test]
    fn zero_outside_blacks_out_uncovered_pixels() {
        let shapes = [rect_shape(0.0, 0.0, 2.0, 4.0)];
        let (mask, _) = build_mask(4, 4, &shapes);
        let image = RgbImage::from_pixel(4, 4, Rgb([10, 20, 30]));
        let result = apply_policy(&image, &mask, PixelPolicy::ZeroOutside);
        assert_eq!(*result.get_pixel(0, 0), Rgb([10, 20, 30]));
        assert_eq!(*result.get_pixel(3, 0), Rgb([0, 0, 0]));
    }

    #[test]
    fn white_inside_keeps_outside() {
        let shapes = [rect_shape(0.0, 0.0, 2.0, 4.0)];
        let (mask, _) = build_mask(4, 4, &shapes);
        let image = RgbImage::from_pixel(4, 4, Rgb([10, 20, 30]));
        let result = apply_policy(&image, &mask, PixelPolicy::WhiteInside);
        assert_eq!(*result.get_pixel(0, 0), Rgb([255, 255, 255]));
        assert_eq!(*result.get_pixel(3, 0), Rgb([10, 20, 30]));
    }

    #[test]
    fn white_inside_black_outside_is_binary() {
        let shapes = [rect_shape(0.0, 0.0, 2.0, 4.0)];
        let (mask, _) = build_mask(4, 4, &shapes);
        let image = RgbImage::from_pixel(4, 4, Rgb([10, 20, 30]));
        let result = apply_policy(&image, &mask, PixelPolicy::WhiteInsideBlackOutside);
        for (x, _, pixel) in result.enumerate_pixels() {
            let expected = if x < 2 { 255 } else { 0 };
            assert_eq!(*pixel, Rgb([expected, expected, expected]));
        }
    }

    #[test]
    fn caller_buffer_is_untouched() {
        let shapes = [rect_shape(0.0, 0.0, 4.0, 4.0)];
        let (mask, _) = build_mask(4, 4, &shapes);
        let image = RgbImage::from_pixel(4, 4, Rgb([10, 20, 30]));
        let _ = apply_policy(&image, &mask, PixelPolicy::WhiteInsideBlackOutside);
        assert_eq!(*image.get_pixel(0, 0), Rgb([10, 20, 30]));
    }
}
