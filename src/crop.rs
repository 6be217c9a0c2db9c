//! Per-shape pixel crops and the preview rendering used for visual QA.

use image::{DynamicImage, Rgba, RgbaImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use rusttype::{Font, Scale};

use crate::error::CvError;
use crate::geometry::polygon_to_bounding_box;
use crate::types::{AnnotationRecord, Shape};

/// Extract one crop per shape, in shape order, labeled by class.
///
/// The bounding box of each shape is clamped to the image; degenerate boxes
/// are skipped with a warning. Pixel ranges are inclusive-exclusive, so a
/// box from 40 to 60 yields a 20-pixel-wide crop.
pub fn extract_crops(
    record: &AnnotationRecord,
    image: &DynamicImage,
) -> (Vec<(String, DynamicImage)>, Vec<CvError>) {
    let mut crops = Vec::with_capacity(record.shapes.len());
    let mut warnings = Vec::new();

    for shape in &record.shapes {
        let bbox = match polygon_to_bounding_box(
            shape.points(),
            record.image_width,
            record.image_height,
        ) {
            Ok(bbox) => bbox,
            Err(mut warning) => {
                if let CvError::MalformedShape { label, .. } = &mut warning {
                    *label = shape.label.clone();
                }
                warnings.push(warning);
                continue;
            }
        };

        // Floor the min edge and ceil the max edge so a box thinner than a
        // pixel still covers the pixel it sits on.
        let x0 = bbox.xmin.floor() as u32;
        let y0 = bbox.ymin.floor() as u32;
        let x1 = bbox.xmax.ceil() as u32;
        let y1 = bbox.ymax.ceil() as u32;
        if x1 <= x0 || y1 <= y0 {
            warnings.push(CvError::DegenerateBox {
                label: shape.label.clone(),
            });
            continue;
        }

        let crop = image.crop_imm(x0, y0, x1 - x0, y1 - y0);
        crops.push((shape.label.clone(), crop));
    }

    (crops, warnings)
}

/// Draw each shape's bounding box and label onto a copy of the image.
///
/// Label text is drawn only when a font is supplied; loading one is the
/// caller's concern. Does not affect crop output.
pub fn render_preview(
    image: &DynamicImage,
    shapes: &[Shape],
    font: Option<&Font<'_>>,
) -> RgbaImage {
    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
    const OUTLINE_WIDTH: i32 = 3;

    let mut canvas = image.to_rgba8();
    let (img_w, img_h) = (canvas.width(), canvas.height());

    for shape in shapes {
        let Ok(bbox) = polygon_to_bounding_box(shape.points(), img_w, img_h) else {
            continue;
        };
        if bbox.is_degenerate() {
            continue;
        }
        let x0 = bbox.xmin as i32;
        let y0 = bbox.ymin as i32;
        let w = bbox.width() as u32;
        let h = bbox.height() as u32;

        for inset in 0..OUTLINE_WIDTH {
            if w <= 2 * inset as u32 || h <= 2 * inset as u32 {
                break;
            }
            draw_hollow_rect_mut(
                &mut canvas,
                Rect::at(x0 + inset, y0 + inset).of_size(w - 2 * inset as u32, h - 2 * inset as u32),
                RED,
            );
        }

        if let Some(font) = font {
            draw_text_mut(
                &mut canvas,
                RED,
                x0 + 5,
                y0 + 5,
                Scale::uniform(16.0),
                font,
                &shape.label,
            );
        }
    }

    canvas
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ShapeGeometry;
    use image::RgbImage;

    fn record_with(shapes: Vec<Shape>) -> AnnotationRecord {
        AnnotationRecord {
            image_path: "img.png".to_string(),
            image_width: 100,
            image_height: 100,
            shapes,
        }
    }

    fn rect(label: &str, xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Shape {
        Shape {
            label: label.to_string(),
            geometry: ShapeGeometry::Rectangle(vec![
                (xmin, ymin),
                (xmax, ymin),
                (xmax, ymax),
                (xmin, ymax),
            ]),
            class_id: None,
        }
    }

    fn test_image() -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::new(100, 100))
    }

    #[test]
    fn crops_come_in_shape_order_with_labels() {
        let record = record_with(vec![
            rect("car", 10.0, 10.0, 30.0, 40.0),
            rect("person", 50.0, 50.0, 60.0, 70.0),
        ]);
        let (crops, warnings) = extract_crops(&record, &test_image());
        assert!(warnings.is_empty());
        assert_eq!(crops.len(), 2);
        assert_eq!(crops[0].0, "car");
        assert_eq!((crops[0].1.width(), crops[0].1.height()), (20, 30));
        assert_eq!(crops[1].0, "person");
        assert_eq!((crops[1].1.width(), crops[1].1.height()), (10, 20));
    }

    #[test]
    fn degenerate_boxes_are_skipped() {
        let record = record_with(vec![
            rect("empty", 20.0, 20.0, 20.0, 50.0),
            rect("ok", 0.0, 0.0, 10.0, 10.0),
        ]);
        let (crops, warnings) = extract_crops(&record, &test_image());
        assert_eq!(crops.len(), 1);
        assert_eq!(crops[0].0, "ok");
        assert!(matches!(
            warnings.as_slice(),
            [CvError::DegenerateBox { .. }]
        ));
    }

    #[test]
    fn subpixel_boxes_keep_their_covered_pixel() {
        let record = record_with(vec![rect("thin", 5.2, 10.0, 5.8, 20.0)]);
        let (crops, warnings) = extract_crops(&record, &test_image());
        assert!(warnings.is_empty());
        assert_eq!((crops[0].1.width(), crops[0].1.height()), (1, 10));
    }

    #[test]
    fn out_of_image_boxes_are_clamped_before_cropping() {
        let record = record_with(vec![rect("wide", -20.0, 10.0, 120.0, 20.0)]);
        let (crops, warnings) = extract_crops(&record, &test_image());
        assert!(warnings.is_empty());
        assert_eq!((crops[0].1.width(), crops[0].1.height()), (100, 10));
    }

    #[test]
    fn polygon_crops_use_the_bounding_box() {
        let record = record_with(vec![Shape {
            label: "tri".to_string(),
            geometry: ShapeGeometry::Polygon(vec![(10.0, 10.0), (40.0, 15.0), (25.0, 50.0)]),
            class_id: None,
        }]);
        let (crops, _) = extract_crops(&record, &test_image());
        assert_eq!((crops[0].1.width(), crops[0].1.height()), (30, 40));
    }

    #[test]
    fn preview_draws_red_outline() {
        let shapes = vec![rect("car", 10.0, 10.0, 30.0, 30.0)];
        let preview = render_preview(&test_image(), &shapes, None);
        assert_eq!(*preview.get_pixel(10, 10), Rgba([255, 0, 0, 255]));
        assert_eq!(*preview.get_pixel(20, 20), Rgba([0, 0, 0, 255]));
    }
}
