//! Bidirectional translation between the class-indexed text format, the
//! in-memory shape model and the interchange JSON consumed by the external
//! annotation reviewer.

use std::collections::HashMap;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::CvError;
use crate::geometry::{
    absolute_to_normalized, normalized_to_absolute, polygon_to_bounding_box,
};
use crate::types::{AnnotationRecord, ClassLabelMap, Shape, ShapeGeometry};

/// Fixed interchange-format tag written into every JSON document.
pub const INTERCHANGE_VERSION: &str = "2.4.4";

/// A parsed record together with the non-fatal warnings raised while
/// parsing. Warnings never abort the item; they let callers distinguish
/// clean shapes from degraded ones.
#[derive(Debug)]
pub struct ParsedAnnotation {
    pub record: AnnotationRecord,
    pub warnings: Vec<CvError>,
}

// Field names, order and null semantics must match the downstream reviewer
// exactly; do not reorder.
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonShape {
    pub label: String,
    pub points: Vec<[f64; 2]>,
    #[serde(default)]
    pub group_id: Option<i64>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub difficult: bool,
    pub shape_type: String,
    #[serde(default)]
    pub flags: HashMap<String, bool>,
    #[serde(default)]
    pub attributes: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonAnnotation {
    pub version: String,
    #[serde(default)]
    pub flags: HashMap<String, bool>,
    pub shapes: Vec<JsonShape>,
    pub image_path: String,
    /// Always `null`: image bytes are never embedded.
    #[serde(default)]
    pub image_data: Option<String>,
    pub image_height: u32,
    pub image_width: u32,
}

/// Parse the class-indexed text format: one `<classId> <cx> <cy> <w> <h>`
/// line per shape, fractions of the image dimensions.
///
/// Lines with fewer than five tokens are skipped and logged. A class ID
/// outside the map degrades to its numeric-string label and raises an
/// [`CvError::UnresolvedClassId`] warning.
pub fn parse_indexed_text(
    content: &str,
    image_path: &str,
    img_w: u32,
    img_h: u32,
    class_map: &ClassLabelMap,
) -> ParsedAnnotation {
    parse_indexed(content, image_path, img_w, img_h, Some(class_map))
}

/// Variant used by the crop pipeline: when no class map is supplied, shapes
/// get synthetic `class_{id}` labels, good enough to organize crop output.
pub fn parse_indexed_for_crop(
    content: &str,
    image_path: &str,
    img_w: u32,
    img_h: u32,
    class_map: Option<&ClassLabelMap>,
) -> ParsedAnnotation {
    parse_indexed(content, image_path, img_w, img_h, class_map)
}

fn parse_indexed(
    content: &str,
    image_path: &str,
    img_w: u32,
    img_h: u32,
    class_map: Option<&ClassLabelMap>,
) -> ParsedAnnotation {
    let mut shapes = Vec::new();
    let mut warnings = Vec::new();

    for (lineno, line) in content.lines().enumerate() {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.is_empty() {
            continue;
        }
        if tokens.len() < 5 {
            warn!(
                "{}:{}: expected 5 tokens, got {}, line skipped",
                image_path,
                lineno + 1,
                tokens.len()
            );
            continue;
        }

        let parsed = tokens[0].parse::<u32>().ok().and_then(|class_id| {
            let cx = tokens[1].parse::<f64>().ok()?;
            let cy = tokens[2].parse::<f64>().ok()?;
            let w = tokens[3].parse::<f64>().ok()?;
            let h = tokens[4].parse::<f64>().ok()?;
            Some((class_id, cx, cy, w, h))
        });
        let Some((class_id, cx, cy, w, h)) = parsed else {
            warn!("{}:{}: unparsable tokens, line skipped", image_path, lineno + 1);
            continue;
        };

        let label = match class_map {
            Some(map) => match map.resolve(class_id) {
                Ok(name) => name.to_string(),
                Err(warning) => {
                    let fallback = class_id.to_string();
                    warnings.push(warning);
                    fallback
                }
            },
            None => format!("class_{class_id}"),
        };

        let bbox = normalized_to_absolute(cx, cy, w, h, img_w, img_h);
        shapes.push(Shape {
            label,
            geometry: ShapeGeometry::Rectangle(bbox.corners()),
            class_id: Some(class_id),
        });
    }

    ParsedAnnotation {
        record: AnnotationRecord {
            image_path: image_path.to_string(),
            image_width: img_w,
            image_height: img_h,
            shapes,
        },
        warnings,
    }
}

/// Build the interchange JSON document for a record.
pub fn serialize_to_json(record: &AnnotationRecord) -> JsonAnnotation {
    let shapes = record
        .shapes
        .iter()
        .map(|shape| JsonShape {
            label: shape.label.clone(),
            points: shape.points().iter().map(|&(x, y)| [x, y]).collect(),
            group_id: None,
            description: None,
            difficult: false,
            shape_type: shape.shape_type().to_string(),
            flags: HashMap::new(),
            attributes: HashMap::new(),
        })
        .collect();

    JsonAnnotation {
        version: INTERCHANGE_VERSION.to_string(),
        flags: HashMap::new(),
        shapes,
        image_path: record.image_path.clone(),
        image_data: None,
        image_height: record.image_height,
        image_width: record.image_width,
    }
}

/// Parse an interchange JSON document back into a record.
///
/// Shapes with an unsupported `shape_type` or fewer than three points are
/// skipped with a warning. Round-trip law: parsing the output of
/// [`serialize_to_json`] reproduces the record's shape list.
pub fn parse_json(content: &str) -> Result<ParsedAnnotation, serde_json::Error> {
    let doc: JsonAnnotation = serde_json::from_str(content)?;
    let mut shapes = Vec::new();
    let mut warnings = Vec::new();

    for json_shape in doc.shapes {
        let points: Vec<(f64, f64)> = json_shape.points.iter().map(|p| (p[0], p[1])).collect();
        if points.len() < 3 {
            warnings.push(CvError::MalformedShape {
                label: json_shape.label.clone(),
                points: points.len(),
            });
            continue;
        }
        let geometry = match json_shape.shape_type.as_str() {
            "rectangle" => ShapeGeometry::Rectangle(points),
            "polygon" => ShapeGeometry::Polygon(points),
            other => {
                warnings.push(CvError::UnsupportedShapeType {
                    shape_type: other.to_string(),
                });
                continue;
            }
        };
        shapes.push(Shape {
            label: json_shape.label,
            geometry,
            class_id: None,
        });
    }

    Ok(ParsedAnnotation {
        record: AnnotationRecord {
            image_path: doc.image_path,
            image_width: doc.image_width,
            image_height: doc.image_height,
            shapes,
        },
        warnings,
    })
}

/// Serialize a record to the class-indexed text format.
///
/// Shapes resolve their class ID through `class_id` first, then by label
/// lookup; labels absent from the map are skipped with a warning, matching
/// the behavior expected by training pipelines.
pub fn serialize_to_indexed(
    record: &AnnotationRecord,
    class_map: &ClassLabelMap,
) -> (String, Vec<CvError>) {
    let mut out = String::with_capacity(record.shapes.len() * 64);
    let mut warnings = Vec::new();

    for shape in &record.shapes {
        let class_id = shape
            .class_id
            .or_else(|| class_map.position(&shape.label));
        let Some(class_id) = class_id else {
            warnings.push(CvError::UnknownLabel {
                label: shape.label.clone(),
            });
            continue;
        };

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
        if bbox.is_degenerate() {
            warnings.push(CvError::DegenerateBox {
                label: shape.label.clone(),
            });
            continue;
        }

        let (cx, cy, w, h) =
            absolute_to_normalized(&bbox, record.image_width, record.image_height);
        out.push_str(&format!(
            "{} {:.6} {:.6} {:.6} {:.6}\n",
            class_id, cx, cy, w, h
        ));
    }

    (out, warnings)
}
