use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering::Relaxed};

use serde::Deserialize;

use crate::error::CvError;

// Supported image formats, in pairing-resolution preference order
pub const IMG_FORMATS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tif", "tiff", "webp"];

/// Geometry of one annotated region, absolute pixel coordinates.
#[derive(Debug, Clone, PartialEq)]
pub enum ShapeGeometry {
    /// Four corners, clockwise from the top-left.
    Rectangle(Vec<(f64, f64)>),
    /// At least three vertices.
    Polygon(Vec<(f64, f64)>),
}

/// One annotated region of an image.
#[derive(Debug, Clone, PartialEq)]
pub struct Shape {
    pub label: String,
    pub geometry: ShapeGeometry,
    /// Present when the shape came from the class-indexed text format.
    pub class_id: Option<u32>,
}

impl Shape {
    pub fn points(&self) -> &[(f64, f64)] {
        match &self.geometry {
            ShapeGeometry::Rectangle(points) | ShapeGeometry::Polygon(points) => points,
        }
    }

    pub fn shape_type(&self) -> &'static str {
        match self.geometry {
            ShapeGeometry::Rectangle(_) => "rectangle",
            ShapeGeometry::Polygon(_) => "polygon",
        }
    }
}

/// All annotations of one image. Never mutated after parsing; transforms
/// produce new records.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationRecord {
    pub image_path: String,
    pub image_width: u32,
    pub image_height: u32,
    pub shapes: Vec<Shape>,
}

/// Dense, 0-based mapping from class ID to label name, loaded once per run.
#[derive(Debug, Clone, Default)]
pub struct ClassLabelMap {
    names: Vec<String>,
}

#[derive(Deserialize)]
struct LabelMapDoc {
    names: NamesField,
}

// The `names` key may be a plain list or an {id: name} mapping
#[derive(Deserialize)]
#[serde(untagged)]
enum NamesField {
    Sequence(Vec<String>),
    Mapping(BTreeMap<u32, String>),
}

impl ClassLabelMap {
    pub fn from_names(names: Vec<String>) -> Self {
        Self { names }
    }

    /// Load the map from a YAML document with a `names:` key.
    pub fn from_yaml_file(path: &Path) -> Result<Self, CvError> {
        let content = fs::read_to_string(path).map_err(|e| CvError::io(path, e))?;
        let doc: LabelMapDoc = serde_yaml::from_str(&content).map_err(|e| CvError::Yaml {
            path: path.to_path_buf(),
            source: e,
        })?;
        let names = match doc.names {
            NamesField::Sequence(names) => names,
            NamesField::Mapping(mapping) => {
                let mut names = Vec::with_capacity(mapping.len());
                for (expected, (id, name)) in mapping.into_iter().enumerate() {
                    if id as usize != expected {
                        return Err(CvError::InvalidLabelMap {
                            path: path.to_path_buf(),
                            reason: format!(
                                "class ids must be dense and 0-based, missing id {expected}"
                            ),
                        });
                    }
                    names.push(name);
                }
                names
            }
        };
        if names.is_empty() {
            return Err(CvError::InvalidLabelMap {
                path: path.to_path_buf(),
                reason: "no label names found".to_string(),
            });
        }
        Ok(Self { names })
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn get(&self, class_id: u32) -> Option<&str> {
        self.names.get(class_id as usize).map(String::as_str)
    }

    /// Lookup that treats an out-of-domain ID as an error carrying the
    /// numeric fallback label the caller may degrade to.
    pub fn resolve(&self, class_id: u32) -> Result<&str, CvError> {
        self.get(class_id).ok_or(CvError::UnresolvedClassId {
            class_id,
            fallback: class_id.to_string(),
        })
    }

    /// Class ID of a label name, for the json -> indexed direction.
    pub fn position(&self, label: &str) -> Option<u32> {
        self.names.iter().position(|n| n == label).map(|i| i as u32)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &str)> {
        self.names
            .iter()
            .enumerate()
            .map(|(id, name)| (id as u32, name.as_str()))
    }
}

/// Result of partitioning a corpus. `train_ids` and `val_ids` are disjoint;
/// `leftover_ids` holds whatever the ratios did not cover, so a caller can
/// opt into a third bucket.
#[derive(Debug, Clone)]
pub struct DatasetSplit {
    pub train_ids: Vec<String>,
    pub val_ids: Vec<String>,
    pub leftover_ids: Vec<String>,
}

/// Aggregate counters returned by batch operations. Atomic so rayon workers
/// can share one instance without locking.
#[derive(Debug, Default)]
pub struct ProcessingStats {
    processed: AtomicUsize,
    skipped: AtomicUsize,
    errored: AtomicUsize,
}

impl ProcessingStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_processed(&self) {
        self.processed.fetch_add(1, Relaxed);
    }

    pub fn mark_skipped(&self) {
        self.skipped.fetch_add(1, Relaxed);
    }

    pub fn mark_errored(&self) {
        self.errored.fetch_add(1, Relaxed);
    }

    pub fn processed(&self) -> usize {
        self.processed.load(Relaxed)
    }

    pub fn skipped(&self) -> usize {
        self.skipped.load(Relaxed)
    }

    pub fn errored(&self) -> usize {
        self.errored.load(Relaxed)
    }

    pub fn print_summary(&self) {
        log::info!("=== Processing Summary ===");
        log::info!("Processed: {}", self.processed());
        log::info!("Skipped:   {}", self.skipped());
        log::info!("Errored:   {}", self.errored());
        if self.skipped() + self.errored() > 0 {
            log::warn!(
                "{} item(s) did not produce output (skipped: {}, errored: {})",
                self.skipped() + self.errored(),
                self.skipped(),
                self.errored()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn label_map_sequence_form() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "names:\n  - car\n  - person").unwrap();
        let map = ClassLabelMap::from_yaml_file(file.path()).unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map.get(0), Some("car"));
        assert_eq!(map.get(1), Some("person"));
        assert_eq!(map.position("person"), Some(1));
    }

    #[test]
    fn label_map_mapping_form() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "names:\n  0: car\n  1: person").unwrap();
        let map = ClassLabelMap::from_yaml_file(file.path()).unwrap();
        assert_eq!(map.get(1), Some("person"));
    }

    #[test]
    fn label_map_rejects_sparse_mapping() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "names:\n  0: car\n  2: person").unwrap();
        assert!(ClassLabelMap::from_yaml_file(file.path()).is_err());
    }

    #[test]
    fn resolve_out_of_domain_carries_fallback() {
        let map = ClassLabelMap::from_names(vec!["car".to_string()]);
        match map.resolve(7) {
            Err(crate::error::CvError::UnresolvedClassId { class_id, fallback }) => {
                assert_eq!(class_id, 7);
                assert_eq!(fallback, "7");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn stats_counters() {
        let stats = ProcessingStats::new();
        stats.mark_processed();
        stats.mark_processed();
        stats.mark_skipped();
        assert_eq!(stats.processed(), 2);
        assert_eq!(stats.skipped(), 1);
        assert_eq!(stats.errored(), 0);
    }
}
