use std::path::PathBuf;
use thiserror::Error;

/// Error taxonomy for the annotation toolkit.
///
/// All per-item variants are recoverable: batch operations log them, count
/// them in [`crate::types::ProcessingStats`], and move on to the next item.
#[derive(Debug, Error)]
pub enum CvError {
    /// A shape with too few points to form a region.
    #[error("shape '{label}' has {points} point(s), at least 3 required")]
    MalformedShape { label: String, points: usize },

    /// A class ID outside the label map. The shape is still emitted with
    /// `fallback` as its label; this variant tells the caller apart which
    /// shapes were fallback-named.
    #[error("class id {class_id} not in label map, using fallback label '{fallback}'")]
    UnresolvedClassId { class_id: u32, fallback: String },

    /// A label string with no class ID in the map (json -> indexed direction).
    #[error("label '{label}' not in label map, shape skipped")]
    UnknownLabel { label: String },

    /// An image or label file with no same-stem counterpart.
    #[error("no counterpart found for {path}")]
    MissingPair { path: PathBuf },

    /// A box with zero or negative area after clamping and padding.
    #[error("degenerate box for shape '{label}', skipped")]
    DegenerateBox { label: String },

    /// A JSON shape whose `shape_type` is neither rectangle nor polygon.
    #[error("unsupported shape type '{shape_type}', shape skipped")]
    UnsupportedShapeType { shape_type: String },

    #[error("invalid split ratios train={train} val={val}: each must be in (0, 1] and their sum at most 1")]
    InvalidSplitRatio { train: f32, val: f32 },

    #[error("invalid label map {path}: {reason}")]
    InvalidLabelMap { path: PathBuf, reason: String },

    #[error("i/o failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("image codec failure at {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("failed to parse JSON at {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to parse YAML at {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

impl CvError {
    /// Attach a path to a raw `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CvError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn image(path: impl Into<PathBuf>, source: image::ImageError) -> Self {
        CvError::Image {
            path: path.into(),
            source,
        }
    }
}
