//! Annotation interchange and geometric transforms for object-detection
//! datasets.
//!
//! Converts bounding-box annotations between the class-indexed normalized
//! text format and the polygon-based interchange JSON, derives pixel crops
//! and region masks from either representation, and partitions an
//! image/label corpus into disjoint train/validation subsets.

pub mod codec;
pub mod config;
pub mod crop;
pub mod dataset;
pub mod error;
pub mod geometry;
pub mod io;
pub mod mask;
pub mod pairs;
pub mod pipeline;
pub mod types;

// Re-export commonly used types and functions
pub use codec::{
    parse_indexed_for_crop, parse_indexed_text, parse_json, serialize_to_indexed,
    serialize_to_json, ParsedAnnotation, INTERCHANGE_VERSION,
};
pub use config::{Args, LabelFormat, PixelPolicy, ProcessConfig, Task};
pub use dataset::{partition, resolve_image_for_label, split_dataset};
pub use error::CvError;
pub use geometry::BoundingBox;
pub use mask::{apply_policy, build_mask, RegionMask};
pub use pairs::{find_orphan_images, find_orphan_labels, relocate_to_issue};
pub use types::{
    AnnotationRecord, ClassLabelMap, DatasetSplit, ProcessingStats, Shape, ShapeGeometry,
    IMG_FORMATS,
};
