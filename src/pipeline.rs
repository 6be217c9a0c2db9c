//! Batch drivers: each operation walks a corpus directory, fans out over
//! rayon, isolates per-item failures and returns aggregate counters.

use std::fs;
use std::path::{Path, PathBuf};

use indicatif::{ProgressBar, ProgressStyle};
use log::{error, warn};
use rayon::prelude::*;

use crate::codec::{
    parse_indexed_for_crop, parse_indexed_text, serialize_to_indexed, serialize_to_json,
};
use crate::config::{LabelFormat, ProcessConfig};
use crate::crop::{extract_crops, render_preview};
use crate::dataset::resolve_image_for_label;
use crate::error::CvError;
use crate::geometry::{clamp_and_pad, polygon_to_bounding_box};
use crate::io::{
    create_output_directory, file_stem_str, list_files_with_extension, open_image,
    read_annotation_json, read_image_dimensions, write_annotation_json, write_text_file,
};
use crate::mask::{apply_policy, build_mask};
use crate::types::{
    AnnotationRecord, ClassLabelMap, ProcessingStats, Shape, ShapeGeometry, IMG_FORMATS,
};

enum ItemOutcome {
    Processed,
    Skipped,
}

/// Create a progress bar with the given length and label
fn create_progress_bar(len: u64, label: &str) -> ProgressBar {
    let pb = ProgressBar::new(len);
    if let Ok(style) = ProgressStyle::default_bar().template(&format!(
        "{{spinner:.green}} [{}] [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{pos}}/{{len}} ({{eta}})",
        label
    )) {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb
}

// Per-item parallel loop shared by all batch operations
fn run_batch<T, F>(items: &[T], label: &str, handler: F) -> ProcessingStats
where
    T: Sync,
    F: Fn(&T) -> Result<ItemOutcome, CvError> + Sync,
{
    let stats = ProcessingStats::new();
    let pb = create_progress_bar(items.len() as u64, label);
    items.par_iter().for_each(|item| {
        match handler(item) {
            Ok(ItemOutcome::Processed) => stats.mark_processed(),
            Ok(ItemOutcome::Skipped) => stats.mark_skipped(),
            Err(e) => {
                error!("{e}");
                stats.mark_errored();
            }
        }
        pb.inc(1);
    });
    pb.finish_with_message(format!("{label} complete"));
    stats
}

fn log_warnings(path: &Path, warnings: &[CvError]) {
    for warning in warnings {
        warn!("{}: {}", path.display(), warning);
    }
}

// Replace each shape's geometry with its padded, clamped bounding-box
// rectangle. Degenerate results are dropped with a warning.
fn pad_record(record: AnnotationRecord, pad_x: f64, pad_y: f64) -> AnnotationRecord {
    let AnnotationRecord {
        image_path,
        image_width,
        image_height,
        shapes,
    } = record;
    let shapes = shapes
        .into_iter()
        .filter_map(|shape| {
            let bbox = match polygon_to_bounding_box(shape.points(), image_width, image_height) {
                Ok(bbox) => bbox,
                Err(e) => {
                    warn!("{image_path}: {e}");
                    return None;
                }
            };
            let padded = clamp_and_pad(&bbox, pad_x, pad_y, image_width, image_height);
            if padded.is_degenerate() {
                warn!(
                    "{image_path}: {}",
                    CvError::DegenerateBox {
                        label: shape.label.clone()
                    }
                );
                return None;
            }
            Some(Shape {
                geometry: ShapeGeometry::Rectangle(padded.corners()),
                ..shape
            })
        })
        .collect();
    AnnotationRecord {
        image_path,
        image_width,
        image_height,
        shapes,
    }
}

/// Convert every indexed txt label under `data_dir` into an interchange
/// JSON document under `save_dir`.
///
/// Each label needs a same-stem image to supply pixel dimensions; labels
/// without one are skipped. Boxes are padded per the config, then clamped.
pub fn convert_indexed_to_json(
    data_dir: &Path,
    save_dir: &Path,
    class_map: &ClassLabelMap,
    cfg: &ProcessConfig,
) -> Result<ProcessingStats, CvError> {
    let labels = list_files_with_extension(data_dir, "txt")?;
    create_output_directory(save_dir)?;

    let stats = run_batch(&labels, "Txt2Json", |label_path| {
        let Some(stem) = file_stem_str(label_path) else {
            return Ok(ItemOutcome::Skipped);
        };
        let Some(image_path) = resolve_image_for_label(data_dir, stem, IMG_FORMATS) else {
            warn!(
                "{}",
                CvError::MissingPair {
                    path: label_path.clone()
                }
            );
            return Ok(ItemOutcome::Skipped);
        };
        let (img_w, img_h) = read_image_dimensions(&image_path)?;
        let content =
            fs::read_to_string(label_path).map_err(|e| CvError::io(label_path.clone(), e))?;

        let image_name = image_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(stem);
        let parsed = parse_indexed_text(&content, image_name, img_w, img_h, class_map);
        log_warnings(label_path, &parsed.warnings);

        let record = pad_record(parsed.record, cfg.pad_x, cfg.pad_y);
        let out_path = save_dir.join(format!("{stem}.json"));
        write_annotation_json(&out_path, &serialize_to_json(&record))?;
        Ok(ItemOutcome::Processed)
    });

    Ok(stats)
}

/// Convert every interchange JSON document under `data_dir` into an indexed
/// txt label under `save_dir`.
pub fn convert_json_to_indexed(
    data_dir: &Path,
    save_dir: &Path,
    class_map: &ClassLabelMap,
    cfg: &ProcessConfig,
) -> Result<ProcessingStats, CvError> {
    let jsons = list_files_with_extension(data_dir, "json")?;
    create_output_directory(save_dir)?;

    let stats = run_batch(&jsons, "Json2Txt", |json_path| {
        let Some(stem) = file_stem_str(json_path) else {
            return Ok(ItemOutcome::Skipped);
        };
        let parsed = read_annotation_json(json_path)?;
        log_warnings(json_path, &parsed.warnings);

        let record = if cfg.pad_x != 0.0 || cfg.pad_y != 0.0 {
            pad_record(parsed.record, cfg.pad_x, cfg.pad_y)
        } else {
            parsed.record
        };
        let (text, warnings) = serialize_to_indexed(&record, class_map);
        log_warnings(json_path, &warnings);

        write_text_file(&save_dir.join(format!("{stem}.txt")), &text)?;
        Ok(ItemOutcome::Processed)
    });

    Ok(stats)
}

/// Apply the configured pixel policy to every annotated image under
/// `data_dir`, writing the transformed copies into `save_dir`.
pub fn apply_mask_policy(
    data_dir: &Path,
    save_dir: &Path,
    cfg: &ProcessConfig,
) -> Result<ProcessingStats, CvError> {
    let jsons = list_files_with_extension(data_dir, "json")?;
    create_output_directory(save_dir)?;

    let stats = run_batch(&jsons, "Mask", |json_path| {
        let Some(stem) = file_stem_str(json_path) else {
            return Ok(ItemOutcome::Skipped);
        };
        let Some(image_path) = resolve_image_for_label(data_dir, stem, IMG_FORMATS) else {
            warn!(
                "{}",
                CvError::MissingPair {
                    path: json_path.clone()
                }
            );
            return Ok(ItemOutcome::Skipped);
        };

        let image = open_image(&image_path)?.to_rgb8();
        let parsed = read_annotation_json(json_path)?;
        log_warnings(json_path, &parsed.warnings);

        let (mask, warnings) = build_mask(image.width(), image.height(), &parsed.record.shapes);
        log_warnings(json_path, &warnings);

        let result = apply_policy(&image, &mask, cfg.policy);
        let out_path = save_dir.join(image_path.file_name().unwrap_or_default());
        result
            .save(&out_path)
            .map_err(|e| CvError::image(out_path.clone(), e))?;
        Ok(ItemOutcome::Processed)
    });

    Ok(stats)
}

// Locate the label file for an image stem according to the configured
// format; Auto probes json first, then txt.
fn find_label_for_image(
    data_dir: &Path,
    stem: &str,
    format: LabelFormat,
) -> Option<PathBuf> {
    let candidates: &[&str] = match format {
        LabelFormat::Indexed => &["txt"],
        LabelFormat::Json => &["json"],
        LabelFormat::Auto => &["json", "txt"],
    };
    candidates
        .iter()
        .map(|ext| data_dir.join(format!("{stem}.{ext}")))
        .find(|path| path.exists())
}

/// Crop every annotated region under `data_dir` into per-label folders
/// below `save_dir`, named `{stem}_{index}` within each folder.
pub fn crop_by_labels(
    data_dir: &Path,
    save_dir: &Path,
    class_map: Option<&ClassLabelMap>,
    cfg: &ProcessConfig,
) -> Result<ProcessingStats, CvError> {
    let mut images = Vec::new();
    for ext in IMG_FORMATS {
        images.extend(list_files_with_extension(data_dir, ext)?);
    }
    images.sort();
    create_output_directory(save_dir)?;

    let stats = run_batch(&images, "Crop", |image_path| {
        let Some(stem) = file_stem_str(image_path) else {
            return Ok(ItemOutcome::Skipped);
        };
        let Some(label_path) = find_label_for_image(data_dir, stem, cfg.label_format) else {
            warn!(
                "{}",
                CvError::MissingPair {
                    path: image_path.clone()
                }
            );
            return Ok(ItemOutcome::Skipped);
        };

        let image = open_image(image_path)?;
        let parsed = if label_path.extension().is_some_and(|ext| ext == "json") {
            read_annotation_json(&label_path)?
        } else {
            let content = fs::read_to_string(&label_path)
                .map_err(|e| CvError::io(label_path.clone(), e))?;
            parse_indexed_for_crop(&content, stem, image.width(), image.height(), class_map)
        };
        log_warnings(&label_path, &parsed.warnings);

        let record = AnnotationRecord {
            image_width: image.width(),
            image_height: image.height(),
            ..parsed.record
        };
        let record = pad_record(record, cfg.pad_x, cfg.pad_y);

        let (crops, warnings) = extract_crops(&record, &image);
        log_warnings(&label_path, &warnings);

        let ext = image_path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("png");
        for (index, (label, crop)) in crops.iter().enumerate() {
            let class_dir = create_output_directory(&save_dir.join(sanitize_filename::sanitize(label)))?;
            let out_path = class_dir.join(format!(
                "{}_{}.{}",
                sanitize_filename::sanitize(stem),
                index,
                ext
            ));
            crop.save(&out_path)
                .map_err(|e| CvError::image(out_path.clone(), e))?;
        }

        if cfg.preview {
            let preview_dir = create_output_directory(&save_dir.join("preview"))?;
            let preview = render_preview(&image, &record.shapes, None);
            let out_path = preview_dir.join(format!("{}_preview.png", sanitize_filename::sanitize(stem)));
            preview
                .save(&out_path)
                .map_err(|e| CvError::image(out_path.clone(), e))?;
        }

        Ok(ItemOutcome::Processed)
    });

    Ok(stats)
}
