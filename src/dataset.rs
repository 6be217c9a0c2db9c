//! Corpus partitioning into disjoint train/validation subsets and the copy
//! step that materializes a split on disk.

use std::fs;
use std::path::{Path, PathBuf};

use log::{info, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::config::ProcessConfig;
use crate::error::CvError;
use crate::io::{create_output_directory, file_stem_str, list_files_with_extension};
use crate::types::{DatasetSplit, ProcessingStats, IMG_FORMATS};

// Allow for f32 ratio pairs like 0.8 + 0.2 that sum a hair above 1.0
const RATIO_SUM_TOLERANCE: f32 = 1e-5;

/// Partition a corpus into disjoint train/val subsets.
///
/// `train_ratio` and `val_ratio` must each lie in (0, 1] and sum to at most
/// 1. A seeded Fisher-Yates shuffle followed by prefix slicing makes every
/// subset of the required size equally likely; the same seed reproduces the
/// same split. IDs covered by neither ratio land in `leftover_ids`.
pub fn partition(
    corpus_ids: &[String],
    train_ratio: f32,
    val_ratio: f32,
    seed: u64,
) -> Result<DatasetSplit, CvError> {
    let valid = |r: f32| r > 0.0 && r <= 1.0;
    if !valid(train_ratio) || !valid(val_ratio) || train_ratio + val_ratio > 1.0 + RATIO_SUM_TOLERANCE
    {
        return Err(CvError::InvalidSplitRatio {
            train: train_ratio,
            val: val_ratio,
        });
    }

    let mut ids = corpus_ids.to_vec();
    let mut rng = StdRng::seed_from_u64(seed);
    ids.shuffle(&mut rng);

    let n = ids.len();
    let n_train = (n as f32 * train_ratio).floor() as usize;
    let n_val = ((n as f32 * val_ratio).floor() as usize).min(n - n_train);

    let leftover_ids = ids.split_off(n_train + n_val);
    let val_ids = ids.split_off(n_train);

    Ok(DatasetSplit {
        train_ids: ids,
        val_ids,
        leftover_ids,
    })
}

/// Find the image belonging to a label stem, probing extensions in
/// preference order. `None` means the caller should skip the item.
pub fn resolve_image_for_label(
    dir: &Path,
    stem: &str,
    extensions: &[&str],
) -> Option<PathBuf> {
    extensions
        .iter()
        .map(|ext| dir.join(format!("{stem}.{ext}")))
        .find(|path| path.exists())
}

/// Partition the label corpus under `data_dir` and copy each train/val pair
/// into `images/{train,val}` and `labels/{train,val}` below `save_dir`.
///
/// Labels with no resolvable image are skipped and logged; leftover items
/// are copied nowhere and reported.
pub fn split_dataset(
    data_dir: &Path,
    save_dir: &Path,
    label_ext: &str,
    cfg: &ProcessConfig,
) -> Result<ProcessingStats, CvError> {
    let labels = list_files_with_extension(data_dir, label_ext)?;
    let stems: Vec<String> = labels
        .iter()
        .filter_map(|path| file_stem_str(path).map(str::to_string))
        .collect();

    let split = partition(&stems, cfg.train_ratio, cfg.val_ratio, cfg.seed)?;
    info!(
        "split: {} train, {} val, {} leftover",
        split.train_ids.len(),
        split.val_ids.len(),
        split.leftover_ids.len()
    );
    if !split.leftover_ids.is_empty() {
        warn!(
            "{} item(s) covered by neither ratio were excluded from the split",
            split.leftover_ids.len()
        );
    }

    let train_images = create_output_directory(&save_dir.join("images/train"))?;
    let val_images = create_output_directory(&save_dir.join("images/val"))?;
    let train_labels = create_output_directory(&save_dir.join("labels/train"))?;
    let val_labels = create_output_directory(&save_dir.join("labels/val"))?;

    let stats = ProcessingStats::new();
    let buckets = [
        (&split.train_ids, &train_images, &train_labels),
        (&split.val_ids, &val_images, &val_labels),
    ];
    for (ids, images_dir, labels_dir) in buckets {
        for stem in ids {
            let Some(image_path) = resolve_image_for_label(data_dir, stem, IMG_FORMATS) else {
                warn!("no image found for label '{stem}', skipped");
                stats.mark_skipped();
                continue;
            };
            let label_path = data_dir.join(format!("{stem}.{label_ext}"));
            let image_name = image_path.file_name().unwrap_or_default();
            let label_name = label_path.file_name().unwrap_or_default();

            let copied = fs::copy(&image_path, images_dir.join(image_name))
                .and_then(|_| fs::copy(&label_path, labels_dir.join(label_name)));
            match copied {
                Ok(_) => stats.mark_processed(),
                Err(e) => {
                    log::error!("failed to copy pair '{stem}': {e}");
                    stats.mark_errored();
                }
            }
        }
    }

    Ok(stats)
}
