//! Detection of unpaired corpus files. The scans are pure; moving the
//! offenders anywhere is a separate, explicitly requested step.

use std::fs;
use std::path::{Path, PathBuf};

use log::info;

use crate::dataset::resolve_image_for_label;
use crate::error::CvError;
use crate::io::{create_output_directory, file_stem_str, list_files_with_extension};

/// Images under `dir` with no same-stem label file, sorted.
pub fn find_orphan_images(
    dir: &Path,
    label_ext: &str,
    image_exts: &[&str],
) -> Result<Vec<PathBuf>, CvError> {
    let mut orphans = Vec::new();
    for ext in image_exts {
        for image_path in list_files_with_extension(dir, ext)? {
            let Some(stem) = file_stem_str(&image_path) else {
                continue;
            };
            if !dir.join(format!("{stem}.{label_ext}")).exists() {
                orphans.push(image_path);
            }
        }
    }
    orphans.sort();
    Ok(orphans)
}

/// Label files under `dir` with no same-stem image among `image_exts`,
/// sorted.
pub fn find_orphan_labels(
    dir: &Path,
    label_ext: &str,
    image_exts: &[&str],
) -> Result<Vec<PathBuf>, CvError> {
    let mut orphans = Vec::new();
    for label_path in list_files_with_extension(dir, label_ext)? {
        let Some(stem) = file_stem_str(&label_path) else {
            continue;
        };
        if resolve_image_for_label(dir, stem, image_exts).is_none() {
            orphans.push(label_path);
        }
    }
    orphans.sort();
    Ok(orphans)
}

/// Move the given files into `issue_dir`, creating it if needed. Returns
/// how many were moved. Files that fail to move are logged and counted in
/// neither direction; the rest still move.
pub fn relocate_to_issue(paths: &[PathBuf], issue_dir: &Path) -> Result<usize, CvError> {
    create_output_directory(issue_dir)?;
    let mut moved = 0;
    for path in paths {
        let Some(name) = path.file_name() else {
            continue;
        };
        match fs::rename(path, issue_dir.join(name)) {
            Ok(()) => {
                info!("moved {} to {}", path.display(), issue_dir.display());
                moved += 1;
            }
            Err(e) => log::error!("failed to move {}: {e}", path.display()),
        }
    }
    Ok(moved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::IMG_FORMATS;

    #[test]
    fn orphan_detection_matches_pairing() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.jpg"), "").unwrap();
        fs::write(dir.path().join("a.json"), "{}").unwrap();
        fs::write(dir.path().join("b.jpg"), "").unwrap();

        let orphan_images = find_orphan_images(dir.path(), "json", IMG_FORMATS).unwrap();
        assert_eq!(orphan_images.len(), 1);
        assert_eq!(orphan_images[0].file_name().unwrap(), "b.jpg");

        let orphan_labels = find_orphan_labels(dir.path(), "json", IMG_FORMATS).unwrap();
        assert!(orphan_labels.is_empty());
    }

    #[test]
    fn labels_without_any_image_extension_are_orphans() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("x.json"), "{}").unwrap();
        fs::write(dir.path().join("y.json"), "{}").unwrap();
        fs::write(dir.path().join("y.png"), "").unwrap();

        let orphans = find_orphan_labels(dir.path(), "json", IMG_FORMATS).unwrap();
        assert_eq!(orphans.len(), 1);
        assert_eq!(orphans[0].file_name().unwrap(), "x.json");
    }

    #[test]
    fn scans_do_not_move_anything() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.jpg"), "").unwrap();
        let orphans = find_orphan_images(dir.path(), "json", IMG_FORMATS).unwrap();
        assert_eq!(orphans.len(), 1);
        assert!(dir.path().join("b.jpg").exists());
    }

    #[test]
    fn relocate_moves_into_issue_dir() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.jpg"), "").unwrap();
        let orphans = find_orphan_images(dir.path(), "json", IMG_FORMATS).unwrap();

        let issue = dir.path().join("issue");
        let moved = relocate_to_issue(&orphans, &issue).unwrap();
        assert_eq!(moved, 1);
        assert!(!dir.path().join("b.jpg").exists());
        assert!(issue.join("b.jpg").exists());
    }
}
