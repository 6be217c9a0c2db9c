//! Corpus file discovery and annotation file I/O.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use glob::glob;
use log::error;

use crate::codec::{self, JsonAnnotation, ParsedAnnotation};
use crate::error::CvError;

/// List all files in `dir` with the given extension, sorted for
/// deterministic processing order.
pub fn list_files_with_extension(dir: &Path, ext: &str) -> Result<Vec<PathBuf>, CvError> {
    let pattern = format!("{}/*.{}", dir.display(), ext);
    let entries = glob(&pattern).map_err(|e| {
        CvError::io(
            dir,
            std::io::Error::new(std::io::ErrorKind::InvalidInput, e),
        )
    })?;
    let mut paths: Vec<PathBuf> = entries.filter_map(|entry| entry.ok()).collect();
    paths.sort();
    Ok(paths)
}

/// Read and parse an interchange JSON file.
pub fn read_annotation_json(path: &Path) -> Result<ParsedAnnotation, CvError> {
    let content = fs::read_to_string(path).map_err(|e| CvError::io(path, e))?;
    codec::parse_json(&content).map_err(|e| CvError::Json {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Write an interchange JSON document, pretty-printed, as one whole file.
pub fn write_annotation_json(path: &Path, doc: &JsonAnnotation) -> Result<(), CvError> {
    let file = File::create(path).map_err(|e| CvError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, doc).map_err(|e| CvError::Json {
        path: path.to_path_buf(),
        source: e,
    })?;
    writer.flush().map_err(|e| CvError::io(path, e))
}

pub fn write_text_file(path: &Path, content: &str) -> Result<(), CvError> {
    let file = File::create(path).map_err(|e| CvError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    writer
        .write_all(content.as_bytes())
        .map_err(|e| CvError::io(path, e))
}

pub fn create_output_directory(path: &Path) -> Result<PathBuf, CvError> {
    fs::create_dir_all(path).map_err(|e| CvError::io(path, e))?;
    Ok(path.to_path_buf())
}

/// Image dimensions from the codec boundary without decoding pixel data.
pub fn read_image_dimensions(path: &Path) -> Result<(u32, u32), CvError> {
    image::image_dimensions(path).map_err(|e| CvError::image(path, e))
}

/// Decode an image through the external codec.
pub fn open_image(path: &Path) -> Result<image::DynamicImage, CvError> {
    image::open(path).map_err(|e| CvError::image(path, e))
}

/// File stem as UTF-8, logging and skipping files with unrepresentable names.
pub fn file_stem_str(path: &Path) -> Option<&str> {
    match path.file_stem().and_then(|stem| stem.to_str()) {
        Some(stem) => Some(stem),
        None => {
            error!("file name is not valid UTF-8, skipped: {}", path.display());
            None
        }
    }
}
