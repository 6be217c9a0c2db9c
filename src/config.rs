use clap::{Parser, ValueEnum};
use std::str::FromStr;

/// Command-line arguments for the dataset tooling.
#[derive(Parser, Debug, Clone)]
#[command(version, long_about = None)]
pub struct Args {
    /// The operation to run
    #[arg(value_enum)]
    pub task: Task,

    /// Directory containing paired image and label files
    #[arg(short = 'd', long = "data_dir")]
    pub data_dir: String,

    /// Output directory (defaults to <data_dir>/output)
    #[arg(long = "save_dir")]
    pub save_dir: Option<String>,

    /// YAML document mapping class ids to label names (a `names:` key)
    #[arg(long = "labels")]
    pub labels: Option<String>,

    /// Pixels to grow each box horizontally before clamping
    #[arg(long = "pad_x", default_value_t = 0.0)]
    pub pad_x: f64,

    /// Pixels to grow each box vertically before clamping
    #[arg(long = "pad_y", default_value_t = 0.0)]
    pub pad_y: f64,

    /// Proportion of the dataset to use for training
    #[arg(long = "train_size", default_value_t = 0.8, value_parser = validate_size)]
    pub train_size: f32,

    /// Proportion of the dataset to use for validation
    #[arg(long = "val_size", default_value_t = 0.2, value_parser = validate_size)]
    pub val_size: f32,

    /// Pixel-selection policy for the mask task
    #[arg(long = "policy", value_enum, default_value = "zero-outside")]
    pub policy: PixelPolicy,

    /// Seed for random shuffling
    #[arg(long = "seed", default_value_t = 42)]
    pub seed: u64,

    /// Label file format for the crop task
    #[arg(long = "label_format", value_enum, default_value = "auto")]
    pub label_format: LabelFormat,

    /// Also write preview images with drawn boxes during cropping
    #[arg(long = "preview")]
    pub preview: bool,

    /// Move orphan files into <save_dir>/issue during check-pairs
    #[arg(long = "relocate")]
    pub relocate: bool,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum Task {
    /// Convert indexed txt labels to interchange JSON
    #[value(name = "txt2json")]
    Txt2Json,
    /// Convert interchange JSON to indexed txt labels
    #[value(name = "json2txt")]
    Json2Txt,
    /// Apply a pixel policy outside/inside annotated regions
    Mask,
    /// Crop annotated regions into per-label folders
    Crop,
    /// Partition the corpus into train/val subsets
    Split,
    /// Report orphan images and orphan labels
    #[value(name = "check-pairs")]
    CheckPairs,
}

/// How pixels are rewritten relative to the region mask.
#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum PixelPolicy {
    /// Pixels outside the mask become black; inside unchanged
    ZeroOutside,
    /// Pixels inside the mask become white; outside unchanged
    WhiteInside,
    /// Inside white, outside black
    WhiteInsideBlackOutside,
}

/// On-disk label format, never inferred from file contents.
#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum LabelFormat {
    /// Class-indexed normalized txt
    Indexed,
    /// Interchange JSON
    Json,
    /// Probe known extensions in preference order (json, then txt)
    Auto,
}

/// Explicit configuration passed into every batch entry point.
#[derive(Debug, Clone)]
pub struct ProcessConfig {
    pub policy: PixelPolicy,
    pub pad_x: f64,
    pub pad_y: f64,
    pub train_ratio: f32,
    pub val_ratio: f32,
    pub seed: u64,
    pub label_format: LabelFormat,
    pub preview: bool,
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            policy: PixelPolicy::ZeroOutside,
            pad_x: 0.0,
            pad_y: 0.0,
            train_ratio: 0.8,
            val_ratio: 0.2,
            seed: 42,
            label_format: LabelFormat::Auto,
            preview: false,
        }
    }
}

impl From<&Args> for ProcessConfig {
    fn from(args: &Args) -> Self {
        Self {
            policy: args.policy,
            pad_x: args.pad_x,
            pad_y: args.pad_y,
            train_ratio: args.train_size,
            val_ratio: args.val_size,
            seed: args.seed,
            label_format: args.label_format,
            preview: args.preview,
        }
    }
}

// Validate that a ratio is between 0.0 and 1.0
fn validate_size(s: &str) -> Result<f32, String> {
    match f32::from_str(s) {
        Ok(val) if (0.0..=1.0).contains(&val) => Ok(val),
        _ => Err("SIZE must be between 0.0 and 1.0".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_size() {
        assert!(validate_size("0.5").is_ok());
        assert!(validate_size("1.0").is_ok());
        assert!(validate_size("0.0").is_ok());
        assert!(validate_size("-0.1").is_err());
        assert!(validate_size("1.1").is_err());
        assert!(validate_size("abc").is_err());
    }

    #[test]
    fn relocation_requires_its_own_flag() {
        let args = Args::try_parse_from(["cvtools", "check-pairs", "-d", ".", "--save_dir", "out"])
            .unwrap();
        assert!(!args.relocate);

        let args = Args::try_parse_from(["cvtools", "check-pairs", "-d", ".", "--relocate"])
            .unwrap();
        assert!(args.relocate);
    }
}
