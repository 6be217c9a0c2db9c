use clap::Parser;
use log::{error, info};
use std::path::{Path, PathBuf};

use cvtools::config::{Args, ProcessConfig, Task};
use cvtools::error::CvError;
use cvtools::types::{ClassLabelMap, IMG_FORMATS};
use cvtools::{dataset, pairs, pipeline};

fn main() {
    // Initialize the logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    if let Err(e) = run(&args) {
        error!("{e}");
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), CvError> {
    let data_dir = PathBuf::from(&args.data_dir);
    if !data_dir.is_dir() {
        return Err(CvError::io(
            &data_dir,
            std::io::Error::new(std::io::ErrorKind::NotFound, "data_dir does not exist"),
        ));
    }
    let save_dir = args
        .save_dir
        .as_ref()
        .map(PathBuf::from)
        .unwrap_or_else(|| data_dir.join("output"));
    let cfg = ProcessConfig::from(args);
    let class_map = args
        .labels
        .as_deref()
        .map(|path| ClassLabelMap::from_yaml_file(Path::new(path)))
        .transpose()?;

    match args.task {
        Task::Txt2Json => {
            let map = require_class_map(class_map.as_ref())?;
            let stats = pipeline::convert_indexed_to_json(&data_dir, &save_dir, map, &cfg)?;
            stats.print_summary();
        }
        Task::Json2Txt => {
            let map = require_class_map(class_map.as_ref())?;
            let stats = pipeline::convert_json_to_indexed(&data_dir, &save_dir, map, &cfg)?;
            stats.print_summary();
        }
        Task::Mask => {
            let stats = pipeline::apply_mask_policy(&data_dir, &save_dir, &cfg)?;
            stats.print_summary();
        }
        Task::Crop => {
            let stats =
                pipeline::crop_by_labels(&data_dir, &save_dir, class_map.as_ref(), &cfg)?;
            stats.print_summary();
        }
        Task::Split => {
            let stats = dataset::split_dataset(&data_dir, &save_dir, "txt", &cfg)?;
            stats.print_summary();
        }
        Task::CheckPairs => {
            let orphan_images = pairs::find_orphan_images(&data_dir, "json", IMG_FORMATS)?;
            let orphan_labels = pairs::find_orphan_labels(&data_dir, "json", IMG_FORMATS)?;
            info!(
                "{} orphan image(s), {} orphan label(s)",
                orphan_images.len(),
                orphan_labels.len()
            );
            for path in orphan_images.iter().chain(&orphan_labels) {
                info!("orphan: {}", path.display());
            }
            // Relocation mutates the source corpus, so it must be asked for
            if args.relocate {
                let issue_dir = save_dir.join("issue");
                let moved = pairs::relocate_to_issue(&orphan_images, &issue_dir)?
                    + pairs::relocate_to_issue(&orphan_labels, &issue_dir)?;
                info!("moved {moved} file(s) to {}", issue_dir.display());
            }
        }
    }

    Ok(())
}

fn require_class_map(map: Option<&ClassLabelMap>) -> Result<&ClassLabelMap, CvError> {
    map.ok_or_else(|| CvError::InvalidLabelMap {
        path: PathBuf::from("--labels"),
        reason: "this task needs a class label map, pass --labels <yaml>".to_string(),
    })
}
