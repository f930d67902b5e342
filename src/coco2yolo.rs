use clap::Parser;
use log::{error, info};
use std::path::PathBuf;
use std::process::ExitCode;

use coco2yolo::{process_dataset, ConvertArgs, ConvertOptions};

fn main() -> ExitCode {
    // Initialize the logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = ConvertArgs::parse();

    let coco_dir = PathBuf::from(&args.coco_dir);
    if !coco_dir.is_dir() {
        error!("The specified coco_dir does not exist: {}", args.coco_dir);
        return ExitCode::FAILURE;
    }

    info!("Starting the conversion process...");
    let options = ConvertOptions::from(&args);
    match process_dataset(&coco_dir, &PathBuf::from(&args.output_dir), &options) {
        Ok(report) => {
            info!(
                "Conversion completed, summary written to {}",
                report.summary_path.display()
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Failed to convert dataset: {}", e);
            ExitCode::FAILURE
        }
    }
}
