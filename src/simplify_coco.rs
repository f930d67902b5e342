use clap::Parser;
use log::{error, info};
use std::path::PathBuf;
use std::process::ExitCode;

use coco2yolo::{simplify_document, SimplifyArgs};

fn main() -> ExitCode {
    // Initialize the logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = SimplifyArgs::parse();

    let output_dir = PathBuf::from(&args.output_dir);
    for document in &args.documents {
        match simplify_document(&PathBuf::from(document), &output_dir, args.on_missing_image) {
            Ok(report) => info!(
                "{}: {} images copied into {}",
                document,
                report.images_copied,
                report.images_dir.display()
            ),
            Err(e) => {
                error!("Failed to simplify {}: {}", document, e);
                return ExitCode::FAILURE;
            }
        }
    }
    ExitCode::SUCCESS
}
