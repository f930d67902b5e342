use clap::Parser;
use log::{error, info};
use std::path::PathBuf;
use std::process::ExitCode;

use coco2yolo::{merge_datasets, write_merged_summary, MergeArgs, MergeSource, Result};

fn run(args: &MergeArgs) -> Result<()> {
    let sources: Vec<MergeSource> = args
        .sources()?
        .into_iter()
        .map(|(root, class_id)| MergeSource::new(root, class_id))
        .collect();
    let target = PathBuf::from(&args.output_dir);

    let reports = merge_datasets(&sources, &target)?;
    for report in &reports {
        info!(
            "'{}' -> class {}: {} files written",
            report.dataset_name,
            report.class_id,
            report.stats.files_written()
        );
    }
    if args.write_summary {
        if let Some(path) = write_merged_summary(&target, &reports)? {
            info!("Summary written to {}", path.display());
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    // Initialize the logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = MergeArgs::parse();

    match run(&args) {
        Ok(()) => {
            info!("Datasets merged successfully.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Failed to merge datasets: {}", e);
            ExitCode::FAILURE
        }
    }
}
