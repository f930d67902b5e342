use clap::Parser;
use log::{error, info};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use coco2yolo::{render_dataset, RasterCodec, RenderArgs, Result};

fn run(args: &RenderArgs) -> Result<()> {
    let codec = RasterCodec::new(args.font.as_deref().map(Path::new))?;
    let reports = render_dataset(&codec, &PathBuf::from(&args.data), &args.output_name)?;
    for (role, stats) in reports {
        info!("[{}] {} images rendered", role, stats.images_rendered);
    }
    Ok(())
}

fn main() -> ExitCode {
    // Initialize the logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = RenderArgs::parse();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Failed to render ground truth: {}", e);
            ExitCode::FAILURE
        }
    }
}
