use anyhow::{bail, Context, Result};
use bgstrip::pipeline::{PipelineEvent, PipelineWorker};
use bgstrip::segmentation::{self, SelfieOptions, TensorLayout};
use bgstrip::{BackgroundColor, FfmpegBackend, PipelineConfig, DEFAULT_OUTPUT};
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input video file
    input: PathBuf,

    /// Output video file (MP4, no audio)
    #[arg(short, long, default_value = DEFAULT_OUTPUT)]
    output: PathBuf,

    /// Path to segmentation model (ONNX file)
    #[arg(short, long)]
    model: PathBuf,

    /// Model input width
    #[arg(long, default_value_t = 256)]
    model_width: u32,

    /// Model input height
    #[arg(long, default_value_t = 144)]
    model_height: u32,

    /// Model input tensor layout (nhwc or nchw)
    #[arg(long, default_value = "nhwc")]
    layout: TensorLayout,

    /// Background color (#rrggbb or r,g,b)
    #[arg(short, long, default_value = "#000000")]
    background: BackgroundColor,

    /// Inference threads
    #[arg(long, default_value_t = 4)]
    threads: usize,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    tracing::info!("bgstrip starting");
    tracing::info!("Input: {}", args.input.display());
    tracing::info!("Output: {}", args.output.display());
    tracing::info!("Background: {}", args.background);

    let options = SelfieOptions {
        input_width: args.model_width,
        input_height: args.model_height,
        layout: args.layout,
        intra_threads: args.threads,
    };
    let model = segmentation::load_default_model(&args.model, options)
        .context("Failed to load segmentation model")?;

    let config = PipelineConfig::default().with_background(args.background);
    let worker = PipelineWorker::spawn(FfmpegBackend, model, config)
        .context("Failed to start pipeline worker")?;

    worker
        .submit(&args.input, &args.output)
        .context("Failed to submit run")?;

    for event in worker.events().iter() {
        match event {
            PipelineEvent::Progress { current, total } => {
                if current % 30 == 0 || current == total {
                    tracing::info!("Processing frame {} of {}", current, total);
                }
            }
            PipelineEvent::Finished { success: true, message } => {
                tracing::info!("{}", message);
                return Ok(());
            }
            PipelineEvent::Finished {
                success: false,
                message,
            } => bail!(message),
        }
    }

    bail!("pipeline worker stopped without reporting a result")
}
