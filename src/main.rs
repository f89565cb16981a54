mod error;
mod media;
mod ml;
mod pipeline;
mod utils;

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use indicatif::ProgressBar;
use tracing::info;

use crate::media::ffmpeg::FfmpegSource;
use crate::media::VideoSource;
use crate::ml::engine::YoloDetector;
use crate::pipeline::sampler;
use crate::utils::config::{self, ModelVariant, PipelineConfig, SamplingInterval};

#[derive(Parser, Debug)]
#[command(author, version, about = "Summarize the objects seen across a video")]
struct Args {
    /// Video file to summarize
    input: PathBuf,

    /// Detector variant to load when --model is not given
    #[arg(long, value_enum, default_value_t = ModelVariant::Fast)]
    variant: ModelVariant,

    /// Explicit path to YOLOv8 ONNX weights, bypassing discovery
    #[arg(short, long)]
    model: Option<PathBuf>,

    /// Confidence threshold; detections at or below it are dropped
    #[arg(short, long, default_value_t = 0.5)]
    confidence: f32,

    /// Seconds between sampled frames, or "every-frame"
    #[arg(short, long, default_value = "1", value_parser = config::parse_interval)]
    interval: SamplingInterval,

    /// Normalize sampled frames to WIDTHxHEIGHT before detection
    #[arg(long, value_parser = config::parse_resolution)]
    resize: Option<(u32, u32)>,

    /// Emit the report as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let config = PipelineConfig {
        confidence_threshold: args.confidence,
        sampling_interval: args.interval,
        target_resolution: args.resize,
    };
    config.validate()?;

    let model_path = match args.model {
        Some(path) => path,
        None => config::locate_model(args.variant)?,
    };
    info!(model = ?model_path, "loading detector");
    let mut detector = YoloDetector::load(&model_path)?;

    let source = FfmpegSource::open(&args.input)?;
    let props = source.properties().clone();
    info!(
        frame_rate = props.frame_rate,
        total_frames = ?props.total_frames,
        "opened {:?}", args.input
    );

    let stride = sampler::resolve_stride(props.frame_rate, config.sampling_interval);
    let progress = match props.total_frames {
        Some(total) => ProgressBar::new(total.div_ceil(stride)),
        None => ProgressBar::new_spinner(),
    };

    let report = pipeline::run(source, &mut detector, &config, &progress)?;
    progress.finish_and_clear();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Processed {} sampled frames.", report.frames_sampled);
    if report.frames_failed > 0 {
        println!(
            "{} frame(s) failed detection and contributed nothing.",
            report.frames_failed
        );
    }
    if report.summary.is_empty() {
        println!("No objects detected.");
    } else {
        println!("Detected object summary:");
        for entry in &report.summary.entries {
            println!("  {:>5}x {}", entry.count, entry.label);
        }
    }

    Ok(())
}
