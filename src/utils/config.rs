use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::ValueEnum;
use tracing::info;
use walkdir::WalkDir;

use crate::error::PipelineError;

const ENV_FILE: &str = ".env";
const SEARCH_DEPTH: usize = 5;

/// Which detector weights to load when no explicit model path is given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModelVariant {
    /// yolov8n: small and quick.
    Fast,
    /// yolov8s: slower, better recall.
    Accurate,
}

impl ModelVariant {
    fn file_name(self) -> &'static str {
        match self {
            ModelVariant::Fast => "yolov8n.onnx",
            ModelVariant::Accurate => "yolov8s.onnx",
        }
    }

    fn env_key(self) -> &'static str {
        match self {
            ModelVariant::Fast => "FAST_MODEL_PATH",
            ModelVariant::Accurate => "ACCURATE_MODEL_PATH",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SamplingInterval {
    EveryFrame,
    Seconds(f64),
}

#[derive(Debug, Clone, Copy)]
pub struct PipelineConfig {
    /// Detections at or below this confidence are dropped.
    pub confidence_threshold: f32,
    pub sampling_interval: SamplingInterval,
    /// Normalize sampled frames to this size before detection.
    pub target_resolution: Option<(u32, u32)>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.5,
            sampling_interval: SamplingInterval::Seconds(1.0),
            target_resolution: None,
        }
    }
}

impl PipelineConfig {
    /// Reject invalid values before the run starts.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if !self.confidence_threshold.is_finite()
            || !(0.0..=1.0).contains(&self.confidence_threshold)
        {
            return Err(PipelineError::Configuration(format!(
                "confidence threshold {} must be within [0, 1]",
                self.confidence_threshold
            )));
        }
        if let SamplingInterval::Seconds(secs) = self.sampling_interval {
            if !secs.is_finite() || secs <= 0.0 {
                return Err(PipelineError::Configuration(format!(
                    "sampling interval {secs} must be a positive number of seconds"
                )));
            }
        }
        if let Some((w, h)) = self.target_resolution {
            if w == 0 || h == 0 {
                return Err(PipelineError::Configuration(
                    "target resolution must be non-zero in both dimensions".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// clap value parser: a positive seconds value, or "every-frame".
pub fn parse_interval(raw: &str) -> Result<SamplingInterval, String> {
    if raw.eq_ignore_ascii_case("every-frame") {
        return Ok(SamplingInterval::EveryFrame);
    }
    raw.parse::<f64>()
        .map(SamplingInterval::Seconds)
        .map_err(|_| format!("expected a number of seconds or \"every-frame\", got {raw:?}"))
}

/// clap value parser: "WIDTHxHEIGHT", e.g. "640x640".
pub fn parse_resolution(raw: &str) -> Result<(u32, u32), String> {
    let (w, h) = raw
        .split_once('x')
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got {raw:?}"))?;
    let w = w.parse().map_err(|_| format!("bad width in {raw:?}"))?;
    let h = h.parse().map_err(|_| format!("bad height in {raw:?}"))?;
    Ok((w, h))
}

/// Resolve the weights for a model variant.
///
/// Checks the `.env` cache first, then searches nearby directories, then
/// persists the result back so the next run skips the search.
pub fn locate_model(variant: ModelVariant) -> Result<PathBuf> {
    let env_path = Path::new(ENV_FILE);

    if env_path.exists() {
        if let Ok(Some(path)) = load_from_env(env_path, variant.env_key()) {
            if path.is_file() {
                info!(?path, "loaded model path from {ENV_FILE}");
                return Ok(path);
            }
        }
    }

    info!("searching filesystem for {}", variant.file_name());
    let found = find_file(variant.file_name(), SEARCH_DEPTH)?;
    info!(path = ?found, "found model");

    save_to_env(env_path, variant.env_key(), &found)?;
    Ok(found)
}

fn find_file(filename: &str, max_depth: usize) -> Result<PathBuf> {
    let root = std::env::current_dir()?;

    let hit = WalkDir::new(&root)
        .max_depth(max_depth)
        .into_iter()
        .filter_map(|e| e.ok())
        .find(|e| e.file_name() == filename);
    if let Some(entry) = hit {
        return Ok(entry.path().to_path_buf());
    }

    // Running from a subdirectory of a checkout is common enough that the
    // parent gets one try too.
    if let Some(parent) = root.parent() {
        let hit = WalkDir::new(parent)
            .max_depth(max_depth)
            .into_iter()
            .filter_map(|e| e.ok())
            .find(|e| e.file_name() == filename);
        if let Some(entry) = hit {
            return Ok(entry.path().to_path_buf());
        }
    }

    Err(anyhow!(
        "could not find '{}' in nearby directories; pass --model explicitly",
        filename
    ))
}

fn load_from_env(path: &Path, key: &str) -> Result<Option<PathBuf>> {
    let file = File::open(path)?;
    for line in BufReader::new(file).lines() {
        let line = line?;
        if let Some((k, v)) = line.split_once('=') {
            if k.trim() == key {
                return Ok(Some(PathBuf::from(v.trim())));
            }
        }
    }
    Ok(None)
}

fn save_to_env(path: &Path, key: &str, value: &Path) -> Result<()> {
    // Rewrite the file, keeping any other keys intact.
    let mut lines: Vec<String> = if path.exists() {
        BufReader::new(File::open(path)?)
            .lines()
            .collect::<std::io::Result<Vec<_>>>()?
            .into_iter()
            .filter(|l| l.split_once('=').map(|(k, _)| k.trim() != key).unwrap_or(true))
            .collect()
    } else {
        Vec::new()
    };
    lines.push(format!("{}={}", key, value.display()));

    let mut file = File::create(path).with_context(|| format!("failed to write {path:?}"))?;
    for line in &lines {
        writeln!(file, "{line}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn default_config_is_valid() {
        assert!(PipelineConfig::default().validate().is_ok());
    }

    #[test]
    fn out_of_range_threshold_is_rejected() {
        for bad in [-0.1f32, 1.1, f32::NAN] {
            let config = PipelineConfig {
                confidence_threshold: bad,
                ..Default::default()
            };
            assert!(matches!(
                config.validate(),
                Err(PipelineError::Configuration(_))
            ));
        }
    }

    #[test]
    fn non_positive_interval_is_rejected() {
        for bad in [0.0f64, -2.0, f64::INFINITY] {
            let config = PipelineConfig {
                sampling_interval: SamplingInterval::Seconds(bad),
                ..Default::default()
            };
            assert!(matches!(
                config.validate(),
                Err(PipelineError::Configuration(_))
            ));
        }
    }

    #[test]
    fn interval_parser_accepts_seconds_and_every_frame() {
        assert_eq!(parse_interval("2.5"), Ok(SamplingInterval::Seconds(2.5)));
        assert_eq!(parse_interval("every-frame"), Ok(SamplingInterval::EveryFrame));
        assert!(parse_interval("sometimes").is_err());
    }

    #[test]
    fn resolution_parser_wants_width_x_height() {
        assert_eq!(parse_resolution("640x480"), Ok((640, 480)));
        assert!(parse_resolution("640").is_err());
        assert!(parse_resolution("wxh").is_err());
    }

    #[test]
    fn env_round_trip_preserves_other_keys() -> Result<()> {
        let path = std::env::temp_dir().join("video_activity_env_test");
        let fast = PathBuf::from("/tmp/yolov8n.onnx");
        let accurate = PathBuf::from("/tmp/yolov8s.onnx");

        save_to_env(&path, "FAST_MODEL_PATH", &fast)?;
        save_to_env(&path, "ACCURATE_MODEL_PATH", &accurate)?;

        assert_eq!(load_from_env(&path, "FAST_MODEL_PATH")?, Some(fast));
        assert_eq!(load_from_env(&path, "ACCURATE_MODEL_PATH")?, Some(accurate));
        assert_eq!(load_from_env(&path, "MISSING_KEY")?, None);

        fs::remove_file(path)?;
        Ok(())
    }
}
