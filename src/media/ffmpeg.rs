use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};

use image::RgbImage;
use tracing::debug;

use crate::error::PipelineError;
use crate::media::{mimetype, VideoProperties, VideoSource};

/// Video source backed by an ffmpeg subprocess.
///
/// Properties come from one `ffprobe` invocation; frames are then streamed as
/// packed rgb24 rawvideo off the child's stdout, width*height*3 bytes each.
/// The child is exclusively owned here and reaped on every exit path.
#[derive(Debug)]
pub struct FfmpegSource {
    path: PathBuf,
    properties: VideoProperties,
    child: Child,
    stdout: ChildStdout,
    finished: bool,
}

impl FfmpegSource {
    pub fn open(path: &Path) -> Result<Self, PipelineError> {
        if !path.is_file() {
            return Err(PipelineError::unreadable(path, "file not found"));
        }
        if !mimetype::looks_like_video(path)? {
            return Err(PipelineError::unreadable(
                path,
                "not a recognized video format",
            ));
        }

        let properties = probe(path)?;
        debug!(?properties, "probed video");

        let mut child = Command::new("ffmpeg")
            .arg("-i")
            .arg(path)
            .args(["-f", "rawvideo", "-pix_fmt", "rgb24", "-"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| PipelineError::unreadable(path, format!("failed to spawn ffmpeg: {e}")))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| PipelineError::unreadable(path, "failed to open ffmpeg stdout"))?;

        Ok(Self {
            path: path.to_path_buf(),
            properties,
            child,
            stdout,
            finished: false,
        })
    }

    fn frame_len(&self) -> usize {
        self.properties.width as usize * self.properties.height as usize * 3
    }
}

impl VideoSource for FfmpegSource {
    fn properties(&self) -> &VideoProperties {
        &self.properties
    }

    fn next_frame(&mut self) -> Result<Option<RgbImage>, PipelineError> {
        if self.finished {
            return Ok(None);
        }

        let mut buf = vec![0u8; self.frame_len()];
        let mut filled = 0;
        while filled < buf.len() {
            let n = self
                .stdout
                .read(&mut buf[filled..])
                .map_err(|e| PipelineError::unreadable(&self.path, format!("read failed: {e}")))?;
            if n == 0 {
                break;
            }
            filled += n;
        }

        if filled == 0 {
            // Clean end of stream. The child must still have exited cleanly,
            // otherwise the whole run is untrustworthy.
            self.finished = true;
            let status = self.child.wait().map_err(|e| {
                PipelineError::unreadable(&self.path, format!("failed to wait on ffmpeg: {e}"))
            })?;
            if !status.success() {
                return Err(PipelineError::unreadable(
                    &self.path,
                    format!("ffmpeg exited with {status}"),
                ));
            }
            return Ok(None);
        }

        if filled < buf.len() {
            self.finished = true;
            return Err(PipelineError::unreadable(
                &self.path,
                format!("truncated frame: got {filled} of {} bytes", buf.len()),
            ));
        }

        let image = RgbImage::from_raw(self.properties.width, self.properties.height, buf)
            .ok_or_else(|| PipelineError::unreadable(&self.path, "frame buffer size mismatch"))?;
        Ok(Some(image))
    }
}

impl Drop for FfmpegSource {
    fn drop(&mut self) {
        // Guaranteed release: if the run was aborted mid-stream the decoder
        // child is still alive and must not be leaked.
        if !self.finished {
            let _ = self.child.kill();
        }
        let _ = self.child.wait();
    }
}

fn probe(path: &Path) -> Result<VideoProperties, PipelineError> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
            "-select_streams",
            "v:0",
        ])
        .arg(path)
        .output()
        .map_err(|e| PipelineError::unreadable(path, format!("failed to run ffprobe: {e}")))?;

    if !output.status.success() {
        return Err(PipelineError::unreadable(
            path,
            format!("ffprobe failed: {}", String::from_utf8_lossy(&output.stderr)),
        ));
    }

    let json: serde_json::Value = serde_json::from_slice(&output.stdout)
        .map_err(|e| PipelineError::unreadable(path, format!("unparseable ffprobe output: {e}")))?;

    let stream = json["streams"]
        .as_array()
        .and_then(|s| s.first())
        .ok_or_else(|| PipelineError::unreadable(path, "no video stream found"))?;

    let width = stream["width"].as_u64().unwrap_or(0) as u32;
    let height = stream["height"].as_u64().unwrap_or(0) as u32;
    if width == 0 || height == 0 {
        return Err(PipelineError::unreadable(path, "stream reports zero dimensions"));
    }

    // "30000/1001" style rationals; a missing or malformed rate resolves to
    // zero, which the sampler treats as "every frame".
    let frame_rate = stream["r_frame_rate"]
        .as_str()
        .or_else(|| stream["avg_frame_rate"].as_str())
        .map(parse_rate)
        .unwrap_or(0.0);

    let total_frames = stream["nb_frames"]
        .as_str()
        .and_then(|n| n.parse::<u64>().ok());

    Ok(VideoProperties {
        frame_rate,
        total_frames,
        width,
        height,
    })
}

fn parse_rate(raw: &str) -> f64 {
    if let Some((num, den)) = raw.split_once('/') {
        let num: f64 = num.parse().unwrap_or(0.0);
        let den: f64 = den.parse().unwrap_or(0.0);
        if den != 0.0 {
            return num / den;
        }
        return 0.0;
    }
    raw.parse().unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rational_frame_rates() {
        assert!((parse_rate("30000/1001") - 29.97).abs() < 0.01);
        assert_eq!(parse_rate("25/1"), 25.0);
        assert_eq!(parse_rate("30"), 30.0);
    }

    #[test]
    fn degenerate_rates_resolve_to_zero() {
        assert_eq!(parse_rate("0/0"), 0.0);
        assert_eq!(parse_rate("garbage"), 0.0);
        assert_eq!(parse_rate(""), 0.0);
    }

    #[test]
    fn missing_file_is_unreadable() {
        let err = FfmpegSource::open(Path::new("/no/such/clip.mp4")).unwrap_err();
        assert!(matches!(err, PipelineError::UnreadableVideo { .. }));
    }
}
