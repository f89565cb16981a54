use std::path::Path;

use crate::error::PipelineError;

/// Cheap magic-byte gate before handing a path to ffmpeg: anything that does
/// not sniff as `video/*` is rejected up front with a clearer message than a
/// decoder exit code.
pub fn looks_like_video(path: &Path) -> Result<bool, PipelineError> {
    let kind = infer::get_from_path(path)
        .map_err(|e| PipelineError::unreadable(path, format!("cannot read file: {e}")))?;

    Ok(kind
        .map(|k| k.mime_type().starts_with("video/"))
        .unwrap_or(false))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn plain_text_is_not_a_video() {
        let dir = std::env::temp_dir();
        let path = dir.join("video_activity_mimetype_test.txt");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "definitely not a video container").unwrap();

        assert!(!looks_like_video(&path).unwrap());
        std::fs::remove_file(&path).unwrap();
    }
}
