//! Artifact naming: filesystem-safe titles and the three per-video files.

use std::path::{Path, PathBuf};

/// Name used when a title has nothing usable left after sanitizing.
pub const PLACEHOLDER_NAME: &str = "video";

/// Maximum length of a sanitized title, in characters.
pub const MAX_NAME_CHARS: usize = 200;

const ILLEGAL_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Makes a title safe to use as a file name.
///
/// Illegal characters become `_`, surrounding whitespace is trimmed, and the
/// result is capped at [`MAX_NAME_CHARS`]. A title made only of illegal
/// characters and whitespace becomes [`PLACEHOLDER_NAME`].
#[must_use]
pub fn sanitize_filename(title: &str) -> String {
    if title
        .chars()
        .all(|c| ILLEGAL_CHARS.contains(&c) || c.is_whitespace())
    {
        return PLACEHOLDER_NAME.to_string();
    }

    let replaced: String = title
        .chars()
        .map(|c| if ILLEGAL_CHARS.contains(&c) { '_' } else { c })
        .collect();

    replaced.trim().chars().take(MAX_NAME_CHARS).collect()
}

/// The files a single video run reads and writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    /// Raw video stream (`<name>_video.<ext>`).
    pub video: PathBuf,
    /// Raw audio stream (`<name>_audio.<ext>`).
    pub audio: PathBuf,
    /// Final merged file (`<name>.<ext>`).
    pub output: PathBuf,
    /// Where the muxer writes before the output is published (`<name>.part.<ext>`).
    pub staging: PathBuf,
}

impl ArtifactPaths {
    /// Derives the artifact paths for `title` inside `dir`.
    #[must_use]
    pub fn new(dir: &Path, title: &str, extension: &str) -> Self {
        let name = sanitize_filename(title);
        Self {
            video: dir.join(format!("{name}_video.{extension}")),
            audio: dir.join(format!("{name}_audio.{extension}")),
            output: dir.join(format!("{name}.{extension}")),
            staging: dir.join(format!("{name}.part.{extension}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_illegal_characters() {
        assert_eq!(sanitize_filename("My:Video/Title?"), "My_Video_Title_");
        assert_eq!(sanitize_filename("a<b>c\"d\\e|f*g"), "a_b_c_d_e_f_g");
    }

    #[test]
    fn trims_whitespace() {
        assert_eq!(sanitize_filename("  spaced out \t"), "spaced out");
    }

    #[test]
    fn all_illegal_becomes_placeholder() {
        assert_eq!(sanitize_filename("<>:\"/\\|?*"), "video");
        assert_eq!(sanitize_filename(" ? / "), "video");
        assert_eq!(sanitize_filename(""), "video");
    }

    #[test]
    fn long_titles_are_truncated() {
        let title = "a".repeat(300);
        assert_eq!(sanitize_filename(&title).len(), 200);
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let title = "é".repeat(250);
        let safe = sanitize_filename(&title);
        assert_eq!(safe.chars().count(), 200);
    }

    #[test]
    fn artifact_paths_share_a_stem() {
        let paths = ArtifactPaths::new(Path::new("/out"), "My:Clip", "mp4");
        assert_eq!(paths.video, PathBuf::from("/out/My_Clip_video.mp4"));
        assert_eq!(paths.audio, PathBuf::from("/out/My_Clip_audio.mp4"));
        assert_eq!(paths.output, PathBuf::from("/out/My_Clip.mp4"));
        assert_eq!(paths.staging, PathBuf::from("/out/My_Clip.part.mp4"));
    }
}
