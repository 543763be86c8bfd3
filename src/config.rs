//! Configuration types for download-and-merge runs.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Configuration for a download-and-merge run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Highest video height (in lines) the selector may pick.
    pub max_resolution: u32,
    /// Whether to keep the separate video/audio files after a successful merge.
    pub keep_intermediates: bool,
    /// Whether to ignore existing files and redo every step.
    pub force_overwrite: bool,
    /// Whether to fetch the video and audio streams concurrently.
    pub parallel_streams: bool,
    /// Directory where the artifacts are written.
    pub output_dir: PathBuf,
    /// Program used to merge the streams.
    pub ffmpeg_path: PathBuf,
    /// Container extension for all artifacts.
    pub container: String,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            max_resolution: 1080,
            keep_intermediates: false,
            force_overwrite: false,
            parallel_streams: false,
            output_dir: PathBuf::from("."),
            ffmpeg_path: PathBuf::from("ffmpeg"),
            container: "mp4".to_string(),
        }
    }
}

impl DownloadConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the resolution ceiling used by the format selector.
    #[must_use]
    pub const fn with_max_resolution(mut self, max: u32) -> Self {
        self.max_resolution = max;
        self
    }

    /// Sets whether intermediate streams survive a successful merge.
    #[must_use]
    pub const fn with_keep_intermediates(mut self, keep: bool) -> Self {
        self.keep_intermediates = keep;
        self
    }

    /// Sets whether to force overwrite existing files.
    #[must_use]
    pub const fn with_force_overwrite(mut self, force: bool) -> Self {
        self.force_overwrite = force;
        self
    }

    /// Sets whether video and audio are fetched concurrently.
    #[must_use]
    pub const fn with_parallel_streams(mut self, parallel: bool) -> Self {
        self.parallel_streams = parallel;
        self
    }

    /// Sets the directory the artifacts are written to.
    #[must_use]
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Sets the muxer program.
    #[must_use]
    pub fn with_ffmpeg_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.ffmpeg_path = path.into();
        self
    }
}

/// Complete application configuration as read from `config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Download configuration (`[download]` table).
    pub download: DownloadConfig,
}

impl AppConfig {
    /// Creates a new config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Default location of the configuration file, if the platform has one.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("ytd").join("config.toml"))
    }

    /// Loads configuration.
    ///
    /// An explicit `path` must exist. Without one, the default location is
    /// read when present and defaults are used otherwise.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid TOML.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::from_file(path);
        }
        match Self::default_path() {
            Some(path) if path.is_file() => Self::from_file(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Reads and parses a TOML configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid TOML.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        let config: Self = toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config() {
        let config = DownloadConfig::default();
        assert_eq!(config.max_resolution, 1080);
        assert!(!config.keep_intermediates);
        assert!(!config.force_overwrite);
        assert!(!config.parallel_streams);
        assert_eq!(config.output_dir, PathBuf::from("."));
        assert_eq!(config.ffmpeg_path, PathBuf::from("ffmpeg"));
        assert_eq!(config.container, "mp4");
    }

    #[test]
    fn builder_pattern() {
        let config = DownloadConfig::new()
            .with_max_resolution(720)
            .with_keep_intermediates(true)
            .with_force_overwrite(true)
            .with_parallel_streams(true)
            .with_output_dir("/tmp/out")
            .with_ffmpeg_path("/usr/local/bin/ffmpeg");

        assert_eq!(config.max_resolution, 720);
        assert!(config.keep_intermediates);
        assert!(config.force_overwrite);
        assert!(config.parallel_streams);
        assert_eq!(config.output_dir, PathBuf::from("/tmp/out"));
        assert_eq!(config.ffmpeg_path, PathBuf::from("/usr/local/bin/ffmpeg"));
    }

    #[test]
    fn download_config_serializes_to_toml() {
        let config = DownloadConfig::new().with_max_resolution(480);
        let toml_str = toml::to_string(&config).unwrap();
        let deserialized: DownloadConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(deserialized, config);
    }

    #[test]
    fn partial_toml_falls_back_to_defaults() {
        let config: AppConfig = toml::from_str("[download]\nmax_resolution = 720\n").unwrap();
        assert_eq!(config.download.max_resolution, 720);
        assert_eq!(config.download.container, "mp4");
        assert!(!config.download.keep_intermediates);
    }

    #[test]
    fn load_explicit_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[download]\nkeep_intermediates = true\n").unwrap();

        let config = AppConfig::load(Some(&path)).unwrap();
        assert!(config.download.keep_intermediates);
        assert_eq!(config.download.max_resolution, 1080);
    }

    #[test]
    fn load_missing_explicit_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let result = AppConfig::load(Some(&dir.path().join("missing.toml")));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn load_rejects_invalid_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[download\nmax_resolution = ").unwrap();

        assert!(matches!(AppConfig::from_file(&path), Err(Error::Config(_))));
    }
}
