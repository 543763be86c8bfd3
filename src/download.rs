//! Download-and-merge orchestration.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use indicatif::MultiProgress;
use tokio::io::AsyncWriteExt;

use crate::catalog::{Catalog, VideoInfo};
use crate::config::DownloadConfig;
use crate::error::{Error, Result};
use crate::fs::{FileSystem, TokioFileSystem};
use crate::paths::ArtifactPaths;
use crate::progress::{ProgressTracker, TrackerMode};
use crate::select::{SelectionResult, select};
use crate::transcode::{FfmpegTranscoder, Transcoder};
use crate::variant::EncodedVariant;

/// Trait for observing a download-and-merge run.
///
/// All methods have default no-op implementations for convenience.
pub trait PipelineEvents: Send + Sync {
    /// Called with every variant the catalog offers, before selection.
    fn on_variants(&self, _variants: &[EncodedVariant]) {}

    /// Called once the variants to fetch are chosen.
    fn on_selection(&self, _selection: &SelectionResult) {}

    /// Called when a step is skipped because its file is already complete.
    fn on_step_skipped(&self, _name: &str, _path: &Path) {}

    /// Called when a stream copy fails; the run continues.
    fn on_transfer_error(&self, _name: &str, _error: &Error) {}

    /// Called right before the muxer is started.
    fn on_merge_start(&self, _output: &Path) {}

    /// Called when a video reached its terminal state.
    fn on_complete(&self, _outcome: &VideoOutcome) {}
}

/// An events implementation that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoEvents;

impl PipelineEvents for NoEvents {}

/// What happened to one stream download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// The stream was fetched.
    Downloaded {
        /// Bytes written.
        bytes: u64,
    },
    /// A file with the expected size already existed.
    Skipped,
    /// The copy failed and the run carried on.
    Failed(String),
}

/// How the final output came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// Video and audio were merged by the muxer.
    Transcoded,
    /// The video stream already carried audio and was renamed into place.
    Renamed,
    /// The output was already complete; nothing was done.
    AlreadyComplete,
    /// A stream copy failed, so the result was left unpublished and the
    /// sources kept for the next run.
    Incomplete,
}

/// Terminal state of one video.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoOutcome {
    /// Title as reported by the catalog.
    pub title: String,
    /// Path of the produced file. For [`MergeOutcome::Incomplete`] this is
    /// the unpublished staging or video file.
    pub output: PathBuf,
    /// Video stream step.
    pub video: StepOutcome,
    /// Audio stream step, absent when no audio variant was needed.
    pub audio: Option<StepOutcome>,
    /// Merge step.
    pub merge: MergeOutcome,
}

impl VideoOutcome {
    /// Returns true if any stream copy failed along the way.
    #[must_use]
    pub fn has_transfer_errors(&self) -> bool {
        matches!(self.video, StepOutcome::Failed(_))
            || matches!(self.audio, Some(StepOutcome::Failed(_)))
    }
}

/// Resolves, selects, downloads and merges one video at a time.
pub struct Downloader<C, T = FfmpegTranscoder, F: FileSystem = TokioFileSystem> {
    catalog: C,
    transcoder: T,
    config: DownloadConfig,
    fs: F,
    progress: MultiProgress,
    events: Arc<dyn PipelineEvents>,
}

impl<C: Catalog> Downloader<C> {
    /// Creates a downloader that merges with the configured `ffmpeg` and
    /// writes through `tokio::fs`.
    #[must_use]
    pub fn new(catalog: C, config: DownloadConfig) -> Self {
        let transcoder = FfmpegTranscoder::with_program(&config.ffmpeg_path);
        Self::with_parts(catalog, transcoder, config, TokioFileSystem)
    }
}

impl<C: Catalog, T: Transcoder, F: FileSystem> Downloader<C, T, F> {
    /// Creates a downloader from explicit collaborators.
    #[must_use]
    pub fn with_parts(catalog: C, transcoder: T, config: DownloadConfig, fs: F) -> Self {
        Self {
            catalog,
            transcoder,
            config,
            fs,
            progress: MultiProgress::new(),
            events: Arc::new(NoEvents),
        }
    }

    /// Renders progress bars into `progress` instead of a private group.
    #[must_use]
    pub fn with_progress(mut self, progress: MultiProgress) -> Self {
        self.progress = progress;
        self
    }

    /// Reports pipeline events to `events`.
    #[must_use]
    pub fn with_events(mut self, events: Arc<dyn PipelineEvents>) -> Self {
        self.events = events;
        self
    }

    /// Returns a reference to the catalog.
    #[must_use]
    pub const fn catalog(&self) -> &C {
        &self.catalog
    }

    /// Returns a reference to the download configuration.
    #[must_use]
    pub const fn config(&self) -> &DownloadConfig {
        &self.config
    }

    /// Resolves `url` and runs the whole pipeline for it.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog cannot resolve the URL, no suitable
    /// variant exists, a file check or rename fails, or the merge fails.
    /// Failed stream copies are reported in the outcome instead.
    pub async fn download(&self, url: &str) -> Result<VideoOutcome> {
        let info = self.catalog.resolve(url).await?;
        log::info!("Downloading video: {}", info.title);
        self.download_video(&info).await
    }

    /// Selects variants for an already-resolved video and runs the pipeline.
    ///
    /// # Errors
    ///
    /// See [`Downloader::download`]. Selection failures happen before any
    /// file is touched.
    pub async fn download_video(&self, info: &VideoInfo) -> Result<VideoOutcome> {
        self.events.on_variants(&info.variants);
        let selection = select(&info.variants, self.config.max_resolution)?;
        self.events.on_selection(&selection);
        self.download_and_merge(info, &selection).await
    }

    /// Fetches the selected streams and produces the final output.
    ///
    /// # Errors
    ///
    /// See [`Downloader::download`].
    pub async fn download_and_merge(
        &self,
        info: &VideoInfo,
        selection: &SelectionResult,
    ) -> Result<VideoOutcome> {
        let paths = ArtifactPaths::new(&self.config.output_dir, &info.title, &self.config.container);

        if self.output_complete(selection, &paths.output).await? {
            log::info!("{} is already complete", paths.output.display());
            self.events.on_step_skipped("Output", &paths.output);
            let outcome = VideoOutcome {
                title: info.title.clone(),
                output: paths.output,
                video: StepOutcome::Skipped,
                audio: selection.audio.as_ref().map(|_| StepOutcome::Skipped),
                merge: MergeOutcome::AlreadyComplete,
            };
            self.events.on_complete(&outcome);
            return Ok(outcome);
        }

        let (video, audio) = match &selection.audio {
            Some(audio) if self.config.parallel_streams => {
                let (video, audio) = futures::join!(
                    self.fetch_variant("Video", &selection.video, &paths.video),
                    self.fetch_variant("Audio", audio, &paths.audio),
                );
                (video?, Some(audio?))
            }
            Some(audio) => {
                let video = self
                    .fetch_variant("Video", &selection.video, &paths.video)
                    .await?;
                let audio = self.fetch_variant("Audio", audio, &paths.audio).await?;
                (video, Some(audio))
            }
            None => (
                self.fetch_variant("Video", &selection.video, &paths.video)
                    .await?,
                None,
            ),
        };

        let stream_failed = matches!(video, StepOutcome::Failed(_))
            || matches!(audio, Some(StepOutcome::Failed(_)));
        let (merge, output) = match (&selection.audio, stream_failed) {
            (Some(_), false) => {
                self.merge_streams(info, &paths).await?;
                (MergeOutcome::Transcoded, paths.output)
            }
            (Some(_), true) => {
                self.merge_unpublished(info, &paths).await?;
                log::warn!(
                    "Not publishing {}: a stream download failed",
                    paths.output.display()
                );
                (MergeOutcome::Incomplete, paths.staging)
            }
            (None, false) => {
                self.fs.rename_file(&paths.video, &paths.output).await?;
                log::info!("Video already includes audio");
                (MergeOutcome::Renamed, paths.output)
            }
            (None, true) => (MergeOutcome::Incomplete, paths.video),
        };

        log::info!("Download completed for: {}", output.display());
        let outcome = VideoOutcome {
            title: info.title.clone(),
            output,
            video,
            audio,
            merge,
        };
        self.events.on_complete(&outcome);
        Ok(outcome)
    }

    /// Decides whether the final output can be left alone.
    ///
    /// A renamed self-contained video keeps the variant's exact length. A
    /// merged output only ever appears under its final name after the muxer
    /// succeeded over fully fetched streams, so any non-empty file counts.
    async fn output_complete(&self, selection: &SelectionResult, output: &Path) -> Result<bool> {
        if self.config.force_overwrite {
            return Ok(false);
        }
        let size = self.fs.file_size(output).await?;
        Ok(match (&selection.audio, size) {
            (_, None) => false,
            (None, Some(size)) => size == selection.video.content_length,
            (Some(_), Some(size)) => size > 0,
        })
    }

    /// Downloads one variant unless a file of the right size is present.
    ///
    /// Copy failures are logged and returned as [`StepOutcome::Failed`];
    /// only the presence check itself can fail the call. A failed copy
    /// abandons its bar, leaving it at the byte count actually reached.
    async fn fetch_variant(
        &self,
        name: &str,
        variant: &EncodedVariant,
        path: &Path,
    ) -> Result<StepOutcome> {
        if !self.config.force_overwrite
            && self.fs.file_matches(path, variant.content_length).await?
        {
            log::info!("{name} file already exists and has correct size, skipping download");
            self.events.on_step_skipped(name, path);
            return Ok(StepOutcome::Skipped);
        }

        let tracker = ProgressTracker::in_group(
            &self.progress,
            name,
            variant.content_length,
            TrackerMode::Bytes,
        );
        match self.copy_variant(variant, path, &tracker).await {
            Ok(bytes) => {
                tracker.finish();
                Ok(StepOutcome::Downloaded { bytes })
            }
            Err(e) => {
                tracker.abandon();
                log::warn!("Error downloading {}: {e}", name.to_lowercase());
                self.events.on_transfer_error(name, &e);
                Ok(StepOutcome::Failed(e.to_string()))
            }
        }
    }

    async fn copy_variant(
        &self,
        variant: &EncodedVariant,
        path: &Path,
        tracker: &ProgressTracker,
    ) -> Result<u64> {
        let stream = self
            .catalog
            .open_stream(variant)
            .await
            .map_err(|e| Error::Transfer(format!("failed to get stream: {e}")))?;
        if variant.content_length == 0
            && let Some(length) = stream.length
        {
            tracker.set_total(length);
        }

        let mut file = self.fs.create_file(path).await.map_err(|e| {
            Error::Transfer(format!("failed to create {}: {e}", path.display()))
        })?;
        let mut reader = tracker.wrap_reader(stream.reader);
        let bytes = tokio::io::copy(&mut reader, &mut file)
            .await
            .map_err(|e| Error::Transfer(format!("failed to save stream: {e}")))?;
        file.flush()
            .await
            .map_err(|e| Error::Transfer(format!("failed to save stream: {e}")))?;
        Ok(bytes)
    }

    /// Runs the muxer into the staging file and publishes it as the output.
    async fn merge_streams(&self, info: &VideoInfo, paths: &ArtifactPaths) -> Result<()> {
        self.transcode(info, paths).await?;
        self.fs.rename_file(&paths.staging, &paths.output).await?;

        if !self.config.keep_intermediates {
            self.remove_quietly(&paths.video).await;
            self.remove_quietly(&paths.audio).await;
        }
        Ok(())
    }

    /// Runs the muxer over partial sources. The result stays under the
    /// staging name and the sources are kept, so a later run re-fetches the
    /// mismatched stream instead of finding a final output.
    async fn merge_unpublished(&self, info: &VideoInfo, paths: &ArtifactPaths) -> Result<()> {
        self.transcode(info, paths).await
    }

    async fn transcode(&self, info: &VideoInfo, paths: &ArtifactPaths) -> Result<()> {
        self.events.on_merge_start(&paths.output);
        let tracker =
            ProgressTracker::in_group(&self.progress, "Merging", info.duration_ms, TrackerMode::Time);

        if let Err(e) = self
            .transcoder
            .merge(&paths.video, &paths.audio, &paths.staging, &tracker)
            .await
        {
            tracker.abandon();
            self.remove_quietly(&paths.staging).await;
            return Err(e);
        }
        tracker.finish();
        Ok(())
    }

    async fn remove_quietly(&self, path: &Path) {
        if let Err(e) = self.fs.remove_file(path).await
            && e.kind() != ErrorKind::NotFound
        {
            log::warn!("Failed to remove {}: {e}", path.display());
        }
    }
}
