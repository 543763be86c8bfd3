//! Merging streams with an external muxer and following its progress output.
//!
//! The muxer is run with `-progress pipe:1`, so stdout carries `key=value`
//! progress blocks while stderr carries the human-readable banner, including
//! the `Duration:` line of each input. Both channels are read as one line
//! stream; anything that is neither a duration banner nor a known key is
//! ignored.

use std::ffi::OsString;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::LazyLock;

use async_trait::async_trait;
use bytes::{Buf, BytesMut};
use futures::{Stream, StreamExt};
use regex::Regex;
use tokio::process::Command;
use tokio_util::codec::{Decoder, FramedRead};

use crate::error::{Error, Result};
use crate::progress::ProgressTracker;

static DURATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Duration: (\d+):(\d+):(\d+)\.(\d+)").expect("valid regex"));

const MAX_LINE_LEN: usize = 64 * 1024;

/// A single piece of information recognised in the muxer output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProgressEvent {
    /// Total input duration in milliseconds.
    Duration(u64),
    /// Output position in milliseconds.
    OutTime(u64),
    /// Encoding speed relative to real time.
    Speed(f64),
    /// The muxer finished writing.
    End,
}

/// Classifies one line of muxer output.
#[must_use]
pub fn parse_line(line: &str) -> Option<ProgressEvent> {
    if let Some(caps) = DURATION_RE.captures(line) {
        return parse_banner_duration(&caps[1], &caps[2], &caps[3], &caps[4])
            .map(ProgressEvent::Duration);
    }

    let (key, value) = line.split_once('=')?;
    let value = value.trim();
    match key.trim() {
        "out_time_ms" => {
            // Reported in microseconds despite the name.
            let micros: i64 = value.parse().ok()?;
            Some(ProgressEvent::OutTime(micros.max(0).unsigned_abs() / 1000))
        }
        "speed" => value
            .trim_end_matches('x')
            .trim()
            .parse()
            .ok()
            .map(ProgressEvent::Speed),
        "progress" if value == "end" => Some(ProgressEvent::End),
        _ => None,
    }
}

fn parse_banner_duration(hours: &str, minutes: &str, seconds: &str, fraction: &str) -> Option<u64> {
    let hours: u64 = hours.parse().ok()?;
    let minutes: u64 = minutes.parse().ok()?;
    let seconds: u64 = seconds.parse().ok()?;
    let digits = &fraction[..fraction.len().min(3)];
    let millis = digits.parse::<u64>().ok()? * 10u64.pow(3 - digits.len() as u32);
    hours
        .checked_mul(60)?
        .checked_add(minutes)?
        .checked_mul(60)?
        .checked_add(seconds)?
        .checked_mul(1000)?
        .checked_add(millis)
}

/// Applies a recognised event to a time-mode tracker.
pub fn apply(event: ProgressEvent, tracker: &ProgressTracker) {
    match event {
        ProgressEvent::Duration(total) => tracker.set_total(total),
        ProgressEvent::OutTime(current) => tracker.set_current(current),
        ProgressEvent::Speed(speed) => tracker.set_speed(speed),
        ProgressEvent::End => tracker.set_current(tracker.snapshot().total),
    }
}

/// Feeds a stream of output lines into `tracker` until the stream ends.
///
/// A read error stops parsing after being logged.
pub async fn track_progress<S, E>(mut lines: S, tracker: &ProgressTracker)
where
    S: Stream<Item = std::result::Result<String, E>> + Unpin,
    E: Display,
{
    while let Some(line) = lines.next().await {
        match line {
            Ok(line) => {
                if let Some(event) = parse_line(&line) {
                    apply(event, tracker);
                } else if !line.trim().is_empty() {
                    log::trace!("muxer: {line}");
                }
            }
            Err(e) => {
                log::warn!("Error reading muxer output: {e}");
                return;
            }
        }
    }
}

/// Splits muxer output on `\n` or `\r`; the status line on stderr is
/// redrawn with carriage returns only.
#[derive(Debug, Default)]
struct StatusLineCodec;

impl Decoder for StatusLineCodec {
    type Item = String;
    type Error = std::io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> std::io::Result<Option<String>> {
        if let Some(pos) = src.iter().position(|b| *b == b'\n' || *b == b'\r') {
            let line = src.split_to(pos);
            src.advance(1);
            return Ok(Some(String::from_utf8_lossy(&line).into_owned()));
        }
        if src.len() >= MAX_LINE_LEN {
            let line = src.split_to(src.len());
            return Ok(Some(String::from_utf8_lossy(&line).into_owned()));
        }
        Ok(None)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> std::io::Result<Option<String>> {
        if let Some(line) = self.decode(src)? {
            return Ok(Some(line));
        }
        if src.is_empty() {
            return Ok(None);
        }
        let line = src.split_to(src.len());
        Ok(Some(String::from_utf8_lossy(&line).into_owned()))
    }
}

/// Merges a video-only and an audio-only file into one output file.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Produces `output` from `video` and `audio`, reporting progress to a
    /// time-mode `tracker`.
    async fn merge(
        &self,
        video: &Path,
        audio: &Path,
        output: &Path,
        tracker: &ProgressTracker,
    ) -> Result<()>;
}

/// [`Transcoder`] that drives an `ffmpeg` process.
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    program: PathBuf,
}

impl Default for FfmpegTranscoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FfmpegTranscoder {
    /// Uses `ffmpeg` from `PATH`.
    #[must_use]
    pub fn new() -> Self {
        Self::with_program("ffmpeg")
    }

    /// Uses the given program instead of `ffmpeg`.
    #[must_use]
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Returns the program that will be run.
    #[must_use]
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Builds the muxer arguments: re-encode to H.264/AAC with fast start
    /// and machine-readable progress on stdout.
    #[must_use]
    pub fn merge_args(video: &Path, audio: &Path, output: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "-y".into(),
            "-i".into(),
            video.as_os_str().to_os_string(),
            "-i".into(),
            audio.as_os_str().to_os_string(),
        ];
        args.extend(
            [
                "-c:v", "libx264", "-preset", "medium", "-crf", "23", "-c:a", "aac", "-b:a",
                "128k", "-movflags", "+faststart", "-progress", "pipe:1",
            ]
            .map(OsString::from),
        );
        args.push(output.as_os_str().to_os_string());
        args
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn merge(
        &self,
        video: &Path,
        audio: &Path,
        output: &Path,
        tracker: &ProgressTracker,
    ) -> Result<()> {
        let args = Self::merge_args(video, audio, output);
        log::info!(
            "Executing: {} {}",
            self.program.display(),
            args.iter()
                .map(|a| a.to_string_lossy())
                .collect::<Vec<_>>()
                .join(" ")
        );

        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                Error::Transcode(format!("failed to start {}: {e}", self.program.display()))
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Transcode("failed to capture stdout".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::Transcode("failed to capture stderr".into()))?;

        let mut lines = futures::stream::select(
            FramedRead::new(stdout, StatusLineCodec),
            FramedRead::new(stderr, StatusLineCodec),
        );

        let parse = async {
            track_progress(&mut lines, tracker).await;
            // Keep draining so the child never blocks on a full pipe.
            while lines.next().await.is_some() {}
        };
        let (status, ()) = tokio::join!(child.wait(), parse);

        let status =
            status.map_err(|e| Error::Transcode(format!("failed to wait for muxer: {e}")))?;
        if !status.success() {
            return Err(Error::Transcode(format!(
                "failed to merge and encode video and audio: muxer exited with {status}"
            )));
        }

        log::info!("Video and audio merged and encoded successfully");
        Ok(())
    }
}
