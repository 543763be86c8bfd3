//! Live progress tracking for one unit of work.
//!
//! A [`ProgressTracker`] owns one `indicatif` bar and the `(current, total)`
//! pair behind it. Byte-mode trackers are driven through
//! [`ProgressTracker::wrap_reader`]; time-mode trackers are driven by the
//! transcode parser with media positions in milliseconds.

use std::pin::Pin;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use tokio::io::{AsyncRead, ReadBuf};

use crate::format::format_media_time;

const TICK_INTERVAL: Duration = Duration::from_millis(100);

/// What a tracker counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerMode {
    /// Bytes transferred; throughput is derived by the renderer.
    Bytes,
    /// Elapsed media time in milliseconds, with a reported speed multiplier.
    Time,
}

/// A consistent view of a tracker's state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSnapshot {
    /// Target amount of work.
    pub total: u64,
    /// Work done so far.
    pub current: u64,
    /// Last reported speed multiplier (time mode only).
    pub speed: Option<f64>,
    /// Whether rendering has stopped.
    pub finished: bool,
}

#[derive(Debug)]
struct TrackerState {
    total: u64,
    current: u64,
    speed: Option<f64>,
    finished: bool,
}

/// Progress of a single download or merge step.
///
/// All updates take the same lock that guards the render calls, so the bar
/// never sees a torn `(current, total)` pair while its ticker redraws.
pub struct ProgressTracker {
    name: String,
    mode: TrackerMode,
    state: Mutex<TrackerState>,
    bar: ProgressBar,
}

impl ProgressTracker {
    /// Creates a tracker drawing to stderr.
    #[must_use]
    pub fn new(name: &str, total: u64, mode: TrackerMode) -> Self {
        let bar = ProgressBar::new(total);
        bar.enable_steady_tick(TICK_INTERVAL);
        Self::with_bar(bar, name, total, mode)
    }

    /// Creates a tracker whose bar is rendered as part of `progress`.
    #[must_use]
    pub fn in_group(progress: &MultiProgress, name: &str, total: u64, mode: TrackerMode) -> Self {
        let bar = progress.add(ProgressBar::new(total));
        bar.enable_steady_tick(TICK_INTERVAL);
        Self::with_bar(bar, name, total, mode)
    }

    /// Creates a tracker that never draws.
    #[must_use]
    pub fn hidden(name: &str, total: u64, mode: TrackerMode) -> Self {
        Self::with_bar(ProgressBar::hidden(), name, total, mode)
    }

    fn with_bar(bar: ProgressBar, name: &str, total: u64, mode: TrackerMode) -> Self {
        bar.set_length(total);
        bar.set_style(style_for(mode));
        bar.set_prefix(name.to_string());
        let tracker = Self {
            name: name.to_string(),
            mode,
            state: Mutex::new(TrackerState {
                total,
                current: 0,
                speed: None,
                finished: false,
            }),
            bar,
        };
        if mode == TrackerMode::Time {
            let state = tracker.lock();
            tracker.bar.set_message(time_label(&state));
        }
        tracker
    }

    /// Returns the display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the tracker mode.
    #[must_use]
    pub const fn mode(&self) -> TrackerMode {
        self.mode
    }

    /// Returns the current state.
    #[must_use]
    pub fn snapshot(&self) -> ProgressSnapshot {
        let state = self.lock();
        ProgressSnapshot {
            total: state.total,
            current: state.current,
            speed: state.speed,
            finished: state.finished,
        }
    }

    /// Rebinds the total, e.g. once a duration or content length becomes known.
    pub fn set_total(&self, total: u64) {
        let mut state = self.lock();
        state.total = total;
        if total > 0 {
            state.current = state.current.min(total);
        }
        self.bar.set_length(total);
        self.bar.set_position(state.current);
        self.refresh_label(&state);
    }

    /// Sets the amount of work done, capped at the total.
    ///
    /// Values may go down as well as up.
    pub fn set_current(&self, current: u64) {
        let mut state = self.lock();
        state.current = current.min(state.total);
        self.bar.set_position(state.current);
        self.refresh_label(&state);
    }

    /// Records the speed multiplier reported by the muxer. Ignored in byte mode.
    pub fn set_speed(&self, speed: f64) {
        if self.mode != TrackerMode::Time {
            return;
        }
        let mut state = self.lock();
        state.speed = Some(speed);
        self.refresh_label(&state);
    }

    /// Adds `delta` bytes. A total of `0` means the length is unknown and
    /// the count is not capped.
    fn advance(&self, delta: u64) {
        let mut state = self.lock();
        let next = state.current.saturating_add(delta);
        state.current = if state.total > 0 {
            next.min(state.total)
        } else {
            next
        };
        self.bar.set_position(state.current);
    }

    /// Wraps `reader` so every byte read through it advances this tracker.
    pub fn wrap_reader<R: AsyncRead + Unpin>(&self, reader: R) -> TrackedReader<'_, R> {
        TrackedReader {
            inner: reader,
            tracker: self,
        }
    }

    /// Stops rendering and leaves the indicator at completion.
    pub fn finish(&self) {
        let mut state = self.lock();
        if state.total > 0 {
            state.current = state.total;
        }
        state.finished = true;
        self.refresh_label(&state);
        self.bar.finish();
    }

    /// Stops rendering and leaves the indicator where it is.
    pub fn abandon(&self) {
        let mut state = self.lock();
        state.finished = true;
        self.bar.abandon();
    }

    fn refresh_label(&self, state: &TrackerState) {
        if self.mode == TrackerMode::Time {
            self.bar.set_message(time_label(state));
        }
    }

    fn lock(&self) -> MutexGuard<'_, TrackerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn style_for(mode: TrackerMode) -> ProgressStyle {
    let template = match mode {
        TrackerMode::Bytes => {
            "{prefix}: {percent:>3}% [{bar:40.cyan/blue}] {bytes}/{total_bytes} [{bytes_per_sec}] ETA {eta}"
        }
        TrackerMode::Time => "{prefix}: {percent:>3}% [{bar:40.green/white}] {msg} ETA {eta}",
    };
    ProgressStyle::with_template(template)
        .expect("progress template is valid")
        .progress_chars("━━╌")
}

fn time_label(state: &TrackerState) -> String {
    let counters = format!(
        "{}/{}",
        format_media_time(state.current),
        format_media_time(state.total)
    );
    match state.speed {
        Some(speed) => format!("{counters} [{speed:.2}x]"),
        None => counters,
    }
}

/// An [`AsyncRead`] passthrough that counts bytes into a [`ProgressTracker`].
pub struct TrackedReader<'a, R> {
    inner: R,
    tracker: &'a ProgressTracker,
}

impl<R: AsyncRead + Unpin> AsyncRead for TrackedReader<'_, R> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        let this = self.get_mut();
        let before = buf.filled().len();
        let result = Pin::new(&mut this.inner).poll_read(cx, buf);
        if let Poll::Ready(Ok(())) = result {
            let read = buf.filled().len() - before;
            if read > 0 {
                this.tracker.advance(read as u64);
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::io::AsyncReadExt;

    #[test]
    fn set_current_clamps_to_total() {
        let tracker = ProgressTracker::hidden("Merging", 1000, TrackerMode::Time);
        tracker.set_current(5000);
        assert_eq!(tracker.snapshot().current, 1000);
    }

    #[test]
    fn set_current_may_decrease() {
        let tracker = ProgressTracker::hidden("Merging", 1000, TrackerMode::Time);
        tracker.set_current(800);
        tracker.set_current(200);
        assert_eq!(tracker.snapshot().current, 200);
    }

    #[test]
    fn set_total_rebinds_and_clamps() {
        let tracker = ProgressTracker::hidden("Merging", 0, TrackerMode::Time);
        tracker.set_current(500);
        assert_eq!(tracker.snapshot().current, 0);

        tracker.set_total(90_000);
        tracker.set_current(45_000);
        assert_eq!(tracker.snapshot().total, 90_000);
        assert_eq!(tracker.snapshot().current, 45_000);

        tracker.set_total(30_000);
        assert_eq!(tracker.snapshot().current, 30_000);
    }

    #[test]
    fn speed_is_ignored_in_byte_mode() {
        let bytes = ProgressTracker::hidden("Video", 10, TrackerMode::Bytes);
        bytes.set_speed(1.5);
        assert_eq!(bytes.snapshot().speed, None);

        let time = ProgressTracker::hidden("Merging", 10, TrackerMode::Time);
        time.set_speed(1.5);
        assert_eq!(time.snapshot().speed, Some(1.5));
    }

    #[test]
    fn time_label_shows_counters_and_speed() {
        let state = TrackerState {
            total: 90_000,
            current: 45_000,
            speed: Some(2.0),
            finished: false,
        };
        assert_eq!(time_label(&state), "45s/1m:30s [2.00x]");
    }

    #[test]
    fn finish_leaves_tracker_complete() {
        let tracker = ProgressTracker::hidden("Video", 100, TrackerMode::Bytes);
        tracker.advance(40);
        tracker.finish();
        let snapshot = tracker.snapshot();
        assert!(snapshot.finished);
        assert_eq!(snapshot.current, 100);
    }

    #[test]
    fn abandon_keeps_position() {
        let tracker = ProgressTracker::hidden("Video", 100, TrackerMode::Bytes);
        tracker.advance(40);
        tracker.abandon();
        let snapshot = tracker.snapshot();
        assert!(snapshot.finished);
        assert_eq!(snapshot.current, 40);
    }

    #[test]
    fn unknown_length_is_not_capped() {
        let tracker = ProgressTracker::hidden("Video", 0, TrackerMode::Bytes);
        tracker.advance(4096);
        assert_eq!(tracker.snapshot().current, 4096);
    }

    #[test]
    fn grouped_tracker_tracks_state() {
        let group = MultiProgress::with_draw_target(indicatif::ProgressDrawTarget::hidden());
        let tracker = ProgressTracker::in_group(&group, "Audio", 10, TrackerMode::Bytes);
        tracker.advance(3);
        assert_eq!(tracker.snapshot().current, 3);
        assert_eq!(tracker.name(), "Audio");
        tracker.finish();
    }

    #[tokio::test]
    async fn wrapped_reader_counts_bytes() {
        let tracker = ProgressTracker::hidden("Video", 11, TrackerMode::Bytes);
        let mut reader = tracker.wrap_reader(&b"hello world"[..]);
        let mut out = Vec::new();
        reader.read_to_end(&mut out).await.unwrap();

        assert_eq!(out, b"hello world");
        assert_eq!(tracker.snapshot().current, 11);
    }

    #[test]
    fn concurrent_updates_never_tear() {
        let tracker = Arc::new(ProgressTracker::hidden("Merging", 1, TrackerMode::Time));

        let writer = {
            let tracker = Arc::clone(&tracker);
            std::thread::spawn(move || {
                for i in 1..5_000u64 {
                    tracker.set_total(i);
                    tracker.set_current(i * 2);
                    tracker.set_speed(1.0);
                }
            })
        };

        for _ in 0..5_000 {
            let snapshot = tracker.snapshot();
            assert!(snapshot.current <= snapshot.total);
        }
        writer.join().unwrap();
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn current_never_exceeds_total(total in 0u64..1_000_000, values in proptest::collection::vec(0u64..2_000_000, 1..20)) {
                let tracker = ProgressTracker::hidden("Merging", total, TrackerMode::Time);
                for value in values {
                    tracker.set_current(value);
                    let snapshot = tracker.snapshot();
                    prop_assert_eq!(snapshot.current, value.min(total));
                }
            }
        }
    }
}
