//! Console reporting for CLI downloads.

use std::path::Path;
use std::time::Duration;

use console::style;
use indicatif::MultiProgress;

use crate::{
    EncodedVariant, Error, MergeOutcome, PipelineEvents, SelectionResult, StepOutcome, VideoOutcome,
    format_bytes, format_duration,
};

const SEPARATOR: &str = "────────────────────────────────────────────────────────────";

/// Prints pipeline events above the live progress bars.
pub struct ConsoleEvents {
    progress: MultiProgress,
}

impl ConsoleEvents {
    /// Creates a printer that writes through `progress`.
    #[must_use]
    pub const fn new(progress: MultiProgress) -> Self {
        Self { progress }
    }

    fn println(&self, line: impl AsRef<str>) {
        if let Err(e) = self.progress.println(line) {
            log::debug!("Failed to print above progress bars: {e}");
        }
    }
}

impl PipelineEvents for ConsoleEvents {
    fn on_variants(&self, variants: &[EncodedVariant]) {
        self.println(format!("{SEPARATOR}\nAvailable formats:\n{SEPARATOR}"));
        for variant in variants {
            self.println(format!("  {variant}"));
        }
        self.println(SEPARATOR);
    }

    fn on_selection(&self, selection: &SelectionResult) {
        self.println(format!(
            "Selected video: {}",
            style(&selection.video).cyan()
        ));
        match &selection.audio {
            Some(audio) => self.println(format!("Selected audio: {}", style(audio).cyan())),
            None => self.println("Video already includes audio"),
        }
        let total = selection.total_length();
        if total > 0 {
            self.println(format!("Download size: {}", format_bytes(total)));
        }
    }

    fn on_step_skipped(&self, name: &str, path: &Path) {
        self.println(format!(
            "{} {name} already complete: {}",
            style("skip").yellow(),
            path.display()
        ));
    }

    fn on_transfer_error(&self, name: &str, error: &Error) {
        self.println(format!(
            "{} downloading {}: {error}",
            style("Error").red().bold(),
            name.to_lowercase()
        ));
    }

    fn on_merge_start(&self, output: &Path) {
        self.println(format!("Merging into {}", output.display()));
    }
}

fn describe(step: &StepOutcome) -> String {
    match step {
        StepOutcome::Downloaded { bytes } => format!("downloaded {}", format_bytes(*bytes)),
        StepOutcome::Skipped => "already present".to_string(),
        StepOutcome::Failed(e) => format!("{} ({e})", style("failed").red()),
    }
}

/// Prints a summary of one finished video.
pub fn print_summary(outcome: &VideoOutcome, elapsed: Duration) {
    println!("\n{SEPARATOR}");
    println!("Download Summary");
    println!("{SEPARATOR}");
    println!("  Title:             {}", outcome.title);
    println!("  Video:             {}", describe(&outcome.video));
    if let Some(audio) = &outcome.audio {
        println!("  Audio:             {}", describe(audio));
    }
    if outcome.merge == MergeOutcome::Incomplete {
        println!(
            "  Output:            {} ({}, run again to retry)",
            outcome.output.display(),
            style("incomplete").yellow()
        );
    } else {
        println!("  Output:            {}", outcome.output.display());
    }
    println!("  Total time:        {}", format_duration(elapsed));
    println!("{SEPARATOR}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describes_steps() {
        console::set_colors_enabled(false);
        assert_eq!(describe(&StepOutcome::Downloaded { bytes: 2048 }), "downloaded 2.00 KB");
        assert_eq!(describe(&StepOutcome::Skipped), "already present");
        assert_eq!(
            describe(&StepOutcome::Failed("connection reset".into())),
            "failed (connection reset)"
        );
    }

    #[test]
    fn events_print_without_terminal() {
        let progress =
            MultiProgress::with_draw_target(indicatif::ProgressDrawTarget::hidden());
        let events = ConsoleEvents::new(progress);
        events.on_step_skipped("Video", Path::new("clip_video.mp4"));
        events.on_transfer_error("Audio", &Error::Transfer("boom".into()));
    }
}
