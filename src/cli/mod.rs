//! CLI mode for ytd - command-line interface for downloading one video.

mod progress;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use indicatif::MultiProgress;

use crate::{AppConfig, Downloader, VideoOutcome, YouTubeCatalog};

pub use progress::{ConsoleEvents, print_summary};

/// Parsed command-line arguments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliArgs {
    /// Video URL or bare identifier.
    pub url: Option<String>,
    /// Redo every step even if files exist.
    pub overwrite: bool,
    /// Keep the separate streams after merging.
    pub keep: bool,
    /// Resolution ceiling overriding the configured one.
    pub max_resolution: Option<u32>,
    /// Fetch video and audio concurrently.
    pub parallel: bool,
    /// Explicit configuration file.
    pub config: Option<PathBuf>,
    /// Help was requested.
    pub help: bool,
}

/// Parses arguments (without the program name).
///
/// # Errors
///
/// Returns a message for unknown options, missing option values and
/// unparsable numbers.
pub fn parse_args<I, S>(args: I) -> Result<CliArgs, String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut parsed = CliArgs::default();
    let mut args = args.into_iter().map(Into::into);

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-y" | "--overwrite" => parsed.overwrite = true,
            "-k" | "--keep" => parsed.keep = true,
            "-p" | "--parallel" => parsed.parallel = true,
            "-h" | "--help" => parsed.help = true,
            "-r" | "--max-res" => {
                let value = args
                    .next()
                    .ok_or_else(|| format!("{arg} requires a value"))?;
                let max = value
                    .parse()
                    .map_err(|_| format!("invalid resolution: {value}"))?;
                parsed.max_resolution = Some(max);
            }
            "-c" | "--config" => {
                let value = args
                    .next()
                    .ok_or_else(|| format!("{arg} requires a value"))?;
                parsed.config = Some(PathBuf::from(value));
            }
            other if other.starts_with('-') && other.len() > 1 => {
                return Err(format!("Unknown option: {other}"));
            }
            _ => {
                if parsed.url.is_some() {
                    return Err(format!("unexpected argument: {arg}"));
                }
                parsed.url = Some(arg);
            }
        }
    }

    Ok(parsed)
}

/// Prints usage information to stderr.
pub fn print_usage() {
    eprintln!("Usage: ytd [OPTIONS] <url>");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  <url>               YouTube watch URL, short link or video id");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -r, --max-res <N>   Highest video resolution to pick (default: 1080)");
    eprintln!("  -y, --overwrite     Redo every step even if files exist");
    eprintln!("  -k, --keep          Keep the separate video and audio files");
    eprintln!("  -p, --parallel      Download video and audio concurrently");
    eprintln!("  -c, --config <FILE> Read configuration from FILE");
    eprintln!("  -h, --help          Show this help");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  RUST_LOG            Log filter (default: warn)");
}

/// Runs one download with console progress reporting.
///
/// # Errors
///
/// Returns an error if the configuration cannot be loaded or the pipeline
/// fails.
pub async fn run(args: &CliArgs, url: &str) -> crate::Result<VideoOutcome> {
    let mut config = AppConfig::load(args.config.as_deref())?.download;
    if let Some(max) = args.max_resolution {
        config.max_resolution = max;
    }
    config.force_overwrite |= args.overwrite;
    config.keep_intermediates |= args.keep;
    config.parallel_streams |= args.parallel;

    let http = YouTubeCatalog::build_http_client()?;
    let progress = MultiProgress::new();
    let events = Arc::new(ConsoleEvents::new(progress.clone()));

    let downloader = Downloader::new(YouTubeCatalog::new(http), config)
        .with_progress(progress.clone())
        .with_events(events);

    let started = Instant::now();
    let outcome = downloader.download(url).await;
    progress.clear().ok();
    let outcome = outcome?;
    print_summary(&outcome, started.elapsed());
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_only() {
        let args = parse_args(["https://youtu.be/dQw4w9WgXcQ"]).unwrap();
        assert_eq!(args.url.as_deref(), Some("https://youtu.be/dQw4w9WgXcQ"));
        assert!(!args.overwrite);
        assert!(!args.keep);
        assert_eq!(args.max_resolution, None);
    }

    #[test]
    fn all_flags() {
        let args = parse_args([
            "-y", "--keep", "-p", "-r", "720", "--config", "/tmp/ytd.toml", "dQw4w9WgXcQ",
        ])
        .unwrap();
        assert_eq!(
            args,
            CliArgs {
                url: Some("dQw4w9WgXcQ".into()),
                overwrite: true,
                keep: true,
                max_resolution: Some(720),
                parallel: true,
                config: Some(PathBuf::from("/tmp/ytd.toml")),
                help: false,
            }
        );
    }

    #[test]
    fn flags_after_url() {
        let args = parse_args(["dQw4w9WgXcQ", "--overwrite", "-k"]).unwrap();
        assert!(args.overwrite);
        assert!(args.keep);
    }

    #[test]
    fn no_arguments_has_no_url() {
        let args = parse_args(Vec::<String>::new()).unwrap();
        assert_eq!(args.url, None);
        assert!(!args.help);
    }

    #[test]
    fn help_flag() {
        assert!(parse_args(["--help"]).unwrap().help);
        assert!(parse_args(["-h"]).unwrap().help);
    }

    #[test]
    fn missing_value_is_error() {
        let err = parse_args(["dQw4w9WgXcQ", "-r"]).unwrap_err();
        assert!(err.contains("requires a value"));
    }

    #[test]
    fn bad_resolution_is_error() {
        let err = parse_args(["-r", "hd", "dQw4w9WgXcQ"]).unwrap_err();
        assert!(err.contains("invalid resolution"));
    }

    #[test]
    fn unknown_option_is_error() {
        let err = parse_args(["--bogus"]).unwrap_err();
        assert_eq!(err, "Unknown option: --bogus");
    }

    #[test]
    fn second_url_is_error() {
        assert!(parse_args(["a", "b"]).is_err());
    }
}
