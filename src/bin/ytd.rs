//! ytd - download a video and merge its best streams.

#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

use std::env;
use std::process::ExitCode;

use ytd::cli::{parse_args, print_usage, run};

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .format_timestamp(None)
        .init();

    let args = match parse_args(env::args().skip(1)) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{e}");
            print_usage();
            return ExitCode::FAILURE;
        }
    };

    if args.help {
        print_usage();
        return ExitCode::SUCCESS;
    }

    let Some(url) = args.url.clone() else {
        eprintln!("Please provide a YouTube URL");
        print_usage();
        return ExitCode::FAILURE;
    };

    match run(&args, &url).await {
        Ok(_) => {
            println!("Download completed successfully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("{e:?}");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
