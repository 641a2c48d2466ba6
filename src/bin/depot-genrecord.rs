use clap::Parser;
use depot::codegen::{self, RunMode};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Regenerate field constants and key builders of persistent records
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Report files that would change without rewriting them
    #[arg(long)]
    check: bool,

    /// Source files or directories to scan for `.rs` files
    #[arg(required = true)]
    paths: Vec<PathBuf>,
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "depot=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let mode = if args.check {
        RunMode::Check
    } else {
        RunMode::Write
    };

    let summary = codegen::run(&args.paths, mode);
    println!("{summary}");

    if summary.has_failures() || (mode == RunMode::Check && !summary.updated.is_empty()) {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
