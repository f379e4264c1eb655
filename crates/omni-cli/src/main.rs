use clap::Parser;
use tracing_subscriber::{filter::LevelFilter, EnvFilter};

mod cli;
mod commands;

fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();

    // -v forces debug output; otherwise RUST_LOG decides, defaulting to warnings.
    let log_filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::builder()
            .with_default_directive(LevelFilter::WARN.into())
            .from_env_lossy()
    };
    tracing_subscriber::fmt()
        .with_env_filter(log_filter)
        .with_writer(std::io::stderr)
        .init();

    commands::run_command(cli)
}
