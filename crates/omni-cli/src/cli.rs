use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use omni_types::BackendKind;

#[derive(Parser)]
#[command(
    name = "omni",
    about = "omni: one CRUD interface over local files, S3 and GCS",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Backend to use (fs, s3, gs); inferred from the path when omitted
    #[arg(long, global = true)]
    pub backend: Option<BackendKind>,

    /// Bucket for remote backends
    #[arg(long, global = true)]
    pub bucket: Option<String>,

    #[arg(long, global = true)]
    pub region: Option<String>,

    /// TOML file with store options
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show which backend a path refers to
    Kind(KindArgs),
    /// Print a file or object to stdout
    Cat(PathArgs),
    /// Create or replace a file or object
    Put(WriteArgs),
    /// Replace the content of an existing file or object
    Update(WriteArgs),
    /// Remove a file or object
    Rm(RmArgs),
    /// Show metadata
    Stat(PathArgs),
    /// List the entries directly beneath a directory or prefix
    Ls(LsArgs),
    /// Create a directory
    Mkdir(MkdirArgs),
    /// Stream input into a scratch file, then publish it at the path
    Filter(WriteArgs),
}

#[derive(Args)]
pub struct KindArgs {
    /// Path or URI; the environment decides when omitted
    pub path: Option<String>,
}

#[derive(Args)]
pub struct PathArgs {
    pub path: String,
}

#[derive(Args)]
pub struct WriteArgs {
    pub path: String,
    /// Read content from this local file instead of stdin
    #[arg(short, long)]
    pub file: Option<PathBuf>,
}

#[derive(Args)]
pub struct RmArgs {
    pub path: String,
    /// Remove everything beneath the path
    #[arg(short, long)]
    pub recursive: bool,
}

#[derive(Args)]
pub struct LsArgs {
    #[arg(default_value = ".")]
    pub path: String,
    /// Only list names ending with this extension
    #[arg(long)]
    pub ext: Option<String>,
}

#[derive(Args)]
pub struct MkdirArgs {
    pub path: String,
    /// Create missing parents as well
    #[arg(short, long)]
    pub parents: bool,
    /// Permission bits, in octal
    #[arg(short, long, default_value = "755", value_parser = parse_mode)]
    pub mode: u32,
}

fn parse_mode(s: &str) -> Result<u32, String> {
    let digits = s.strip_prefix("0o").unwrap_or(s);
    match u32::from_str_radix(digits, 8) {
        Ok(mode) if mode <= 0o7777 => Ok(mode),
        Ok(_) => Err(format!("mode {s} out of range")),
        Err(e) => Err(format!("invalid octal mode {s}: {e}")),
    }
}
