use std::fs::File;
use std::io::{self, Read, Write};

use anyhow::Context;
use colored::Colorize;
use omni_store::{
    default_kind_from_env, get_store_with, init, options_from_env, storage_type, EnvVars,
    ObjectDescriptor, Store, StoreOptions,
};
use omni_types::BackendKind;
use serde_json::json;
use tracing::debug;

use crate::cli::*;

/// Global flags that decide which store a command runs against.
struct StoreFlags {
    backend: Option<BackendKind>,
    bucket: Option<String>,
    region: Option<String>,
    config: Option<std::path::PathBuf>,
}

impl StoreFlags {
    fn options(&self) -> anyhow::Result<StoreOptions> {
        let from_flags = StoreOptions {
            bucket: self.bucket.clone(),
            region: self.region.clone(),
            ..StoreOptions::default()
        };
        let from_file = match &self.config {
            Some(path) => StoreOptions::load(path)?,
            None => StoreOptions::default(),
        };
        Ok(from_flags.or(from_file))
    }

    fn open(&self, path: &str) -> anyhow::Result<Box<dyn Store>> {
        let options = self.options()?;
        debug!(path, backend = ?self.backend, "opening store");
        let store = match self.backend {
            Some(kind) => {
                let env: EnvVars = std::env::vars().collect();
                init(kind, options.or(options_from_env(kind, &env)))
            }
            None => get_store_with(path, options),
        };
        store.with_context(|| format!("cannot open store for {path}"))
    }
}

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let flags = StoreFlags {
        backend: cli.backend,
        bucket: cli.bucket,
        region: cli.region,
        config: cli.config,
    };
    let format = cli.format;
    match cli.command {
        Command::Kind(args) => cmd_kind(args, &format),
        Command::Cat(args) => cmd_cat(&flags, args),
        Command::Put(args) => cmd_put(&flags, args, false),
        Command::Update(args) => cmd_put(&flags, args, true),
        Command::Rm(args) => cmd_rm(&flags, args),
        Command::Stat(args) => cmd_stat(&flags, args, &format),
        Command::Ls(args) => cmd_ls(&flags, args, &format),
        Command::Mkdir(args) => cmd_mkdir(&flags, args),
        Command::Filter(args) => cmd_filter(&flags, args),
    }
}

fn input(file: Option<&std::path::Path>) -> anyhow::Result<Box<dyn Read>> {
    match file {
        Some(path) => {
            let f = File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
            Ok(Box::new(f))
        }
        None => Ok(Box::new(io::stdin().lock())),
    }
}

fn cmd_kind(args: KindArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let kind = match &args.path {
        Some(path) => storage_type(path),
        None => {
            let env: EnvVars = std::env::vars().collect();
            default_kind_from_env(&env)
        }
    };
    match format {
        OutputFormat::Json => println!("{}", json!({ "path": args.path, "backend": kind })),
        OutputFormat::Text => {
            let label = if kind == BackendKind::Unsupported {
                kind.label().red()
            } else {
                kind.label().cyan()
            };
            println!("{label}");
        }
    }
    Ok(())
}

fn cmd_cat(flags: &StoreFlags, args: PathArgs) -> anyhow::Result<()> {
    let store = flags.open(&args.path)?;
    let data = store.read(&args.path)?;
    let mut out = io::stdout().lock();
    out.write_all(&data)?;
    out.flush()?;
    Ok(())
}

fn cmd_put(flags: &StoreFlags, args: WriteArgs, replace_only: bool) -> anyhow::Result<()> {
    let store = flags.open(&args.path)?;
    let mut reader = input(args.file.as_deref())?;
    if replace_only {
        store.update(&args.path, reader.as_mut())?;
        println!("{} Updated {}", "✓".green(), args.path.bold());
    } else {
        store.create(&args.path, reader.as_mut())?;
        println!("{} Wrote {}", "✓".green(), args.path.bold());
    }
    Ok(())
}

fn cmd_rm(flags: &StoreFlags, args: RmArgs) -> anyhow::Result<()> {
    let store = flags.open(&args.path)?;
    if args.recursive {
        store.remove_all(&args.path)?;
    } else {
        store.remove(&args.path)?;
    }
    println!("{} Removed {}", "✓".green(), args.path.bold());
    Ok(())
}

fn describe(desc: &ObjectDescriptor) -> String {
    let kind = if desc.is_dir { "dir ".blue() } else { "file".normal() };
    let modified = desc
        .modified
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "-".into());
    format!(
        "{kind} {:04o} {:>12} {} {}",
        desc.mode,
        desc.size,
        modified.dimmed(),
        desc.name
    )
}

fn cmd_stat(flags: &StoreFlags, args: PathArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let store = flags.open(&args.path)?;
    let desc = store.stat(&args.path)?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&desc)?),
        OutputFormat::Text => println!("{}", describe(&desc)),
    }
    Ok(())
}

fn cmd_ls(flags: &StoreFlags, args: LsArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let store = flags.open(&args.path)?;
    if let Some(ext) = &args.ext {
        let names = store.find_by_ext(&args.path, ext)?;
        match format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&names)?),
            OutputFormat::Text => names.iter().for_each(|n| println!("{n}")),
        }
        return Ok(());
    }

    let mut entries = store.read_dir(&args.path)?;
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&entries)?),
        OutputFormat::Text if entries.is_empty() => println!("{}", "(empty)".dimmed()),
        OutputFormat::Text => entries.iter().for_each(|d| println!("{}", describe(d))),
    }
    Ok(())
}

fn cmd_mkdir(flags: &StoreFlags, args: MkdirArgs) -> anyhow::Result<()> {
    let store = flags.open(&args.path)?;
    if args.parents {
        store.mkdir_all(&args.path, args.mode)?;
    } else {
        store.mkdir(&args.path, args.mode)?;
    }
    if store.kind().is_remote() {
        println!(
            "{} {} has no directories; nothing was created",
            "note:".yellow(),
            store.kind()
        );
    } else {
        println!("{} Created {}", "✓".green(), args.path.bold());
    }
    Ok(())
}

fn cmd_filter(flags: &StoreFlags, args: WriteArgs) -> anyhow::Result<()> {
    let store = flags.open(&args.path)?;
    let mut reader = input(args.file.as_deref())?;
    let mut copied = 0u64;
    store.write_filter(&args.path, &mut |file: &mut File| -> io::Result<()> {
        copied = io::copy(&mut reader, file)?;
        Ok(())
    })?;
    println!(
        "{} Published {} ({copied} bytes)",
        "✓".green(),
        args.path.bold()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flags() -> StoreFlags {
        StoreFlags {
            backend: None,
            bucket: None,
            region: None,
            config: None,
        }
    }

    #[test]
    fn flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("omni.toml");
        std::fs::write(&path, "bucket = \"from-file\"\nregion = \"us-east-1\"\n").unwrap();

        let flags = StoreFlags {
            bucket: Some("from-flag".into()),
            config: Some(path),
            ..flags()
        };
        let options = flags.options().unwrap();
        assert_eq!(options.bucket.as_deref(), Some("from-flag"));
        assert_eq!(options.region.as_deref(), Some("us-east-1"));
    }

    #[test]
    fn local_paths_open_filesystem_store() {
        let store = flags().open(".").unwrap();
        assert_eq!(store.kind(), BackendKind::Filesystem);
    }

    #[test]
    fn explicit_backend_wins_over_path() {
        let flags = StoreFlags {
            backend: Some(BackendKind::Unsupported),
            ..flags()
        };
        assert!(flags.open("./local").is_err());
    }

    #[test]
    fn put_then_filter_then_rm() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src.txt");
        std::fs::write(&src, "payload").unwrap();
        let dest = dir.path().join("out/dest.txt").to_string_lossy().into_owned();

        let args = WriteArgs { path: dest.clone(), file: Some(src.clone()) };
        cmd_put(&flags(), args, false).unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), b"payload");

        let filtered = dir.path().join("filtered.txt").to_string_lossy().into_owned();
        let args = WriteArgs { path: filtered.clone(), file: Some(src) };
        cmd_filter(&flags(), args).unwrap();
        assert_eq!(std::fs::read(&filtered).unwrap(), b"payload");

        cmd_rm(&flags(), RmArgs { path: dest.clone(), recursive: false }).unwrap();
        assert!(!std::path::Path::new(&dest).exists());
    }

    #[test]
    fn update_requires_existing_local_file() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src.txt");
        std::fs::write(&src, "x").unwrap();
        let missing = dir.path().join("missing.txt").to_string_lossy().into_owned();

        let args = WriteArgs { path: missing, file: Some(src) };
        assert!(cmd_put(&flags(), args, true).is_err());
    }
}
