mod prompt;

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use clap::Parser;

use cryptar_core::commands::{create, extract, list, REMOTE_TARGET};
use cryptar_core::error::Result;
use cryptar_core::manifest::Entry;
use cryptar_core::platform::paths;
use cryptar_core::store::local::LocalStore;

use prompt::TerminalPrompter;

#[derive(Parser)]
#[command(
    name = "cryptar",
    version,
    about = "Deduplicating, encrypted, tar-like backups on an object store",
    after_help = "\
With no mode flag, -c is assumed. The manifest target defaults to '-',
which seals the manifest and stores it remotely under a timestamp name;
pass -f <name> to read or write it elsewhere.

Environment variables:
  CRYPTAR_HOME    State directory (default: ~/.cryptar)
  CRYPTAR_VAULT   Object store directory (default: <state dir>/vault)"
)]
struct Cli {
    /// Create an archive (default)
    #[arg(short = 'c')]
    create: bool,

    /// Extract an archive
    #[arg(short = 'x')]
    extract: bool,

    /// List archive contents
    #[arg(short = 't')]
    list: bool,

    /// Verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', action = clap::ArgAction::Count)]
    verbose: u8,

    /// Compress file payloads
    #[arg(short = 'z')]
    compress: bool,

    /// Restore permissions, ownership and timestamps
    #[arg(short = 'p')]
    perms: bool,

    /// Manifest target: local path, or '-' for the remote store
    #[arg(short = 'f', value_name = "TARGET", default_value = REMOTE_TARGET)]
    target: String,

    /// Extraction root
    #[arg(short = 'C', value_name = "DIR", default_value = ".")]
    root: String,

    /// Object store directory (overrides CRYPTAR_VAULT)
    #[arg(long, value_name = "DIR")]
    vault: Option<PathBuf>,

    /// Paths to archive
    paths: Vec<String>,
}

fn main() {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli) {
        eprintln!("cryptar: {e}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let mode_flags = [cli.create, cli.extract, cli.list]
        .iter()
        .filter(|f| **f)
        .count();
    if mode_flags > 1 {
        return Err(cryptar_core::error::CryptarError::Config(
            "specify only one of -c, -x or -t".into(),
        ));
    }

    let state_dir = paths::state_dir()?;
    let vault_dir = cli
        .vault
        .clone()
        .unwrap_or_else(|| paths::default_vault_dir(&state_dir));
    let store = LocalStore::new(vault_dir)?;
    let mut prompter = TerminalPrompter;
    let cancel = Arc::new(AtomicBool::new(false));

    if cli.extract {
        let opts = extract::ExtractOptions {
            manifest: require_manifest(&cli.target)?,
            root: cli.root.clone(),
            restore_perms: cli.perms,
            verbose: cli.verbose > 0,
            cancel,
        };
        let stats = extract::run(&store, &mut prompter, &state_dir, &opts)?;
        println!(
            "extracted {} files, {} dirs, {} symlinks ({} bytes)",
            stats.files, stats.dirs, stats.symlinks, stats.bytes
        );
        return Ok(());
    }

    if cli.list {
        let manifest = require_manifest(&cli.target)?;
        let entries = list::run(&store, &mut prompter, &state_dir, &manifest)?;
        for entry in &entries {
            print_entry(entry);
        }
        return Ok(());
    }

    // Default mode is create, tar-style.
    if cli.paths.is_empty() {
        println!("usage: cryptar [-c] [-vzp] [-f target] paths...");
        return Ok(());
    }
    let opts = create::CreateOptions {
        roots: cli.paths.clone(),
        compress: cli.compress,
        target: cli.target.clone(),
        verbose: cli.verbose > 0,
        cancel,
    };
    let stats = create::run(&store, &mut prompter, &state_dir, &opts)?;
    println!(
        "archived {} files, {} dirs, {} symlinks ({} uploaded, {} deduped, {} skipped)",
        stats.files, stats.dirs, stats.symlinks, stats.uploaded, stats.deduped, stats.skipped
    );
    Ok(())
}

fn require_manifest(target: &str) -> Result<String> {
    if target == REMOTE_TARGET {
        return Err(cryptar_core::error::CryptarError::Config(
            "must provide a manifest name or file with -f".into(),
        ));
    }
    Ok(target.to_string())
}

fn print_entry(entry: &Entry) {
    match entry {
        Entry::Dir(e) => println!("d{:06o} {:>12} {}", e.mode & 0o7777, 0, e.path),
        Entry::Symlink(e) => println!("l{:06o} {:>12} {} -> {}", 0o777, 0, e.path, e.target),
        Entry::File(e) => println!("-{:06o} {:>12} {}", e.mode & 0o7777, e.size, e.path),
    }
}
