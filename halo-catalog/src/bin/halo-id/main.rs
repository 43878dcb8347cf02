//! halo-id: mass-ranked or ID-based halo selection with subhalo exclusion
//!
//! Reads a TOML configuration, resolves the requested halos in one snapshot
//! of a Rockstar-style catalog, drops halos that sit inside a larger halo,
//! and writes `ID Snapshot` rows.

mod cli;
mod logging;

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{CheckArgs, Cli, Commands, RunArgs};
use halo_catalog::{
    format_selection, parse_config, run_selection, AsciiCatalog, CatalogCache, EXAMPLE_CONFIG,
};
use log::info;

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_logger(cli.verbose);

    match &cli.command {
        Commands::Run(args) => run(args),
        Commands::Check(args) => check(args),
        Commands::ExampleConfig => {
            print!("{}", EXAMPLE_CONFIG);
            Ok(())
        }
    }
}

fn run(args: &RunArgs) -> Result<()> {
    let start = Instant::now();

    let config = parse_config(&args.config)
        .with_context(|| format!("Invalid configuration in {}", args.config.display()))?;
    let request = config.to_request()?;

    let mut cache = CatalogCache::new(AsciiCatalog::new(config.layout()));
    let rows = run_selection(&mut cache, &request).with_context(|| {
        format!(
            "Selection failed for snapshot {} ({} selectors)",
            request.snapshot, request.id_type
        )
    })?;

    let mut text = format_selection(&rows).join("\n");
    text.push('\n');
    match &args.output {
        Some(path) => write_atomically(path, &text)?,
        None => io::stdout()
            .lock()
            .write_all(text.as_bytes())
            .context("Failed to write rows to stdout")?,
    }

    let stats = cache.stats();
    info!(
        "Wrote {} rows ({} header reads, {} catalog reads)",
        rows.len(),
        stats.header_reads,
        stats.catalog_reads
    );
    info!("Time: {:.3?}", start.elapsed());
    Ok(())
}

fn check(args: &CheckArgs) -> Result<()> {
    let config = parse_config(&args.config)
        .with_context(|| format!("Invalid configuration in {}", args.config.display()))?;
    let request = config.to_request()?;
    println!(
        "{}: ok (snapshot {}, {} selectors as {}, exclusion '{}')",
        args.config.display(),
        request.snapshot,
        request.selectors.len(),
        request.id_type,
        request.exclusion.as_str()
    );
    Ok(())
}

/// Write via a sibling temporary file so a failed run never leaves a
/// truncated output behind. The temporary file is removed on failure.
fn write_atomically(path: &Path, text: &str) -> Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    let written = fs::write(&tmp, text)
        .with_context(|| format!("Failed to write {}", tmp.display()))
        .and_then(|()| {
            fs::rename(&tmp, path)
                .with_context(|| format!("Failed to move output into {}", path.display()))
        });
    if written.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    written
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_atomically_replaces_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ids.txt");
        fs::write(&path, "old\n").unwrap();

        write_atomically(&path, "# Column contents: ID(0) Snapshot(1)\n").unwrap();
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "# Column contents: ID(0) Snapshot(1)\n"
        );
        assert!(!dir.path().join("ids.txt.tmp").exists());
    }

    #[test]
    fn test_failed_rename_removes_temporary() {
        let dir = TempDir::new().unwrap();
        // A non-empty directory cannot be replaced by a file.
        let path = dir.path().join("out");
        fs::create_dir(&path).unwrap();
        fs::write(path.join("keep"), "x").unwrap();

        assert!(write_atomically(&path, "7  10\n").is_err());
        assert!(!dir.path().join("out.tmp").exists());
        assert!(path.join("keep").exists());
    }
}
