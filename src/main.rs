mod env_utils;
mod logging;
mod shell;

use std::{
    fs::{File, OpenOptions},
    io,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use clap::Parser;
use fat32::{format_volume, FormatOptions, Session};
use log::{info, LevelFilter};
use logging::Logger;

#[derive(Debug, Parser)]
#[command(name = "fatsh")]
#[command(about = "Interactive shell over a FAT32 disk image")]
struct Cli {
    /// FAT32 image to mount.
    image: PathBuf,
    /// Write a fresh FAT32 volume of this many sectors to IMAGE before mounting.
    #[arg(long = "format-sectors")]
    format_sectors: Option<u32>,
    /// Sectors per cluster used with --format-sectors (default 1).
    #[arg(long = "sectors-per-cluster", requires = "format_sectors")]
    sectors_per_cluster: Option<u8>,
    /// Overrides FATSH_LOG (off, error, warn, info, debug, trace).
    #[arg(long = "log-level")]
    log_level: Option<LevelFilter>,
}

fn format_image(path: &Path, total_sectors: u32, sectors_per_cluster: Option<u8>) -> Result<()> {
    let mut file = File::create(path)
        .with_context(|| format!("could not create image '{}'", path.display()))?;
    let mut opts = FormatOptions::with_total_sectors(total_sectors);
    if let Some(sectors_per_cluster) = sectors_per_cluster {
        opts.sectors_per_cluster = sectors_per_cluster;
    }
    format_volume(&mut file, &opts)
        .with_context(|| format!("formatting '{}' failed", path.display()))?;
    info!("formatted {} ({total_sectors} sectors)", path.display());
    Ok(())
}

fn image_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn run(cli: Cli) -> Result<()> {
    let level = env_utils::log_level(cli.log_level)?;
    Logger::from_env(level)?.install()?;

    if let Some(total_sectors) = cli.format_sectors {
        format_image(&cli.image, total_sectors, cli.sectors_per_cluster)?;
    }

    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(&cli.image)
        .with_context(|| format!("could not open file image '{}'", cli.image.display()))?;
    let mut session =
        Session::mount(file, image_name(&cli.image)).context("initialization failed")?;

    let stdin = io::stdin();
    let stdout = io::stdout();
    shell::run(&mut session, stdin.lock(), stdout.lock())?;

    session.unmount().context("flushing image")?;
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        eprintln!("error: {err:?}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cluster_size_needs_format_request() {
        let err = Cli::try_parse_from(["fatsh", "disk.img", "--sectors-per-cluster", "8"])
            .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);

        let cli = Cli::try_parse_from([
            "fatsh",
            "disk.img",
            "--format-sectors",
            "4096",
            "--sectors-per-cluster",
            "8",
        ])
        .unwrap();
        assert_eq!(cli.format_sectors, Some(4096));
        assert_eq!(cli.sectors_per_cluster, Some(8));
    }
}
