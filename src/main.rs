//! dos_scandisk - FAT12 image checker and repair tool
//!
//! - Finds clusters allocated in the FAT that no directory entry reaches
//! - Reattaches each lost chain to the root directory as `foundN.dat`
//! - Truncates or resizes files whose chain disagrees with their declared size
//!
//! Repairs are written to the image in place. Do not run it on a mounted filesystem.

mod boot_sector;
mod chain;
mod directory;
mod dirent;
mod disk_reader;
mod error;
mod fat;
mod reachability;
mod reconcile;
mod recovery;
mod report;
mod scan_engine;
#[cfg(test)]
mod test_image;
mod volume;
mod walk;

use log::info;
use std::env;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process;

use crate::disk_reader::MappedImage;
use crate::error::{Result, ScanDiskError};
use crate::scan_engine::ScanEngine;

#[derive(Debug, PartialEq, Eq)]
struct Config {
    image_path: PathBuf,
    json: bool,
    dry_run: bool,
}

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Scan(Config),
    Help,
}

fn parse_args(args: &[String]) -> Result<Command> {
    let mut json = false;
    let mut dry_run = false;
    let mut paths = Vec::new();

    for arg in args {
        match arg.as_str() {
            "--json" => json = true,
            "--dry-run" | "-n" => dry_run = true,
            "help" | "--help" | "-h" => return Ok(Command::Help),
            flag if flag.starts_with('-') && flag.len() > 1 => {
                return Err(ScanDiskError::Usage(format!("Unknown option: {}", flag)));
            }
            path => paths.push(PathBuf::from(path)),
        }
    }

    match paths.len() {
        1 => Ok(Command::Scan(Config {
            image_path: paths.remove(0),
            json,
            dry_run,
        })),
        0 => Err(ScanDiskError::Usage("No image given".to_string())),
        n => Err(ScanDiskError::Usage(format!(
            "Expected one image, got {}",
            n
        ))),
    }
}

fn scan(config: &Config) -> Result<()> {
    let image = MappedImage::open(&config.image_path, config.dry_run)?;
    let mut engine = ScanEngine::new(image)?;
    let geometry = engine.volume().geometry();
    info!(
        "Checking {}: {} clusters of {} bytes",
        config.image_path.display(),
        geometry.total_clusters,
        geometry.cluster_size()
    );
    let report = engine.run();
    engine.into_image().flush()?;

    if report.is_clean() {
        info!("{} is consistent", config.image_path.display());
    }

    let stdout = io::stdout();
    let mut out = stdout.lock();
    if config.json {
        let json = report.to_json().map_err(io::Error::from)?;
        writeln!(out, "{}", json)?;
    } else {
        report.write_text(&mut out)?;
    }
    out.flush()?;
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args: Vec<String> = env::args().skip(1).collect();

    let config = match parse_args(&args) {
        Ok(Command::Scan(config)) => config,
        Ok(Command::Help) => {
            print_usage();
            return;
        }
        Err(e) => {
            eprintln!("{}", e);
            print_usage();
            process::exit(1);
        }
    };

    if let Err(e) = scan(&config) {
        eprintln!("dos_scandisk: {}: {}", config.image_path.display(), e);
        process::exit(2);
    }
}

fn print_usage() {
    eprintln!("
Usage: dos_scandisk [options] <imagename>

Checks a FAT12 disk image and repairs it in place:
  - lost cluster chains are saved in the root directory as FOUNDn.DAT
  - files whose size disagrees with their cluster chain are corrected

OPTIONS:
  --json            Print the report as JSON
  --dry-run, -n     Report what would be repaired without writing to the image
  --help, -h        Show this help message

Set RUST_LOG=info or RUST_LOG=debug for progress on stderr.
");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_single_image() {
        assert_eq!(
            parse_args(&args(&["floppy.img"])).unwrap(),
            Command::Scan(Config {
                image_path: PathBuf::from("floppy.img"),
                json: false,
                dry_run: false,
            })
        );
    }

    #[test]
    fn test_flags() {
        assert_eq!(
            parse_args(&args(&["--json", "-n", "floppy.img"])).unwrap(),
            Command::Scan(Config {
                image_path: PathBuf::from("floppy.img"),
                json: true,
                dry_run: true,
            })
        );
        assert_eq!(parse_args(&args(&["-h"])).unwrap(), Command::Help);
    }

    #[test]
    fn test_usage_errors() {
        assert!(matches!(parse_args(&[]), Err(ScanDiskError::Usage(_))));
        assert!(matches!(
            parse_args(&args(&["a.img", "b.img"])),
            Err(ScanDiskError::Usage(_))
        ));
        assert!(matches!(
            parse_args(&args(&["--force", "a.img"])),
            Err(ScanDiskError::Usage(_))
        ));
    }
}
