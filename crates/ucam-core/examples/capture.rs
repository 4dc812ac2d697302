//! uCAM-III capture tool
//!
//! Synchronizes with the camera, applies capture settings, takes a JPEG
//! snapshot and downloads it.
//!
//! Usage:
//!   cargo run --example capture -- [OPTIONS]
//!
//! Options:
//!   --port PORT       Serial port (default: /dev/ttyUSB0)
//!   --baud RATE       Switch to this baud rate after connecting
//!   --package SIZE    Package size, 64-512 (default: 512)
//!   --output FILE     Write the picture here (default: snapshot.jpg)
//!   --config FILE     Load session settings from a JSON file
//!   --verbose         Log every frame

use anyhow::Context;
use std::path::PathBuf;
use std::str::FromStr;
use tracing_subscriber::EnvFilter;
use ucam_core::prelude::*;

struct Options {
    config: SessionConfig,
    target_baud: Option<u32>,
    package_size: u16,
    output: PathBuf,
    help: bool,
}

/// Value following `flag`, parsed
fn value<T>(args: &[String], i: usize, flag: &str) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw = args
        .get(i)
        .with_context(|| format!("{} needs a value", flag))?;
    raw.parse()
        .with_context(|| format!("invalid value for {}: {}", flag, raw))
}

fn parse_args(args: &[String]) -> anyhow::Result<Options> {
    let mut options = Options {
        config: SessionConfig::new("/dev/ttyUSB0"),
        target_baud: None,
        package_size: 512,
        output: PathBuf::from("snapshot.jpg"),
        help: false,
    };
    let mut port_name: Option<String> = None;
    let mut verbose = false;

    let mut i = 1;
    while i < args.len() {
        let flag = args[i].as_str();
        match flag {
            "--port" | "-p" => {
                i += 1;
                port_name = Some(value(args, i, flag)?);
            }
            "--baud" | "-b" => {
                i += 1;
                options.target_baud = Some(value(args, i, flag)?);
            }
            "--package" => {
                i += 1;
                options.package_size = value(args, i, flag)?;
            }
            "--output" | "-o" => {
                i += 1;
                options.output = value(args, i, flag)?;
            }
            "--config" | "-c" => {
                i += 1;
                let path: PathBuf = value(args, i, flag)?;
                options.config = SessionConfig::load(&path)
                    .with_context(|| format!("loading {}", path.display()))?;
            }
            "--verbose" | "-v" => verbose = true,
            "--help" | "-h" => options.help = true,
            other => anyhow::bail!("Unknown option: {}", other),
        }
        i += 1;
    }
    if let Some(port) = port_name {
        options.config.port_name = port;
    }
    options.config.logging |= verbose;
    Ok(options)
}

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let Options {
        config,
        target_baud,
        package_size,
        output,
        help,
    } = parse_args(&args)?;
    if help {
        print_help();
        return Ok(());
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // A hardware reset before connecting is the only way to be sure of camera state
    let mut camera = Session::open_serial(config);
    camera.connect()?;
    if let Some(rate) = target_baud {
        camera.set_baud_rate(rate)?;
    }
    camera.disable_sleep_timeout()?;
    camera.set_image_format(
        ImageFormat::Jpeg,
        RawResolution::R128x128,
        JpegResolution::R640x480,
    )?;
    camera.set_exposure(Contrast::Normal, Brightness::Normal, Exposure::Zero)?;
    camera.set_package_size(package_size)?;
    camera.snapshot(SnapshotKind::Jpeg)?;

    let picture = camera.get_picture(PictureKind::Snapshot)?;
    std::fs::write(&output, &picture).with_context(|| format!("writing {}", output.display()))?;
    println!("Saved {} bytes to {}", picture.len(), output.display());
    Ok(())
}

fn print_help() {
    println!("uCAM-III capture tool");
    println!();
    println!("Usage: capture [OPTIONS]");
    println!();
    println!("Options:");
    println!("  --port PORT       Serial port (default: /dev/ttyUSB0)");
    println!("  --baud RATE       Switch to this baud rate after connecting");
    println!("  --package SIZE    Package size, 64-512 (default: 512)");
    println!("  --output FILE     Write the picture here (default: snapshot.jpg)");
    println!("  --config FILE     Load session settings from a JSON file");
    println!("  --verbose         Log every frame");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("capture")
            .chain(list.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn test_parse_args() {
        let argv = args(&["--port", "COM3", "-b", "57600", "--package", "256"]);
        let options = parse_args(&argv).unwrap();
        assert_eq!(options.config.port_name, "COM3");
        assert_eq!(options.target_baud, Some(57600));
        assert_eq!(options.package_size, 256);
        assert!(!options.help);
    }

    #[test]
    fn test_unparsable_values_are_rejected() {
        assert!(parse_args(&args(&["--baud", "fast"])).is_err());
        assert!(parse_args(&args(&["--package", "big"])).is_err());
        assert!(parse_args(&args(&["--package", "70000"])).is_err());
        assert!(parse_args(&args(&["--baud"])).is_err());
    }
}
