//! Sane-capture binary: list scanners, inspect options and scan to a file.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use sane_capture::{Backend, OptionValue, Sane, ScanSettings, Scanner, ValueType};

/// Scan images with SANE scanners
#[derive(Parser)]
#[command(name = "sane-capture")]
#[command(version)]
#[command(about = "Scan images with SANE scanners", long_about = None)]
struct Args {
    /// TOML file with the device and option assignments
    #[arg(short, long, global = true)]
    settings: Option<PathBuf>,

    /// Only consider local devices
    #[arg(long, global = true)]
    local: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List available devices
    List,
    /// Show the options of a device with their current values
    Options {
        /// Device name; defaults to the settings file or the first device
        device: Option<String>,
    },
    /// Acquire an image and write it to a file
    Scan {
        /// Device name; defaults to the settings file or the first device
        #[arg(short, long)]
        device: Option<String>,

        /// Option assignment, applied after the settings file
        #[arg(long = "set", value_name = "NAME=VALUE", value_parser = parse_assignment)]
        set: Vec<(String, OptionValue)>,

        /// Output file; the format follows the extension (png, tif)
        #[arg(short, long, default_value = "scan.png")]
        output: PathBuf,

        /// Keep 16-bit samples
        #[arg(long)]
        raw: bool,

        /// Scan every page of the document feeder; `{n}` in the output
        /// name is replaced by the page number
        #[arg(long)]
        batch: bool,
    },
}

fn parse_assignment(s: &str) -> Result<(String, OptionValue), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{s}'"))?;
    let value = value.parse().map_err(|_| format!("invalid value '{value}'"))?;
    Ok((name.trim().to_owned(), value))
}

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Err(err) = run(Args::parse()) {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}

fn run(args: Args) -> anyhow::Result<()> {
    let mut settings = match &args.settings {
        Some(path) => ScanSettings::from_path(path)?,
        None => ScanSettings::default(),
    };
    settings.local_only |= args.local;

    let sane = Sane::init().context("Failed to initialize SANE")?;
    info!(version = %sane.version(), "Using SANE");

    match args.command {
        Command::List => list(&sane, settings.local_only),
        Command::Options { device } => {
            let name = pick_device(&sane, device, &settings)?;
            let scanner = sane.open_scanner(&name)?;
            options(&scanner)
        }
        Command::Scan {
            device,
            set,
            output,
            raw,
            batch,
        } => {
            let name = pick_device(&sane, device, &settings)?;
            for (option, value) in set {
                settings.push(&option, value);
            }
            let mut scanner = sane
                .open_scanner(&name)
                .with_context(|| format!("Failed to open {name}"))?;
            settings
                .apply(&mut scanner)
                .context("Failed to apply settings")?;
            if batch {
                scan_batch(&mut scanner, &output)
            } else {
                scan_one(&mut scanner, &output, raw)
            }
        }
    }
}

fn list(sane: &Sane, local_only: bool) -> anyhow::Result<()> {
    let devices = sane.devices(local_only)?;
    if devices.is_empty() {
        println!("No scanners found");
    }
    for device in devices {
        println!(
            "{}: {} {} ({})",
            device.name, device.vendor, device.model, device.kind
        );
    }
    Ok(())
}

fn pick_device(
    sane: &Sane,
    device: Option<String>,
    settings: &ScanSettings,
) -> anyhow::Result<String> {
    if let Some(name) = device.or_else(|| settings.device.clone()) {
        return Ok(name);
    }
    let devices = sane.devices(settings.local_only)?;
    match devices.into_iter().next() {
        Some(device) => Ok(device.name),
        None => bail!("No scanners found"),
    }
}

fn options(scanner: &Scanner<Sane>) -> anyhow::Result<()> {
    let (vendor, model) = scanner.model()?;
    println!("Device: {} ({vendor} {model})", scanner.name());
    for desc in scanner.descriptors() {
        if desc.value_type() == ValueType::Group {
            println!("\n[{}]", desc.title());
            continue;
        }
        match scanner.describe(desc.name()) {
            Ok(text) => println!("\n{text}"),
            Err(err) => println!("\n{desc}\nCur value: <{err}>"),
        }
    }
    Ok(())
}

fn scan_one(scanner: &mut Scanner<Sane>, output: &Path, raw: bool) -> anyhow::Result<()> {
    let image = if raw {
        scanner.start()?;
        scanner.snap_raw()?.to_image()?
    } else {
        scanner.scan_image()?
    };
    image
        .save(output)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    println!(
        "Saved {}x{} image to {}",
        image.width(),
        image.height(),
        output.display()
    );
    Ok(())
}

fn scan_batch(scanner: &mut Scanner<Sane>, output: &Path) -> anyhow::Result<()> {
    let pattern = output.to_string_lossy();
    if !pattern.contains("{n}") {
        bail!("Batch output name must contain {{n}}, got '{pattern}'");
    }
    let mut pages = 0;
    for (n, page) in scanner.multi_scan().enumerate() {
        let frame = page.with_context(|| format!("Page {} failed", n + 1))?;
        let path = pattern.replace("{n}", &(n + 1).to_string());
        frame
            .to_image()?
            .save(&path)
            .with_context(|| format!("Failed to write {path}"))?;
        println!("Saved page {} to {path}", n + 1);
        pages += 1;
    }
    println!("{pages} page(s) scanned");
    Ok(())
}
