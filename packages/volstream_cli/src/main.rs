//! volstream - stream data in and out of raw volume images
//!
//! Every command goes through `VolumeStream`, so the same code paths serve
//! any `VolumeHandle` backend.
//!
//! Run with:
//!   cargo run -p volstream-cli -- info disk.img

use std::fs::File;
use std::io::{self, Read, SeekFrom, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use sha2::{Digest, Sha256};
use volstream::{FileVolume, FileVolumeConfig, VolumeHandle, VolumeStream};

#[derive(Parser)]
#[command(name = "volstream", about = "Stream data in and out of raw volume images")]
struct Cli {
    /// JSON volume configuration. An image argument overrides its path.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show the size of a volume image
    Info {
        image: Option<PathBuf>,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Copy a byte range out of a volume image
    Read {
        image: Option<PathBuf>,
        #[arg(long, default_value_t = 0)]
        offset: u64,
        /// Number of bytes; defaults to the rest of the volume
        #[arg(long)]
        length: Option<u64>,
        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Print a hex dump instead of raw bytes
        #[arg(long)]
        hex: bool,
    },
    /// Copy a file into a volume image
    Write {
        image: Option<PathBuf>,
        #[arg(short, long)]
        input: PathBuf,
        #[arg(long, default_value_t = 0)]
        offset: u64,
    },
    /// SHA-256 of a byte range
    Checksum {
        image: Option<PathBuf>,
        #[arg(long, default_value_t = 0)]
        offset: u64,
        #[arg(long)]
        length: Option<u64>,
    },
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let config = cli.config.as_deref();
    let stdout = io::stdout();
    let mut out = stdout.lock();

    match cli.command {
        Command::Info { image, json } => {
            let volume = open_volume(config, image, true)?;
            info(&volume, json, &mut out)?;
        }
        Command::Read { image, offset, length, output, hex } => {
            let volume = open_volume(config, image, true)?;
            let copied = match output {
                Some(path) => {
                    let mut file = File::create(&path)
                        .with_context(|| format!("creating {}", path.display()))?;
                    read_range(&volume, offset, length, hex, &mut file)?
                }
                None => read_range(&volume, offset, length, hex, &mut out)?,
            };
            log::info!("Read {} bytes from {}", copied, volume.path().display());
        }
        Command::Write { image, input, offset } => {
            let volume = open_volume(config, image, false)?;
            let mut file =
                File::open(&input).with_context(|| format!("opening {}", input.display()))?;
            let written = write_from(&volume, offset, &mut file)?;
            writeln!(out, "Wrote {} bytes at offset {}", written, offset)?;
        }
        Command::Checksum { image, offset, length } => {
            let volume = open_volume(config, image, true)?;
            writeln!(out, "{}", checksum(&volume, offset, length)?)?;
        }
    }

    Ok(())
}

fn volume_config(config: Option<&Path>, image: Option<PathBuf>) -> Result<FileVolumeConfig> {
    let mut settings = match (config, &image) {
        (Some(path), _) => FileVolumeConfig::from_json_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        (None, Some(_)) => FileVolumeConfig::default(),
        (None, None) => bail!("no volume image given; pass an image path or --config"),
    };

    if let Some(image) = image {
        settings.path = image;
    }
    Ok(settings)
}

fn open_volume(config: Option<&Path>, image: Option<PathBuf>, read_only: bool) -> Result<FileVolume> {
    let mut settings = volume_config(config, image)?;
    if read_only {
        settings.read_only = true;
        settings.create_size = None;
    }

    FileVolume::open(&settings)
        .with_context(|| format!("opening volume image {}", settings.path.display()))
}

fn info<W: Write>(volume: &FileVolume, json: bool, out: &mut W) -> Result<()> {
    let size = volume.size()?;
    if json {
        let report = serde_json::json!({
            "path": volume.path(),
            "size": size,
            "read_only": volume.is_read_only(),
        });
        writeln!(out, "{}", serde_json::to_string_pretty(&report)?)?;
    } else {
        writeln!(out, "{}: {} bytes", volume.path().display(), size)?;
    }
    Ok(())
}

/// Stream positioned at `offset`, limited to `length` bytes when given.
fn open_range<V: VolumeHandle>(volume: V, offset: u64, length: Option<u64>) -> Result<impl Read> {
    let mut stream = VolumeStream::new(volume);
    stream.seek_from(SeekFrom::Start(offset))?;
    Ok(stream.take(length.unwrap_or(u64::MAX)))
}

fn read_range<V: VolumeHandle, W: Write>(
    volume: V,
    offset: u64,
    length: Option<u64>,
    hex: bool,
    out: &mut W,
) -> Result<u64> {
    let mut reader = open_range(volume, offset, length)?;
    if !hex {
        return Ok(io::copy(&mut reader, out)?);
    }

    let mut data = Vec::new();
    reader.read_to_end(&mut data)?;
    for (i, line) in data.chunks(16).enumerate() {
        writeln!(out, "{:08x}  {}", offset + (i * 16) as u64, hex::encode(line))?;
    }
    Ok(data.len() as u64)
}

fn write_from<V: VolumeHandle, R: Read>(volume: V, offset: u64, input: &mut R) -> Result<u64> {
    let mut stream = VolumeStream::new(volume);
    stream.seek_from(SeekFrom::Start(offset))?;
    let written = io::copy(input, &mut stream)?;
    stream.flush()?;
    stream.close();
    Ok(written)
}

fn checksum<V: VolumeHandle>(volume: V, offset: u64, length: Option<u64>) -> Result<String> {
    let mut reader = open_range(volume, offset, length)?;
    let mut hasher = Sha256::new();
    io::copy(&mut reader, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}
