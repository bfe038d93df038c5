// SPDX-License-Identifier: MIT
//! Upload container CLI
//!
//! Packs files into containers, inspects their headers and unpacks payloads.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;
use upload_container::{
    read_container, read_header, Config, ContainerWriter, FileHeader, NameGenerator, ReadMode,
};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "upload-container")]
#[command(about = "Pack, inspect and unpack upload containers", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Pack a file into a container
    Pack {
        /// File to pack
        input: PathBuf,
        /// MIME type to record (default: application/octet-stream)
        #[arg(short, long, default_value = "application/octet-stream")]
        mime: String,
        /// Original name to record (default: the input file name)
        #[arg(short, long)]
        name: Option<String>,
        /// API key index to record
        #[arg(short, long, default_value_t = 0)]
        api_key_id: u8,
        /// Output path (default: a generated name in the storage directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print a container header as JSON
    Inspect {
        /// Container file
        file: PathBuf,
    },
    /// Write a container's payload to a file
    Unpack {
        /// Container file
        file: PathBuf,
        /// Where to write the payload
        #[arg(short, long)]
        output: PathBuf,
        /// Write the compressed bytes as stored instead of decompressing
        #[arg(long)]
        raw: bool,
    },
    /// Decompress a container and print the payload size and SHA-256
    Verify {
        /// Container file
        file: PathBuf,
    },
    /// Print a random storage name
    Name {
        /// Name length (default: UPLOAD_CONTAINER_NAME_LENGTH)
        #[arg(short, long)]
        length: Option<usize>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(true)
        .with_writer(io::stderr)
        .init();

    let config = Config::from_env();
    config.validate().map_err(anyhow::Error::msg)?;
    debug!(?config, "Configuration loaded and validated");

    let cli = Cli::parse();

    match cli.command {
        Commands::Pack {
            input,
            mime,
            name,
            api_key_id,
            output,
        } => pack(&config, &input, mime, name, api_key_id, output)?,
        Commands::Inspect { file } => inspect(&file)?,
        Commands::Unpack { file, output, raw } => unpack(&file, &output, raw)?,
        Commands::Verify { file } => verify(&file)?,
        Commands::Name { length } => {
            println!(
                "{}",
                NameGenerator::new().generate(length.unwrap_or(config.name_length))
            )
        }
    }

    Ok(())
}

fn pack(
    config: &Config,
    input: &Path,
    mime: String,
    name: Option<String>,
    api_key_id: u8,
    output: Option<PathBuf>,
) -> Result<()> {
    let original_name = match name {
        Some(name) => name,
        None => input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
    };
    let header = FileHeader::new(now_in_seconds(), api_key_id, mime, original_name);

    let output = match output {
        Some(path) => path,
        None => {
            fs::create_dir_all(&config.storage_dir).with_context(|| {
                format!("Failed to create storage directory {:?}", config.storage_dir)
            })?;
            config
                .storage_dir
                .join(NameGenerator::new().generate(config.name_length))
        }
    };
    if output.exists() {
        bail!("Refusing to overwrite existing file {:?}", output);
    }

    let source = File::open(input).with_context(|| format!("Failed to open {:?}", input))?;
    let written = write_atomically(&output, |destination| {
        ContainerWriter::from_config(config)
            .write(destination, &header, &mut BufReader::new(&source))
            .map_err(anyhow::Error::from)
    })?;

    info!(path = ?output, bytes = written, "Container written");
    println!("{}", output.display());
    Ok(())
}

/// Write to a uuid-named sibling temp file and rename into place only on success
fn write_atomically<F>(path: &Path, write: F) -> Result<u64>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<u64>,
{
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let temp_path = parent.join(format!(".tmp-{}", Uuid::new_v4()));
    debug!("Writing container to temp file: {:?}", temp_path);

    let result = File::create(&temp_path)
        .with_context(|| format!("Failed to create {:?}", temp_path))
        .and_then(|file| {
            let mut destination = BufWriter::new(file);
            let written = write(&mut destination)?;
            let file = destination
                .into_inner()
                .map_err(|e| anyhow::Error::from(e.into_error()))?;
            file.sync_all()?;
            Ok(written)
        });

    match result {
        Ok(written) => {
            fs::rename(&temp_path, path)
                .with_context(|| format!("Failed to move container into {:?}", path))?;
            Ok(written)
        }
        Err(e) => {
            warn!("Failed to write container {:?}: {}", temp_path, e);
            let _ = fs::remove_file(&temp_path);
            Err(e)
        }
    }
}

fn inspect(file: &Path) -> Result<()> {
    let mut source = open(file)?;
    let (header, consumed) =
        read_header(&mut source).with_context(|| format!("Failed to read header of {:?}", file))?;

    let report = serde_json::json!({
        "header": header,
        "header_bytes": consumed,
        "file_bytes": fs::metadata(file)?.len(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn unpack(file: &Path, output: &Path, raw: bool) -> Result<()> {
    let mut handle = read_container(Some(open(file)?))
        .with_context(|| format!("Failed to open container {:?}", file))?;
    if !raw {
        handle.set_mode(ReadMode::Decompressed)?;
    }

    let mut destination =
        BufWriter::new(File::create(output).with_context(|| format!("Failed to create {:?}", output))?);
    let copied = handle.write_to(&mut destination)?;
    destination.flush()?;

    info!(path = ?output, bytes = copied, raw, "Payload written");
    Ok(())
}

fn verify(file: &Path) -> Result<()> {
    let mut handle = read_container(Some(open(file)?))
        .with_context(|| format!("Failed to open container {:?}", file))?;
    handle.set_mode(ReadMode::Decompressed)?;

    let mut hasher = HashingSink::default();
    let size = handle
        .write_to(&mut hasher)
        .with_context(|| format!("Payload of {:?} is corrupt", file))?;

    println!("size: {}", size);
    println!("sha256: {}", hex::encode(hasher.hasher.finalize()));
    Ok(())
}

fn open(file: &Path) -> Result<BufReader<File>> {
    let file = File::open(file).with_context(|| format!("Failed to open {:?}", file))?;
    Ok(BufReader::new(file))
}

fn now_in_seconds() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp(now.timestamp(), 0).unwrap_or(now)
}

/// Discards written bytes while hashing them
#[derive(Default)]
struct HashingSink {
    hasher: Sha256,
}

impl Write for HashingSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.hasher.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
