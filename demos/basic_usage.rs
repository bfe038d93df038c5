// SPDX-License-Identifier: MIT
//! Basic usage example for upload containers

use std::io::Read;
use upload_container::{
    generate_random_name, read_container, read_header, ContainerWriter, FileHeader, ReadMode,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Upload Container - Basic Usage ===\n");

    // Step 1: Describe the upload
    println!("1. Building header...");
    let header = FileHeader::new(chrono::Utc::now(), 3, "text/markdown", "meeting-notes.md");
    let upload = b"# Notes\n\n- ship the container format\n- ship it again\n".repeat(64);
    println!("   Original name: {}", header.original_name);
    println!("   Payload: {} bytes", upload.len());

    // Step 2: Write the container under a generated name
    println!("\n2. Writing container...");
    let dir = tempfile::tempdir()?;
    let path = dir.path().join(generate_random_name(9));
    let mut file = std::fs::File::create(&path)?;
    let written = ContainerWriter::with_level(9).write(&mut file, &header, &mut upload.as_slice())?;
    drop(file);
    println!("   Written to: {}", path.display());
    println!(
        "   Container size: {} bytes ({:.1}% of original)",
        written,
        written as f64 / upload.len() as f64 * 100.0
    );

    // Step 3: Header only, no decompression
    println!("\n3. Reading header only...");
    let (stored_header, header_bytes) = read_header(&mut std::fs::File::open(&path)?)?;
    println!("   Header: {} bytes", header_bytes);
    println!("   Uploaded: {}", stored_header.upload_date);
    println!("   MIME type: {}", stored_header.mime_type);

    // Step 4: Serve the raw gzip bytes as-is
    println!("\n4. Reading raw payload...");
    let mut handle = read_container(Some(std::fs::File::open(&path)?))?;
    let mut raw = Vec::new();
    handle.read_to_end(&mut raw)?;
    println!("   Raw gzip payload: {} bytes", raw.len());

    // Step 5: Decompress the original upload
    println!("\n5. Reading decompressed payload...");
    let mut handle = read_container(Some(std::fs::File::open(&path)?))?;
    handle.set_mode(ReadMode::Decompressed)?;
    let mut restored = Vec::new();
    handle.write_to(&mut restored)?;
    println!("   Restored: {} bytes, identical: {}", restored.len(), restored == upload);

    println!("\n=== Upload Container Demo Complete ===");
    Ok(())
}
