// SPDX-License-Identifier: MIT
//! # Upload Container
//!
//! A small binary container for stored uploads: the original bytes are gzip
//! compressed behind a magic marker and a metadata header, so a blob on disk
//! carries its own upload date, API key index, MIME type and original name.
//!
//! ## Format Specification
//!
//! ```text
//! All integers are unsigned big-endian.
//!
//! Offset  Size  Field
//! 0       2     Magic 0xFA 0xFA
//! 2       2     Header length H
//! 4       5     Upload timestamp (whole Unix seconds)
//! 9       1     API key id
//! 10      2+n   MIME type (u16 length n, then n bytes)
//! var     2+m   Original name (u16 length m, then m bytes)
//! 4+H     rest  gzip stream, extends to end of input
//! ```
//!
//! There is no version field, no payload length and no checksum beyond what
//! gzip carries itself.
//!
//! ## Usage
//!
//! ```rust
//! use upload_container::{read_container, write_container, FileHeader, ReadMode};
//! use std::io::Read;
//!
//! let header = FileHeader::new(chrono::Utc::now(), 1, "text/plain", "notes.txt");
//!
//! let mut stored = Vec::new();
//! write_container(Some(&mut stored), &header, Some(&b"some notes"[..])).unwrap();
//!
//! let mut handle = read_container(Some(stored.as_slice())).unwrap();
//! assert_eq!(handle.header().original_name, "notes.txt");
//!
//! handle.set_mode(ReadMode::Decompressed).unwrap();
//! let mut payload = Vec::new();
//! handle.read_to_end(&mut payload).unwrap();
//! assert_eq!(payload, b"some notes");
//! ```
//!
//! Opening a container only parses the header. The payload is decompressed
//! once the handle is switched to [`ReadMode::Decompressed`]; until then reads
//! return the stored gzip bytes untouched, which is what a server wants when
//! the client accepts `Content-Encoding: gzip`.

pub mod codec;
pub mod config;
pub mod error;
pub mod format;
pub mod naming;
pub mod reader;
pub mod writer;

// Re-export main types
pub use config::Config;
pub use error::{ContainerError, Result};
pub use format::{decode_header, encode_header, FileHeader, MAGIC};
pub use naming::{generate_random_name, NameGenerator};
pub use reader::{read_container, read_header, FileHandle, ReadMode};
pub use writer::{write_container, ContainerWriter};
