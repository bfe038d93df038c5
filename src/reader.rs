// SPDX-License-Identifier: MIT
//! Container reader and the lazily decompressing file handle

use crate::codec::read_full;
use crate::error::{ContainerError, Result};
use crate::format::{validate_magic, FileHeader, MAGIC};
use flate2::bufread::GzDecoder;
use std::fmt;
use std::io::{self, BufRead, BufReader, Read, Write};
use tracing::{debug, warn};

/// Leading bytes of every gzip member: ID1, ID2 and the deflate method
const GZIP_LEAD: [u8; 3] = [0x1f, 0x8b, 0x08];

/// Which bytes a [`FileHandle`] yields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadMode {
    /// The compressed payload exactly as stored
    Raw,
    /// The original upload, decompressed on the fly
    Decompressed,
}

/// Read target of a handle.
///
/// The decompressor pulls from the same `BufReader` raw reads use and only
/// consumes what it has inflated, so raw reads after a switch back continue
/// at the first unprocessed payload byte.
enum Stage<R: Read> {
    /// No decompressor built yet
    Raw(BufReader<R>),
    /// Reads go through the decompressor
    Decompressed(GzDecoder<BufReader<R>>),
    /// Decompressor kept for a later switch, reads bypass it
    RawRetained(GzDecoder<BufReader<R>>),
    /// A decompressor start consumed payload bytes and failed; the raw
    /// position is unknown
    Failed,
    /// Left behind only if a transition unwinds
    Vacant,
}

/// An opened container positioned at the start of its payload
pub struct FileHandle<R: Read> {
    header: FileHeader,
    stage: Stage<R>,
}

impl<R: Read> FileHandle<R> {
    /// Parse the magic marker and header, taking ownership of `source`.
    ///
    /// No decompression happens here; the handle starts in [`ReadMode::Raw`].
    pub fn open(mut source: R) -> Result<Self> {
        let (header, consumed) = read_header(&mut source)?;
        debug!(
            header_len = consumed,
            mime_type = %header.mime_type,
            original_name = %header.original_name,
            "Container header parsed"
        );
        Ok(Self {
            header,
            stage: Stage::Raw(BufReader::new(source)),
        })
    }

    /// The parsed header
    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    /// Current read mode
    pub fn mode(&self) -> ReadMode {
        match self.stage {
            Stage::Decompressed(_) => ReadMode::Decompressed,
            _ => ReadMode::Raw,
        }
    }

    /// Whether a decompressor has been constructed
    pub fn has_decompressor(&self) -> bool {
        matches!(self.stage, Stage::Decompressed(_) | Stage::RawRetained(_))
    }

    /// Switch the read mode.
    ///
    /// The first switch to [`ReadMode::Decompressed`] builds the decompressor and
    /// fails with [`ContainerError::DecompressionInit`] if the payload does not
    /// start with a valid gzip header. A payload rejected by its leading bytes
    /// is left untouched and the handle stays in raw mode at the same position.
    /// A header that fails after parsing has consumed bytes leaves the handle
    /// unusable: every later read or switch returns an error. Later switches
    /// reuse the same decompressor, so reads continue where they left off.
    pub fn set_mode(&mut self, mode: ReadMode) -> Result<()> {
        let (stage, outcome) = match (std::mem::replace(&mut self.stage, Stage::Vacant), mode) {
            (Stage::Raw(source), ReadMode::Decompressed) => match open_decoder(source) {
                Ok(decoder) => {
                    debug!("Decompressor initialized");
                    (Stage::Decompressed(decoder), Ok(()))
                }
                Err((Some(source), e)) => {
                    (Stage::Raw(source), Err(ContainerError::DecompressionInit(e)))
                }
                Err((None, e)) => {
                    warn!(error = %e, "Decompressor failed after consuming payload bytes");
                    (Stage::Failed, Err(ContainerError::DecompressionInit(e)))
                }
            },
            (Stage::RawRetained(decoder), ReadMode::Decompressed) => {
                (Stage::Decompressed(decoder), Ok(()))
            }
            (Stage::Decompressed(decoder), ReadMode::Raw) => (Stage::RawRetained(decoder), Ok(())),
            (Stage::Failed, _) => (Stage::Failed, Err(failed_error().into())),
            (Stage::Vacant, _) => (Stage::Vacant, Err(vacant_error().into())),
            (unchanged, _) => (unchanged, Ok(())),
        };
        self.stage = stage;
        outcome
    }

    /// Copy every remaining byte in the current mode to `destination`, then close
    pub fn write_to<W: Write>(mut self, destination: &mut W) -> Result<u64> {
        let copied = io::copy(&mut self, destination)?;
        self.close();
        Ok(copied)
    }

    /// Release the decompressor, then the raw source
    pub fn close(self) {
        let mode = self.mode();
        match self.stage {
            Stage::Decompressed(decoder) | Stage::RawRetained(decoder) => drop(decoder.into_inner()),
            Stage::Raw(source) => drop(source),
            Stage::Failed | Stage::Vacant => {}
        }
        debug!(?mode, "File handle closed");
    }
}

impl<R: Read> Read for FileHandle<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match &mut self.stage {
            Stage::Raw(source) => source.read(buf),
            Stage::Decompressed(decoder) => decoder.read(buf),
            Stage::RawRetained(decoder) => decoder.get_mut().read(buf),
            Stage::Failed => Err(failed_error()),
            Stage::Vacant => Err(vacant_error()),
        }
    }
}

impl<R: Read> fmt::Debug for FileHandle<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileHandle")
            .field("header", &self.header)
            .field("mode", &self.mode())
            .field("has_decompressor", &self.has_decompressor())
            .finish()
    }
}

/// Open a container from `source`.
///
/// Fails with [`ContainerError::InvalidArgument`] when no source is given.
pub fn read_container<R: Read>(source: Option<R>) -> Result<FileHandle<R>> {
    let source = source.ok_or(ContainerError::InvalidArgument("a source is required"))?;
    FileHandle::open(source)
}

/// Read only the magic marker and header.
///
/// Returns the header and the number of bytes consumed; `source` is left
/// positioned at the first payload byte.
pub fn read_header<R: Read>(source: &mut R) -> Result<(FileHeader, usize)> {
    let mut magic = [0u8; 2];
    read_full(source, &mut magic, "magic")?;
    validate_magic(magic)?;

    let (header, framed_len) = FileHeader::read_framed(source)?;
    Ok((header, MAGIC.len() + framed_len))
}

/// Build a gzip decoder, surfacing a bad stream header immediately.
///
/// The leading bytes are checked without consuming them, so a payload that is
/// plainly not gzip hands the source back intact. If the decoder itself fails
/// it has already consumed part of the header and no source is returned.
fn open_decoder<R: Read>(
    mut source: BufReader<R>,
) -> std::result::Result<GzDecoder<BufReader<R>>, (Option<BufReader<R>>, io::Error)> {
    let rejection = match source.fill_buf() {
        Ok([]) => Some(io::Error::new(io::ErrorKind::UnexpectedEof, "empty payload")),
        Ok(lead) => {
            let visible = lead.len().min(GZIP_LEAD.len());
            (lead[..visible] != GZIP_LEAD[..visible])
                .then(|| io::Error::new(io::ErrorKind::InvalidData, "invalid gzip header"))
        }
        Err(e) => Some(e),
    };
    if let Some(err) = rejection {
        return Err((Some(source), err));
    }

    let mut decoder = GzDecoder::new(source);
    if decoder.header().is_none() {
        // A zero-length read drives header parsing and yields any stored error
        let probe = decoder.read(&mut []);
        if decoder.header().is_none() {
            let err = probe.err().unwrap_or_else(|| {
                io::Error::new(io::ErrorKind::InvalidData, "missing gzip header")
            });
            return Err((None, err));
        }
    }
    Ok(decoder)
}

fn failed_error() -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidData,
        "payload position lost after a failed decompressor start",
    )
}

fn vacant_error() -> io::Error {
    io::Error::new(io::ErrorKind::Other, "file handle lost its source")
}
