// SPDX-License-Identifier: MIT
//! Container writer for framing and compressing uploads

use crate::codec::write_uint;
use crate::config::Config;
use crate::error::{ContainerError, Result};
use crate::format::{FileHeader, HEADER_LENGTH_BYTES, MAGIC, MAX_HEADER_SIZE};
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::{self, Read, Write};
use tracing::{debug, warn};

/// Streams a source through gzip behind the magic marker and header
#[derive(Debug, Clone, Copy)]
pub struct ContainerWriter {
    compression: Compression,
}

impl ContainerWriter {
    /// Create a writer with the default gzip level
    pub fn new() -> Self {
        Self {
            compression: Compression::default(),
        }
    }

    /// Create a writer with an explicit gzip level (0-9)
    pub fn with_level(level: u32) -> Self {
        Self {
            compression: Compression::new(level),
        }
    }

    /// Create a writer from loaded configuration
    pub fn from_config(config: &Config) -> Self {
        Self::with_level(config.compression_level)
    }

    /// Compression level in use
    pub fn level(&self) -> u32 {
        self.compression.level()
    }

    /// Write a complete container to `destination`.
    ///
    /// Returns the number of bytes written to `destination`: marker, header
    /// length, header and the compressed payload as emitted. A failure part way
    /// through leaves `destination` holding a truncated container.
    pub fn write<W: Write, R: Read>(
        &self,
        destination: &mut W,
        header: &FileHeader,
        source: &mut R,
    ) -> Result<u64> {
        destination.write_all(&MAGIC)?;
        let mut written = MAGIC.len() as u64;

        let header_bytes = header.encode()?;
        if header_bytes.len() > MAX_HEADER_SIZE {
            // The length field wraps; readers will not find the payload boundary
            warn!(
                header_len = header_bytes.len(),
                "Header exceeds the 16-bit length field, container will be unreadable"
            );
        }
        write_uint(destination, header_bytes.len() as u64, HEADER_LENGTH_BYTES)?;
        destination.write_all(&header_bytes)?;
        written += (HEADER_LENGTH_BYTES + header_bytes.len()) as u64;

        let payload = self.compress_stream(destination, source)?;
        written += payload;

        debug!(
            header_len = header_bytes.len(),
            compressed_len = payload,
            total = written,
            "Container written"
        );
        Ok(written)
    }

    /// Copy `source` through a gzip encoder wrapping `destination`.
    ///
    /// On a failed copy the encoder is dropped, which finishes the stream on a
    /// best-effort basis before the error is returned.
    fn compress_stream<W: Write, R: Read>(&self, destination: &mut W, source: &mut R) -> Result<u64> {
        let mut encoder = GzEncoder::new(CountingWriter::new(destination), self.compression);

        let copied = match io::copy(source, &mut encoder) {
            Ok(n) => n,
            Err(e) => {
                warn!("Payload copy failed, container left truncated: {}", e);
                return Err(ContainerError::Io(e));
            }
        };

        encoder.flush()?;
        let counter = encoder.finish()?;
        debug!(
            uncompressed_len = copied,
            compressed_len = counter.written,
            "Payload compressed"
        );
        Ok(counter.written)
    }
}

impl Default for ContainerWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// Write a container using the default compression level.
///
/// Fails with [`ContainerError::InvalidArgument`] before touching either stream
/// when `destination` or `source` is absent.
pub fn write_container<W: Write, R: Read>(
    destination: Option<W>,
    header: &FileHeader,
    source: Option<R>,
) -> Result<u64> {
    let (mut destination, mut source) = match (destination, source) {
        (Some(destination), Some(source)) => (destination, source),
        _ => {
            return Err(ContainerError::InvalidArgument(
                "a destination and a source are required",
            ))
        }
    };
    ContainerWriter::new().write(&mut destination, header, &mut source)
}

/// Counts the bytes the compressor actually hands to the destination
struct CountingWriter<W> {
    inner: W,
    written: u64,
}

impl<W> CountingWriter<W> {
    fn new(inner: W) -> Self {
        Self { inner, written: 0 }
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    fn header() -> FileHeader {
        FileHeader::new(
            DateTime::from_timestamp(1481834107, 0).unwrap(),
            1,
            "image/png",
            "Screenshot at todo",
        )
    }

    /// Accepts `limit` bytes and then fails every write
    struct FailingWriter {
        data: Vec<u8>,
        limit: usize,
    }

    impl Write for FailingWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.data.len() >= self.limit {
                return Err(io::Error::new(io::ErrorKind::Other, "disk full"));
            }
            let n = buf.len().min(self.limit - self.data.len());
            self.data.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Yields some bytes and then an error
    struct FailingReader {
        remaining: usize,
    }

    impl Read for FailingReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.remaining == 0 {
                return Err(io::Error::new(io::ErrorKind::ConnectionReset, "upload aborted"));
            }
            let n = buf.len().min(self.remaining);
            buf[..n].fill(b'z');
            self.remaining -= n;
            Ok(n)
        }
    }

    #[test]
    fn test_writer_new() {
        let writer = ContainerWriter::new();
        assert_eq!(writer.level(), Compression::default().level());
        assert_eq!(ContainerWriter::with_level(9).level(), 9);
    }

    #[test]
    fn test_write_framing() {
        let mut out = Vec::new();
        let written = ContainerWriter::new()
            .write(&mut out, &header(), &mut &b"payload"[..])
            .unwrap();

        assert_eq!(written as usize, out.len());
        assert_eq!(&out[..2], &MAGIC);
        let header_len = u16::from_be_bytes([out[2], out[3]]) as usize;
        assert_eq!(header_len, header().encoded_len());
        // gzip member starts right after the header
        assert_eq!(&out[4 + header_len..4 + header_len + 2], &[0x1f, 0x8b]);
    }

    #[test]
    fn test_written_counts_compressed_bytes() {
        let payload = vec![b'A'; 256 * 1024];
        let mut out = Vec::new();
        let written = ContainerWriter::new()
            .write(&mut out, &header(), &mut payload.as_slice())
            .unwrap();

        assert_eq!(written as usize, out.len());
        assert!(written < payload.len() as u64);
    }

    #[test]
    fn test_empty_payload() {
        let mut out = Vec::new();
        let written = ContainerWriter::new()
            .write(&mut out, &header(), &mut io::empty())
            .unwrap();
        assert_eq!(written as usize, out.len());
        assert!(out.len() > 4 + header().encoded_len());
    }

    #[test]
    fn test_write_container_requires_streams() {
        let err = write_container::<Vec<u8>, &[u8]>(None, &header(), None).unwrap_err();
        assert!(matches!(err, ContainerError::InvalidArgument(_)));

        let mut out = Vec::new();
        let err = write_container::<_, &[u8]>(Some(&mut out), &header(), None).unwrap_err();
        assert!(matches!(err, ContainerError::InvalidArgument(_)));
        assert!(out.is_empty());

        let err = write_container::<&mut Vec<u8>, _>(None, &header(), Some(&b"data"[..]))
            .unwrap_err();
        assert!(matches!(err, ContainerError::InvalidArgument(_)));
    }

    #[test]
    fn test_destination_failure_propagates() {
        let mut out = FailingWriter {
            data: Vec::new(),
            limit: 10,
        };
        let err = ContainerWriter::new()
            .write(&mut out, &header(), &mut &b"payload"[..])
            .unwrap_err();
        assert!(matches!(err, ContainerError::Io(_)));
        assert_eq!(&out.data[..2], &MAGIC);
    }

    #[test]
    fn test_source_failure_leaves_partial_container() {
        let mut out = Vec::new();
        let err = ContainerWriter::new()
            .write(&mut out, &header(), &mut FailingReader { remaining: 4096 })
            .unwrap_err();

        match err {
            ContainerError::Io(e) => assert_eq!(e.kind(), io::ErrorKind::ConnectionReset),
            other => panic!("unexpected error: {other}"),
        }
        let prefix = 4 + header().encoded_len();
        assert!(out.len() > prefix);
        assert_eq!(&out[..2], &MAGIC);
    }
}
