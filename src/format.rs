// SPDX-License-Identifier: MIT
//! Upload container wire format
//!
//! Defines the magic marker, the metadata header and its binary encoding.

use crate::codec::{
    read_full, read_length_prefixed_string, read_uint_for, write_length_prefixed_string, write_uint,
    STRING_LENGTH_BYTES,
};
use crate::error::{ContainerError, Result};
use byteorder::ReadBytesExt;
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::io::Read;

/// Container magic bytes
pub const MAGIC: [u8; 2] = [0xFA, 0xFA];

/// Width of the header length field that follows the magic
pub const HEADER_LENGTH_BYTES: usize = 2;

/// Bytes before the encoded header starts (magic + header length)
pub const PREAMBLE_SIZE: usize = MAGIC.len() + HEADER_LENGTH_BYTES;

/// Width of the upload timestamp in whole Unix seconds
pub const TIMESTAMP_BYTES: usize = 5;

/// Largest header the u16 length field can describe
pub const MAX_HEADER_SIZE: usize = u16::MAX as usize;

/// Metadata stored in front of every upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileHeader {
    /// When the upload was received; sub-second precision is lost on the wire
    pub upload_date: DateTime<Utc>,

    /// Index into the owning application's API key table
    pub api_key_id: u8,

    /// Caller-supplied MIME type, not validated
    pub mime_type: String,

    /// Caller-supplied original file name, not validated
    pub original_name: String,
}

impl FileHeader {
    pub fn new(
        upload_date: DateTime<Utc>,
        api_key_id: u8,
        mime_type: impl Into<String>,
        original_name: impl Into<String>,
    ) -> Self {
        Self {
            upload_date,
            api_key_id,
            mime_type: mime_type.into(),
            original_name: original_name.into(),
        }
    }

    /// Encoded size in bytes
    pub fn encoded_len(&self) -> usize {
        TIMESTAMP_BYTES
            + 1
            + 2 * STRING_LENGTH_BYTES
            + self.mime_type.len()
            + self.original_name.len()
    }

    /// Serialize the header: timestamp, key id, mime type, original name
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut buffer = Vec::with_capacity(self.encoded_len());
        self.write_to_buffer(&mut buffer)?;
        Ok(buffer)
    }

    /// Append the encoded header to `buffer`
    pub fn write_to_buffer(&self, buffer: &mut Vec<u8>) -> Result<()> {
        // Pre-epoch dates wrap; the field is unsigned
        write_uint(buffer, self.upload_date.timestamp() as u64, TIMESTAMP_BYTES)?;
        buffer.push(self.api_key_id);
        write_length_prefixed_string(buffer, &self.mime_type)?;
        write_length_prefixed_string(buffer, &self.original_name)?;
        Ok(())
    }

    /// Parse a header from its encoded bytes.
    ///
    /// Trailing bytes past the last field are ignored.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut cursor = bytes;

        let seconds = read_uint_for("upload_date", &mut cursor, TIMESTAMP_BYTES)
            .map_err(|e| e.into_truncated("upload_date"))?;
        // Any 40-bit seconds value is within chrono's range
        let upload_date = DateTime::UNIX_EPOCH + TimeDelta::seconds(seconds as i64);

        let api_key_id = cursor
            .read_u8()
            .map_err(|_| ContainerError::TruncatedHeader {
                field: "api_key_id",
                needed: 1,
                remaining: 0,
            })?;

        let (mime_type, _) = read_length_prefixed_string(&mut cursor)
            .map_err(|e| e.into_truncated("mime_type"))?;
        let (original_name, _) = read_length_prefixed_string(&mut cursor)
            .map_err(|e| e.into_truncated("original_name"))?;

        Ok(Self {
            upload_date,
            api_key_id,
            mime_type,
            original_name,
        })
    }

    /// Read a length-framed header (length field + header bytes) from a stream
    pub(crate) fn read_framed<R: Read>(reader: &mut R) -> Result<(Self, usize)> {
        let length = read_uint_for("header length", reader, HEADER_LENGTH_BYTES)? as usize;
        let mut bytes = vec![0u8; length];
        read_full(reader, &mut bytes, "header")?;
        let header = Self::decode(&bytes)?;
        Ok((header, HEADER_LENGTH_BYTES + length))
    }
}

/// Check the leading marker bytes
#[inline]
pub fn validate_magic(bytes: [u8; 2]) -> Result<()> {
    if bytes != MAGIC {
        return Err(ContainerError::BadMagic(bytes));
    }
    Ok(())
}

/// Encode a header (free-function form)
pub fn encode_header(header: &FileHeader) -> Result<Vec<u8>> {
    header.encode()
}

/// Decode a header (free-function form)
pub fn decode_header(bytes: &[u8]) -> Result<FileHeader> {
    FileHeader::decode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_header() -> FileHeader {
        FileHeader::new(
            DateTime::from_timestamp(1481834107, 0).unwrap(),
            1,
            "image/png",
            "Screenshot at todo",
        )
    }

    #[test]
    fn test_encode_layout() {
        let bytes = sample_header().encode().unwrap();

        assert_eq!(&bytes[0..5], &[0x00, 0x58, 0x52, 0xfe, 0x7b]);
        assert_eq!(bytes[5], 1);
        assert_eq!(&bytes[6..8], &[0x00, 0x09]);
        assert_eq!(&bytes[8..17], b"image/png");
        assert_eq!(&bytes[17..19], &[0x00, 18]);
        assert_eq!(&bytes[19..], b"Screenshot at todo");
        assert_eq!(bytes.len(), sample_header().encoded_len());
    }

    #[test]
    fn test_decode_roundtrip() {
        let header = sample_header();
        let decoded = decode_header(&encode_header(&header).unwrap()).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn test_subsecond_precision_dropped() {
        let precise = DateTime::from_timestamp(1481834107, 999_000_000).unwrap();
        let header = FileHeader::new(precise, 7, "text/plain", "a.txt");

        let decoded = FileHeader::decode(&header.encode().unwrap()).unwrap();
        assert_eq!(decoded.upload_date.timestamp(), 1481834107);
        assert_eq!(decoded.upload_date.timestamp_subsec_nanos(), 0);
        assert_ne!(decoded, header);
    }

    #[test]
    fn test_decode_truncated_timestamp() {
        let err = FileHeader::decode(&[0x00, 0x58]).unwrap_err();
        assert!(matches!(
            err,
            ContainerError::TruncatedHeader {
                field: "upload_date",
                needed: 5,
                remaining: 2,
            }
        ));
    }

    #[test]
    fn test_decode_missing_key_id() {
        let err = FileHeader::decode(&[0, 0, 0, 0, 1]).unwrap_err();
        assert!(matches!(
            err,
            ContainerError::TruncatedHeader {
                field: "api_key_id",
                ..
            }
        ));
    }

    #[test]
    fn test_decode_truncated_mime_type() {
        let mut bytes = sample_header().encode().unwrap();
        bytes.truncate(12);
        let err = FileHeader::decode(&bytes).unwrap_err();
        assert!(matches!(
            err,
            ContainerError::TruncatedHeader {
                field: "mime_type",
                needed: 9,
                remaining: 4,
            }
        ));
    }

    #[test]
    fn test_decode_missing_name() {
        let mut bytes = sample_header().encode().unwrap();
        bytes.truncate(17);
        let err = FileHeader::decode(&bytes).unwrap_err();
        assert!(matches!(
            err,
            ContainerError::TruncatedHeader {
                field: "original_name",
                needed: 2,
                remaining: 0,
            }
        ));
    }

    #[test]
    fn test_max_length_strings_roundtrip() {
        let header = FileHeader::new(
            DateTime::from_timestamp(0, 0).unwrap(),
            255,
            "m".repeat(65535),
            "n".repeat(65535),
        );
        let decoded = FileHeader::decode(&header.encode().unwrap()).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn test_oversized_mime_type_wraps_prefix() {
        // 65536 bytes encode with a zero prefix, so the body bleeds into the next field
        let header = FileHeader::new(
            DateTime::from_timestamp(0, 0).unwrap(),
            0,
            "a".repeat(65536),
            "",
        );
        let bytes = header.encode().unwrap();
        assert_eq!(&bytes[6..8], &[0, 0]);
        assert_eq!(bytes.len(), header.encoded_len());

        let decoded = FileHeader::decode(&bytes).unwrap();
        assert_eq!(decoded.mime_type, "");
        assert_eq!(decoded.original_name, "a".repeat(0x6161));
    }

    #[test]
    fn test_timestamp_upper_bound() {
        let max_seconds = (1u64 << 40) - 1;
        let header = FileHeader::new(
            DateTime::from_timestamp(max_seconds as i64, 0).unwrap(),
            0,
            "",
            "",
        );
        let decoded = FileHeader::decode(&header.encode().unwrap()).unwrap();
        assert_eq!(decoded.upload_date.timestamp() as u64, max_seconds);
    }

    #[test]
    fn test_pre_epoch_date_wraps() {
        let header = FileHeader::new(DateTime::from_timestamp(-1, 0).unwrap(), 0, "", "");
        let bytes = header.encode().unwrap();
        assert_eq!(&bytes[0..5], &[0xff; 5]);

        let decoded = FileHeader::decode(&bytes).unwrap();
        assert_eq!(decoded.upload_date.timestamp(), (1i64 << 40) - 1);
        assert_ne!(decoded, header);
    }

    #[test]
    fn test_validate_magic() {
        assert!(validate_magic([0xFA, 0xFA]).is_ok());
        assert!(matches!(
            validate_magic([0xAB, 0xAB]),
            Err(ContainerError::BadMagic([0xAB, 0xAB]))
        ));
        assert!(validate_magic([0xFA, 0x00]).is_err());
    }
}
