//! `.uze` game image header.
//!
//! ```text
//! [0..6)    "UZEBOX" marker
//! [12..14)  release year, u16 little endian
//! [14..45)  game name, NUL padded
//! [46..77)  author, NUL padded
//! ```
//!
//! Only the marker gates the transfer; the remaining fields are for display.

use std::io::{Read, Seek, SeekFrom};
use std::ops::Range;

use crate::TransferError;

/// Marker at the start of every valid `.uze` image.
pub const UZE_MARKER: &[u8; 6] = b"UZEBOX";

/// Bytes of the image covered by [`UzeHeader`].
const HEADER_LEN: usize = 77;

const YEAR: Range<usize> = 12..14;
const NAME: Range<usize> = 14..45;
const AUTHOR: Range<usize> = 46..77;

/// Parsed `.uze` header fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UzeHeader {
    /// First six bytes of the image, whatever they are.
    pub marker: Vec<u8>,
    pub year: u16,
    pub name: String,
    pub author: String,
}

impl UzeHeader {
    /// Parses the header from the first bytes of an image.
    ///
    /// Truncated input is not an error: fields past the end come back empty.
    pub fn parse(buf: &[u8]) -> Self {
        let marker = buf[..buf.len().min(UZE_MARKER.len())].to_vec();
        let year = match buf.get(YEAR) {
            Some(&[lo, hi]) => u16::from_le_bytes([lo, hi]),
            _ => 0,
        };
        Self {
            marker,
            year,
            name: text_field(buf, NAME),
            author: text_field(buf, AUTHOR),
        }
    }

    /// Reads the header from the start of `file` and rewinds it to offset 0.
    pub fn read_from<F: Read + Seek>(file: &mut F) -> Result<Self, TransferError> {
        file.seek(SeekFrom::Start(0))?;
        let mut buf = Vec::with_capacity(HEADER_LEN);
        file.by_ref().take(HEADER_LEN as u64).read_to_end(&mut buf)?;
        file.seek(SeekFrom::Start(0))?;
        Ok(Self::parse(&buf))
    }

    /// Returns `true` if the image starts with [`UZE_MARKER`].
    pub fn has_valid_marker(&self) -> bool {
        self.marker == UZE_MARKER
    }

    /// Name to show the user, falling back when the field is blank.
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            "(untitled)"
        } else {
            &self.name
        }
    }
}

fn text_field(buf: &[u8], range: Range<usize>) -> String {
    let end = range.end.min(buf.len());
    if range.start >= end {
        return String::new();
    }
    let raw = &buf[range.start..end];
    let raw = match raw.iter().position(|&b| b == 0) {
        Some(nul) => &raw[..nul],
        None => raw,
    };
    String::from_utf8_lossy(raw).trim().to_string()
}
