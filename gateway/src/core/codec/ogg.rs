//! Ogg page demuxer.
//!
//! Page header layout (RFC 3533):
//!
//! | offset | size | field |
//! |---|---|---|
//! | 0 | 4 | capture pattern `OggS` (big-endian `0x4F676753`) |
//! | 4 | 1 | stream structure version, always 0 |
//! | 5 | 1 | header type flags |
//! | 6 | 8 | granule position (LE) |
//! | 14 | 4 | stream serial number (LE) |
//! | 18 | 4 | page sequence number (LE) |
//! | 22 | 4 | CRC checksum (LE) |
//! | 26 | 1 | segment count N |
//! | 27 | N | segment sizes |
//!
//! The checksum is read and kept on the page but never verified against the
//! page content.

use bytes::{BufMut, Bytes, BytesMut};

use super::{CodecError, CodecResult};

/// Ogg capture pattern, `OggS`.
pub const OGG_MAGIC: u32 = 0x4F67_6753;

/// Fixed part of the page header, before the segment table.
pub const PAGE_HEADER_LEN: usize = 27;

const FLAG_CONTINUED: u8 = 0x01;
const FLAG_FIRST: u8 = 0x02;
const FLAG_LAST: u8 = 0x04;

/// Header type flags of a page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageFlags {
    pub continued_packet: bool,
    pub first_page: bool,
    pub last_page: bool,
}

impl PageFlags {
    fn from_byte(byte: u8) -> Self {
        Self {
            continued_packet: byte & FLAG_CONTINUED != 0,
            first_page: byte & FLAG_FIRST != 0,
            last_page: byte & FLAG_LAST != 0,
        }
    }

    fn to_byte(self) -> u8 {
        let mut byte = 0;
        if self.continued_packet {
            byte |= FLAG_CONTINUED;
        }
        if self.first_page {
            byte |= FLAG_FIRST;
        }
        if self.last_page {
            byte |= FLAG_LAST;
        }
        byte
    }
}

/// One demultiplexed Ogg page.
///
/// Segments are zero-copy slices of the chunk the page was parsed from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OggPage {
    pub flags: PageFlags,
    pub granule_position: u64,
    pub serial_number: u32,
    pub sequence_number: u32,
    pub checksum: u32,
    pub segments: Vec<Bytes>,
}

impl OggPage {
    /// Page with default flags, zero granule/serial/checksum.
    pub fn new(sequence_number: u32, segments: Vec<Bytes>) -> Self {
        Self {
            flags: PageFlags::default(),
            granule_position: 0,
            serial_number: 0,
            sequence_number,
            checksum: 0,
            segments,
        }
    }

    /// Concatenation of all segments.
    pub fn payload(&self) -> Bytes {
        match self.segments.as_slice() {
            [single] => single.clone(),
            segments => {
                let mut out = BytesMut::with_capacity(segments.iter().map(Bytes::len).sum());
                for segment in segments {
                    out.extend_from_slice(segment);
                }
                out.freeze()
            }
        }
    }

    /// Serialize the page back to its wire layout.
    ///
    /// The stored checksum is written as-is.
    pub fn to_bytes(&self) -> CodecResult<Bytes> {
        if self.segments.len() > u8::MAX as usize {
            return Err(CodecError::Format(format!(
                "Too many segments for one page: {}",
                self.segments.len()
            )));
        }

        let body_len: usize = self.segments.iter().map(Bytes::len).sum();
        let mut out = BytesMut::with_capacity(PAGE_HEADER_LEN + self.segments.len() + body_len);
        out.put_u32(OGG_MAGIC);
        out.put_u8(0);
        out.put_u8(self.flags.to_byte());
        out.put_u64_le(self.granule_position);
        out.put_u32_le(self.serial_number);
        out.put_u32_le(self.sequence_number);
        out.put_u32_le(self.checksum);
        out.put_u8(self.segments.len() as u8);
        for segment in &self.segments {
            let size = u8::try_from(segment.len()).map_err(|_| {
                CodecError::Format(format!("Segment too large: {} bytes", segment.len()))
            })?;
            out.put_u8(size);
        }
        for segment in &self.segments {
            out.extend_from_slice(segment);
        }
        Ok(out.freeze())
    }
}

/// Split a chunk into the pages it contains, in order.
///
/// The chunk must hold whole pages; a page cut short by the end of the chunk
/// is a format error.
pub fn parse_pages(chunk: &Bytes) -> CodecResult<Vec<OggPage>> {
    let mut pages = Vec::new();
    let mut position = 0;

    while position < chunk.len() {
        let header = chunk.get(position..position + PAGE_HEADER_LEN).ok_or_else(|| {
            CodecError::Format(format!(
                "Truncated page header at offset {position}: {} bytes left",
                chunk.len() - position
            ))
        })?;

        let magic = u32::from_be_bytes([header[0], header[1], header[2], header[3]]);
        if magic != OGG_MAGIC {
            return Err(CodecError::Format(format!(
                "Not an Ogg page at offset {position}: magic {magic:#010x}"
            )));
        }
        if header[4] != 0 {
            return Err(CodecError::Format(format!(
                "Unsupported Ogg stream structure version {}",
                header[4]
            )));
        }

        let flags = PageFlags::from_byte(header[5]);
        let granule_position = u64::from_le_bytes(le_array(&header[6..14]));
        let serial_number = u32::from_le_bytes(le_array(&header[14..18]));
        let sequence_number = u32::from_le_bytes(le_array(&header[18..22]));
        let checksum = u32::from_le_bytes(le_array(&header[22..26]));
        let segment_count = header[26] as usize;

        position += PAGE_HEADER_LEN;
        let sizes = chunk
            .get(position..position + segment_count)
            .ok_or_else(|| CodecError::Format("Truncated segment table".to_string()))?;
        position += segment_count;

        let mut segments = Vec::with_capacity(segment_count);
        for &size in sizes {
            let end = position + size as usize;
            if end > chunk.len() {
                return Err(CodecError::Format(format!(
                    "Truncated segment in page {sequence_number}: need {size} bytes, {} left",
                    chunk.len() - position
                )));
            }
            segments.push(chunk.slice(position..end));
            position = end;
        }

        pages.push(OggPage {
            flags,
            granule_position,
            serial_number,
            sequence_number,
            checksum,
            segments,
        });
    }

    Ok(pages)
}

fn le_array<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(bytes);
    out
}
