//! Ogg page header and lacing table.
//!
//! Layout of the fixed header (27 bytes, multi-byte fields little-endian):
//! ```text
//! [0..4]   capture pattern  b"OggS"
//! [4]      version          u8
//! [5]      flags            u8   (0x01 continued, 0x02 first, 0x04 last)
//! [6..14]  granule position u64 le
//! [14..18] stream serial    u32 le
//! [18..22] page sequence    u32 le
//! [22..26] checksum         u32 le
//! [26]     segment count    u8
//! ```
//! followed by `segment count` lacing bytes and then the page payload.

use platform::storage::File;

use crate::error::{DemuxError, OggError};
use crate::io::read_exact;

/// Size of the fixed part of a page header.
pub const HEADER_SIZE: usize = 27;
/// Page capture pattern.
pub const CAPTURE_PATTERN: &[u8; 4] = b"OggS";
/// Maximum number of lacing entries on one page.
pub const MAX_SEGMENTS: usize = 255;
/// Lacing value meaning "the packet continues in the next segment".
pub const LACING_CONTINUE: u8 = 255;
/// Largest possible page payload (255 segments of 255 bytes).
pub const MAX_PAGE_DATA: usize = 65_025;

// ---------------------------------------------------------------------------
// PageFlags
// ---------------------------------------------------------------------------

/// Header type flags of a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PageFlags(u8);

impl PageFlags {
    /// First packet on the page continues one from the previous page.
    pub const CONTINUED: u8 = 0x01;
    /// First page of the logical stream.
    pub const FIRST: u8 = 0x02;
    /// Last page of the logical stream.
    pub const LAST: u8 = 0x04;

    /// Wrap a raw flags byte.
    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    /// Raw flags byte.
    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// The page starts with the tail of a packet begun on an earlier page.
    #[must_use]
    pub const fn is_continuation(self) -> bool {
        self.0 & Self::CONTINUED != 0
    }

    /// Beginning of stream.
    #[must_use]
    pub const fn is_first(self) -> bool {
        self.0 & Self::FIRST != 0
    }

    /// End of stream.
    #[must_use]
    pub const fn is_last(self) -> bool {
        self.0 & Self::LAST != 0
    }
}

// ---------------------------------------------------------------------------
// PageHeader
// ---------------------------------------------------------------------------

/// A parsed page header together with its lacing table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageHeader {
    /// Stream structure version (always 0).
    pub version: u8,
    /// Header type flags.
    pub flags: PageFlags,
    /// Codec-defined position of the last completed packet (48 kHz samples for Opus).
    pub granule_position: u64,
    /// Logical stream serial number.
    pub serial: u32,
    /// Page sequence number.
    pub sequence: u32,
    /// CRC32 as stored; not verified.
    pub checksum: u32,
    declared_segments: u8,
    segments: heapless::Vec<u8, MAX_SEGMENTS>,
}

impl PageHeader {
    /// Decode the fixed 27-byte part of a page header.
    ///
    /// The returned header has an empty lacing table; call
    /// [`set_segment_table`](Self::set_segment_table) with the
    /// [`declared_segments`](Self::declared_segments) bytes that follow.
    ///
    /// # Errors
    ///
    /// Returns [`OggError::BadMagic`] if bytes `[0..4]` are not `b"OggS"`.
    /// Returns [`OggError::NoSegments`] if the segment count is zero.
    ///
    /// # Safety (lint allow)
    /// All range indices are compile-time constants within `[0, HEADER_SIZE)`.
    #[allow(clippy::indexing_slicing)]
    pub fn decode(buf: &[u8; HEADER_SIZE]) -> Result<Self, OggError> {
        if &buf[0..4] != CAPTURE_PATTERN {
            return Err(OggError::BadMagic);
        }
        let declared_segments = buf[26];
        if declared_segments == 0 {
            return Err(OggError::NoSegments);
        }
        Ok(Self {
            version: buf[4],
            flags: PageFlags::from_bits(buf[5]),
            granule_position: u64::from_le_bytes(
                buf[6..14].try_into().map_err(|_| OggError::Eof)?,
            ),
            serial: u32::from_le_bytes(buf[14..18].try_into().map_err(|_| OggError::Eof)?),
            sequence: u32::from_le_bytes(buf[18..22].try_into().map_err(|_| OggError::Eof)?),
            checksum: u32::from_le_bytes(buf[22..26].try_into().map_err(|_| OggError::Eof)?),
            declared_segments,
            segments: heapless::Vec::new(),
        })
    }

    /// Encode the fixed 27-byte part. The segment count is the lacing table length.
    ///
    /// # Safety (lint allow)
    /// All range indices are compile-time constants within `[0, HEADER_SIZE)`.
    #[must_use]
    #[allow(clippy::indexing_slicing)]
    #[allow(clippy::cast_possible_truncation)] // segments.len() <= MAX_SEGMENTS = 255
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(CAPTURE_PATTERN);
        buf[4] = self.version;
        buf[5] = self.flags.bits();
        buf[6..14].copy_from_slice(&self.granule_position.to_le_bytes());
        buf[14..18].copy_from_slice(&self.serial.to_le_bytes());
        buf[18..22].copy_from_slice(&self.sequence.to_le_bytes());
        buf[22..26].copy_from_slice(&self.checksum.to_le_bytes());
        buf[26] = self.segments.len() as u8;
        buf
    }

    /// Build a header from its fields and a complete lacing table.
    ///
    /// # Errors
    ///
    /// Returns [`OggError::NoSegments`] for an empty table.
    pub fn with_segments(
        flags: PageFlags,
        granule_position: u64,
        serial: u32,
        sequence: u32,
        lacing: &[u8],
    ) -> Result<Self, OggError> {
        let count = u8::try_from(lacing.len()).map_err(|_| OggError::NoSegments)?;
        if count == 0 {
            return Err(OggError::NoSegments);
        }
        let mut header = Self {
            version: 0,
            flags,
            granule_position,
            serial,
            sequence,
            checksum: 0,
            declared_segments: count,
            segments: heapless::Vec::new(),
        };
        header.set_segment_table(lacing)?;
        Ok(header)
    }

    /// Number of lacing entries the fixed header announced.
    #[must_use]
    pub fn declared_segments(&self) -> usize {
        usize::from(self.declared_segments)
    }

    /// Install the lacing table read after the fixed header.
    ///
    /// # Errors
    ///
    /// Returns [`OggError::Eof`] if `lacing` is shorter than the declared count.
    pub fn set_segment_table(&mut self, lacing: &[u8]) -> Result<(), OggError> {
        let table = lacing.get(..self.declared_segments()).ok_or(OggError::Eof)?;
        self.segments.clear();
        self.segments.extend_from_slice(table).map_err(|_| OggError::NoSegments)
    }

    /// Read one page header and its lacing table, leaving `file` at the first payload byte.
    ///
    /// # Errors
    ///
    /// Returns [`OggError::Eof`] if the file ends inside the header or lacing
    /// table, plus every error of [`decode`](Self::decode).
    pub async fn read<F: File>(file: &mut F) -> Result<Self, DemuxError<F::Error>> {
        let mut fixed = [0u8; HEADER_SIZE];
        read_exact(file, &mut fixed).await?;
        let mut header = Self::decode(&fixed)?;
        let mut lacing = [0u8; MAX_SEGMENTS];
        let table = lacing.get_mut(..header.declared_segments()).ok_or(OggError::NoSegments)?;
        read_exact(file, table).await?;
        header.set_segment_table(table)?;
        Ok(header)
    }

    /// The lacing table.
    #[must_use]
    pub fn segment_table(&self) -> &[u8] {
        &self.segments
    }

    /// Number of lacing entries read.
    #[must_use]
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Lacing value of segment `index`.
    #[must_use]
    pub fn segment(&self, index: usize) -> Option<u8> {
        self.segments.get(index).copied()
    }

    /// Total payload bytes on this page: the sum of the lacing table.
    #[must_use]
    pub fn data_length(&self) -> usize {
        self.segments.iter().map(|&s| usize::from(s)).sum()
    }

    /// Payload bytes covered by segments `from..`.
    #[must_use]
    pub fn data_length_from(&self, from: usize) -> usize {
        self.segments.get(from..).unwrap_or(&[]).iter().map(|&s| usize::from(s)).sum()
    }

    /// The last packet on this page continues on the next page.
    #[must_use]
    pub fn ends_with_continued_packet(&self) -> bool {
        self.segments.last() == Some(&LACING_CONTINUE)
    }

    /// Packet boundaries on this page, in payload order.
    #[must_use]
    pub fn packets(&self) -> PacketSpans<'_> {
        PacketSpans { lacing: &self.segments, index: 0, offset: 0 }
    }
}

// ---------------------------------------------------------------------------
// Packet spans
// ---------------------------------------------------------------------------

/// One packet (or packet fragment) within a page payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketSpan {
    /// Byte offset of the fragment in the page payload.
    pub offset: usize,
    /// Fragment length.
    pub len: usize,
    /// `false` when the packet continues on the next page.
    pub complete: bool,
}

/// Iterator over the packet spans of a page; see [`PageHeader::packets`].
#[derive(Debug, Clone)]
pub struct PacketSpans<'a> {
    lacing: &'a [u8],
    index: usize,
    offset: usize,
}

impl Iterator for PacketSpans<'_> {
    type Item = PacketSpan;

    fn next(&mut self) -> Option<PacketSpan> {
        let rest = self.lacing.get(self.index..).filter(|r| !r.is_empty())?;
        let mut len = 0usize;
        let mut used = 0usize;
        let mut complete = false;
        for &lace in rest {
            used = used.saturating_add(1);
            len = len.saturating_add(usize::from(lace));
            if lace < LACING_CONTINUE {
                complete = true;
                break;
            }
        }
        let span = PacketSpan { offset: self.offset, len, complete };
        self.index = self.index.saturating_add(used);
        self.offset = self.offset.saturating_add(len);
        Some(span)
    }
}
