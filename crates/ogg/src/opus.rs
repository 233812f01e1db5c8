//! Opus header packets: identification (`OpusHead`) and comment (`OpusTags`).
//!
//! Both headers open a page of their own. Only the fixed leading fields are
//! read; any trailing bytes (channel mapping table, vendor string, user
//! comments) are skipped.

use platform::storage::File;

use crate::error::{DemuxError, OggError};
use crate::io::{read_exact, skip};
use crate::stream::OggStream;

// ---------------------------------------------------------------------------
// IdHeader: 19-byte OpusHead
// ---------------------------------------------------------------------------

/// Fixed part of the Opus identification header.
///
/// Layout (19 bytes, little-endian):
/// ```text
/// [0..8]   magic            b"OpusHead"
/// [8]      version          u8
/// [9]      channels         u8
/// [10..12] pre_skip         u16 le  (48 kHz samples)
/// [12..16] input_rate       u32 le  (informational)
/// [16..18] output_gain      i16 le  (Q7.8 dB)
/// [18]     mapping_family   u8
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct IdHeader {
    /// Encapsulation version; only the major nibble 0 is defined.
    pub version: u8,
    /// Output channel count.
    pub channels: u8,
    /// Samples (at 48 kHz) to discard from the start of the decoded stream.
    pub pre_skip: u16,
    /// Sample rate of the original input, informational only.
    pub input_sample_rate: u32,
    /// Output gain in Q7.8 dB.
    pub output_gain: i16,
    /// Channel mapping family (0 = mono/stereo, no mapping table).
    pub mapping_family: u8,
}

impl IdHeader {
    /// Size of the fixed header.
    pub const SIZE: usize = 19;
    /// Header signature.
    pub const MAGIC: &'static [u8; 8] = b"OpusHead";

    /// Decode the fixed identification header.
    ///
    /// # Errors
    ///
    /// Returns [`OggError::BadMagic`] if bytes `[0..8]` are not `b"OpusHead"`.
    ///
    /// # Safety (lint allow)
    /// All range indices are compile-time constants within `[0, SIZE)`.
    #[allow(clippy::indexing_slicing)]
    pub fn decode(buf: &[u8; Self::SIZE]) -> Result<Self, OggError> {
        if &buf[0..8] != Self::MAGIC {
            return Err(OggError::BadMagic);
        }
        Ok(Self {
            version: buf[8],
            channels: buf[9],
            pre_skip: u16::from_le_bytes([buf[10], buf[11]]),
            input_sample_rate: u32::from_le_bytes([buf[12], buf[13], buf[14], buf[15]]),
            output_gain: i16::from_le_bytes([buf[16], buf[17]]),
            mapping_family: buf[18],
        })
    }

    /// Encode into the 19-byte wire form.
    ///
    /// # Safety (lint allow)
    /// All range indices are compile-time constants within `[0, SIZE)`.
    #[must_use]
    #[allow(clippy::indexing_slicing)]
    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0..8].copy_from_slice(Self::MAGIC);
        buf[8] = self.version;
        buf[9] = self.channels;
        buf[10..12].copy_from_slice(&self.pre_skip.to_le_bytes());
        buf[12..16].copy_from_slice(&self.input_sample_rate.to_le_bytes());
        buf[16..18].copy_from_slice(&self.output_gain.to_le_bytes());
        buf[18] = self.mapping_family;
        buf
    }

    /// Read the header from a page payload of `data_length` bytes.
    ///
    /// The file must be positioned at the first payload byte; on success it is
    /// left at the end of the payload.
    ///
    /// # Errors
    ///
    /// Returns [`OggError::LenShort`] if `data_length < 19`,
    /// [`OggError::Eof`] if the file ends first and
    /// [`OggError::BadMagic`] on a signature mismatch.
    pub async fn read<F: File>(
        file: &mut F,
        data_length: usize,
    ) -> Result<Self, DemuxError<F::Error>> {
        let buf = read_fixed::<F, { IdHeader::SIZE }>(file, data_length).await?;
        Ok(Self::decode(&buf)?)
    }
}

// ---------------------------------------------------------------------------
// CommentHeader: 12-byte OpusTags prefix
// ---------------------------------------------------------------------------

/// Fixed part of the Opus comment header; only validated, never interpreted.
///
/// Layout (12 bytes, little-endian):
/// ```text
/// [0..8]   magic          b"OpusTags"
/// [8..12]  vendor_length  u32 le
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CommentHeader {
    /// Length of the vendor string that follows.
    pub vendor_length: u32,
}

impl CommentHeader {
    /// Size of the fixed prefix.
    pub const SIZE: usize = 12;
    /// Header signature.
    pub const MAGIC: &'static [u8; 8] = b"OpusTags";

    /// Decode the fixed comment header prefix.
    ///
    /// # Errors
    ///
    /// Returns [`OggError::BadMagic`] if bytes `[0..8]` are not `b"OpusTags"`.
    #[allow(clippy::indexing_slicing)] // Safety: constant indices within [0, SIZE)
    pub fn decode(buf: &[u8; Self::SIZE]) -> Result<Self, OggError> {
        if &buf[0..8] != Self::MAGIC {
            return Err(OggError::BadMagic);
        }
        Ok(Self { vendor_length: u32::from_le_bytes([buf[8], buf[9], buf[10], buf[11]]) })
    }

    /// Encode into the 12-byte wire form.
    #[must_use]
    #[allow(clippy::indexing_slicing)] // Safety: constant indices within [0, SIZE)
    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0..8].copy_from_slice(Self::MAGIC);
        buf[8..12].copy_from_slice(&self.vendor_length.to_le_bytes());
        buf
    }

    /// Read the header from a page payload of `data_length` bytes.
    ///
    /// # Errors
    ///
    /// As [`IdHeader::read`], with a 12-byte minimum and `b"OpusTags"`.
    pub async fn read<F: File>(
        file: &mut F,
        data_length: usize,
    ) -> Result<Self, DemuxError<F::Error>> {
        let buf = read_fixed::<F, { CommentHeader::SIZE }>(file, data_length).await?;
        Ok(Self::decode(&buf)?)
    }
}

/// Read `N` bytes of a `data_length`-byte payload and skip the rest.
async fn read_fixed<F: File, const N: usize>(
    file: &mut F,
    data_length: usize,
) -> Result<[u8; N], DemuxError<F::Error>> {
    if data_length < N {
        return Err(OggError::LenShort.into());
    }
    let mut buf = [0u8; N];
    read_exact(file, &mut buf).await?;
    skip(file, data_length.saturating_sub(N)).await?;
    Ok(buf)
}

// ---------------------------------------------------------------------------
// Stream preparation
// ---------------------------------------------------------------------------

/// Both Opus headers of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct OpusHeaders {
    /// Identification header.
    pub id: IdHeader,
    /// Comment header prefix.
    pub comment: CommentHeader,
}

/// Rewind `file`, validate both Opus headers and leave the file at the first audio page.
///
/// A comment header too large for one page continues on further pages; those
/// are skipped.
///
/// # Errors
///
/// Any [`OggError`] from the page or header parsers, or a storage error.
pub async fn prepare_stream<F: File>(
    stream: &mut OggStream,
    file: &mut F,
) -> Result<OpusHeaders, DemuxError<F::Error>> {
    file.seek(0).await.map_err(DemuxError::Storage)?;
    stream.reset();

    let len = stream.read_page_header(file).await?;
    let id = IdHeader::read(file, len).await?;
    stream.consume_page();

    let len = stream.read_page_header(file).await?;
    let comment = CommentHeader::read(file, len).await?;
    stream.consume_page();

    while stream.page().is_some_and(|p| p.ends_with_continued_packet()) {
        let len = stream.read_page_header(file).await?;
        skip(file, len).await?;
        stream.consume_page();
    }

    Ok(OpusHeaders { id, comment })
}
