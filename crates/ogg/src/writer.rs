//! `StreamWriter`: builds Ogg/Opus byte streams in memory.
//!
//! Desktop-only (`std`). Used to synthesise test fixtures and benchmark
//! inputs with exact control over page boundaries. Checksums are left zero
//! because the reader never verifies them.

use std::vec::Vec;

use crate::opus::{CommentHeader, IdHeader};
use crate::page::{PageFlags, PageHeader, LACING_CONTINUE, MAX_SEGMENTS};

/// Granule value for a page on which no packet completes.
const NO_GRANULE: u64 = u64::MAX;

/// Incremental Ogg page writer for one logical stream.
pub struct StreamWriter {
    serial: u32,
    sequence: u32,
    granule: u64,
    samples_per_packet: u64,
    max_segments: usize,
    out: Vec<u8>,
    last_page_at: Option<usize>,
    continued: bool,
}

impl StreamWriter {
    /// Create a writer for stream `serial`.
    #[must_use]
    pub fn new(serial: u32) -> Self {
        Self {
            serial,
            sequence: 0,
            granule: 0,
            samples_per_packet: 960,
            max_segments: MAX_SEGMENTS,
            out: Vec::new(),
            last_page_at: None,
            continued: false,
        }
    }

    /// Cap the lacing table size of each page, forcing packets across pages.
    #[must_use]
    pub fn with_max_segments(mut self, max_segments: usize) -> Self {
        self.max_segments = max_segments.clamp(1, MAX_SEGMENTS);
        self
    }

    /// Granule advance per completed packet, in 48 kHz samples (default 960 = 20 ms).
    #[must_use]
    pub fn with_samples_per_packet(mut self, samples: u64) -> Self {
        self.samples_per_packet = samples;
        self
    }

    /// Write an identification header page followed by a comment header page.
    pub fn write_opus_headers(&mut self, id: &IdHeader, vendor: &str) {
        self.write_packets(&[&id.encode()]);
        self.write_packets(&[&comment_packet(vendor, &[])]);
    }

    /// Write `packets` starting on a fresh page.
    ///
    /// Packets are laced in order and split across as many pages as the
    /// segment cap requires. A packet whose length is a multiple of 255 gets
    /// a terminating zero-length segment.
    pub fn write_packets(&mut self, packets: &[&[u8]]) {
        let mut lacing: Vec<u8> = Vec::new();
        let mut payload: Vec<u8> = Vec::new();
        let mut completed = 0u64;

        for packet in packets {
            let mut rest = packet.len();
            let mut offset = 0usize;
            loop {
                let lace = rest.min(usize::from(LACING_CONTINUE));
                let end = offset.saturating_add(lace);
                payload.extend_from_slice(packet.get(offset..end).unwrap_or(&[]));
                #[allow(clippy::cast_possible_truncation)] // lace <= 255
                lacing.push(lace as u8);
                offset = end;
                rest = rest.saturating_sub(lace);
                let terminal = lace < usize::from(LACING_CONTINUE);
                if terminal {
                    completed = completed.saturating_add(1);
                }
                if lacing.len() == self.max_segments {
                    self.flush_page(&lacing, &payload, completed);
                    lacing.clear();
                    payload.clear();
                    completed = 0;
                }
                if terminal {
                    break;
                }
            }
        }
        if !lacing.is_empty() {
            self.flush_page(&lacing, &payload, completed);
        }
    }

    /// Append raw bytes (to build corrupt or truncated streams).
    pub fn write_raw(&mut self, bytes: &[u8]) {
        self.out.extend_from_slice(bytes);
    }

    /// Set the end-of-stream flag on the last page and return the stream bytes.
    #[must_use]
    pub fn finish(mut self) -> Vec<u8> {
        if let Some(flags) = self.last_page_at.and_then(|at| self.out.get_mut(at.saturating_add(5))) {
            *flags |= PageFlags::LAST;
        }
        self.out
    }

    fn flush_page(&mut self, lacing: &[u8], payload: &[u8], completed: u64) {
        let mut flags = 0u8;
        if self.sequence == 0 {
            flags |= PageFlags::FIRST;
        }
        if self.continued {
            flags |= PageFlags::CONTINUED;
        }
        let granule = if completed == 0 {
            NO_GRANULE
        } else {
            self.granule = self
                .granule
                .saturating_add(completed.saturating_mul(self.samples_per_packet));
            self.granule
        };
        let Ok(header) = PageHeader::with_segments(
            PageFlags::from_bits(flags),
            granule,
            self.serial,
            self.sequence,
            lacing,
        ) else {
            return;
        };
        self.last_page_at = Some(self.out.len());
        self.out.extend_from_slice(&header.encode());
        self.out.extend_from_slice(lacing);
        self.out.extend_from_slice(payload);
        self.sequence = self.sequence.saturating_add(1);
        self.continued = header.ends_with_continued_packet();
    }
}

/// Build an `OpusTags` packet with a vendor string and user comments.
#[must_use]
pub fn comment_packet(vendor: &str, comments: &[&str]) -> Vec<u8> {
    let vendor_length = u32::try_from(vendor.len()).unwrap_or(u32::MAX);
    let mut out = CommentHeader { vendor_length }.encode().to_vec();
    out.extend_from_slice(vendor.as_bytes());
    out.extend_from_slice(&u32::try_from(comments.len()).unwrap_or(u32::MAX).to_le_bytes());
    for comment in comments {
        out.extend_from_slice(&u32::try_from(comment.len()).unwrap_or(u32::MAX).to_le_bytes());
        out.extend_from_slice(comment.as_bytes());
    }
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::page::HEADER_SIZE;

    #[test]
    fn first_page_has_bos_and_last_has_eos() {
        let mut w = StreamWriter::new(7);
        w.write_packets(&[&[1, 2, 3]]);
        w.write_packets(&[&[4]]);
        let bytes = w.finish();
        assert_eq!(bytes[5], PageFlags::FIRST);
        let second = HEADER_SIZE + 1 + 3;
        assert_eq!(bytes[second + 5], PageFlags::LAST);
    }

    #[test]
    fn exact_multiple_of_255_gets_zero_terminator() {
        let mut w = StreamWriter::new(1);
        let packet = [0u8; 510];
        w.write_packets(&[&packet]);
        let bytes = w.finish();
        assert_eq!(bytes[26], 3);
        assert_eq!(&bytes[HEADER_SIZE..HEADER_SIZE + 3], &[255, 255, 0]);
    }

    #[test]
    fn segment_cap_splits_packet_and_flags_continuation() {
        let mut w = StreamWriter::new(1).with_max_segments(2);
        let packet = [9u8; 600];
        w.write_packets(&[&packet]);
        let bytes = w.finish();
        let first = PageHeader::decode(bytes[..HEADER_SIZE].try_into().unwrap()).unwrap();
        assert_eq!(first.granule_position, NO_GRANULE);
        let second_at = HEADER_SIZE + 2 + 510;
        let second =
            PageHeader::decode(bytes[second_at..second_at + HEADER_SIZE].try_into().unwrap())
                .unwrap();
        assert!(second.flags.is_continuation());
        assert_eq!(second.granule_position, 960);
    }

    #[test]
    fn comment_packet_layout() {
        let packet = comment_packet("lib", &["A=b"]);
        assert_eq!(&packet[..8], b"OpusTags");
        assert_eq!(&packet[8..12], &3u32.to_le_bytes());
        assert_eq!(packet.len(), 12 + 3 + 4 + 4 + 3);
    }
}
