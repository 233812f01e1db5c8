//! Property-based tests for page parsing and packet reassembly.

#![allow(clippy::unwrap_used, clippy::indexing_slicing, clippy::arithmetic_side_effects)]

use embassy_futures::block_on;
use ogg::page::{PageFlags, PageHeader, HEADER_SIZE};
use ogg::writer::StreamWriter;
use ogg::{OggError, OggStream};
use platform::mocks::MockFile;
use proptest::prelude::*;

fn raw_page(lacing: &[u8]) -> Vec<u8> {
    let mut header = [0u8; HEADER_SIZE];
    header[..4].copy_from_slice(b"OggS");
    header[26] = u8::try_from(lacing.len()).unwrap();
    let mut out = header.to_vec();
    out.extend_from_slice(lacing);
    out
}

proptest! {
    /// The data length is the sum of the lacing table for every legal segment count.
    #[test]
    fn data_length_is_sum_of_lacing(lacing in proptest::collection::vec(any::<u8>(), 1..=255)) {
        let mut file = MockFile::from_bytes(&raw_page(&lacing));
        let header = block_on(PageHeader::read(&mut file)).unwrap();
        let expected: usize = lacing.iter().map(|&b| usize::from(b)).sum();
        prop_assert_eq!(header.data_length(), expected);
        prop_assert_eq!(header.segment_count(), lacing.len());
        prop_assert_eq!(file.position(), (HEADER_SIZE + lacing.len()) as u64);
    }

    /// A run of k 255-entries closed by v < 255 is a single packet of 255*k + v bytes.
    #[test]
    fn continuation_run_is_one_packet(k in 0usize..=20, v in 0u8..255) {
        let mut lacing = vec![255u8; k];
        lacing.push(v);
        let header = PageHeader::with_segments(PageFlags::default(), 0, 0, 0, &lacing).unwrap();
        let spans: Vec<_> = header.packets().collect();
        prop_assert_eq!(spans.len(), 1);
        prop_assert_eq!(spans[0].len, 255 * k + usize::from(v));
        prop_assert!(spans[0].complete);
    }

    /// Concatenating all packets of a multi-page stream reproduces the payload bytes.
    #[test]
    fn packets_reassemble_across_pages(
        sizes in proptest::collection::vec(0usize..1500, 1..12),
        max_segments in 1usize..=8,
        seed in any::<u8>(),
    ) {
        let packets: Vec<Vec<u8>> = sizes
            .iter()
            .enumerate()
            .map(|(i, &n)| (0..n).map(|j| (j as u8) ^ (i as u8) ^ seed).collect())
            .collect();
        let refs: Vec<&[u8]> = packets.iter().map(Vec::as_slice).collect();
        let mut writer = StreamWriter::new(3).with_max_segments(max_segments);
        writer.write_packets(&refs);
        let bytes = writer.finish();

        let mut file = MockFile::from_bytes(&bytes);
        let mut stream = OggStream::new();
        let mut buf = vec![0u8; 2048];
        for expected in &packets {
            let n = block_on(stream.next_packet(&mut file, &mut buf)).unwrap();
            prop_assert_eq!(&buf[..n], expected.as_slice());
        }
        let end = block_on(stream.next_packet(&mut file, &mut buf)).unwrap_err();
        prop_assert!(end.is_eof());
    }

    /// Whole-page reads return exactly the bytes written to each page.
    #[test]
    fn data_pages_cover_stream(sizes in proptest::collection::vec(1usize..300, 1..6)) {
        let mut writer = StreamWriter::new(5);
        for (i, &n) in sizes.iter().enumerate() {
            writer.write_packets(&[&vec![i as u8; n]]);
        }
        let bytes = writer.finish();
        let mut file = MockFile::from_bytes(&bytes);
        let mut stream = OggStream::new();
        let mut buf = vec![0u8; 512];
        for (i, &n) in sizes.iter().enumerate() {
            let got = block_on(stream.next_data_page(&mut file, &mut buf)).unwrap();
            prop_assert_eq!(got, n);
            prop_assert!(buf[..n].iter().all(|&b| b == i as u8));
        }
        prop_assert!(stream.page().unwrap().flags.is_last());
    }
}

#[test]
fn zero_segments_is_rejected() {
    let mut file = MockFile::from_bytes(&raw_page(&[]));
    let err = block_on(PageHeader::read(&mut file)).unwrap_err();
    assert_eq!(err.format(), Some(OggError::NoSegments));
}

#[test]
fn truncated_fixed_header_is_eof() {
    let page = raw_page(&[10]);
    let mut file = MockFile::from_bytes(&page[..20]);
    let err = block_on(PageHeader::read(&mut file)).unwrap_err();
    assert_eq!(err.format(), Some(OggError::Eof));
}
