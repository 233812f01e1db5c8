//! Page-at-a-time decode pipeline.
//!
//! [`DecodePipeline`] pulls one whole Ogg page, walks its lacing table packet
//! by packet, feeds each packet to the [`PacketDecoder`] and appends the PCM
//! to a [`StagingBuffer`]. The first `pre_skip` samples of the stream are
//! dropped here so they can never reach the hardware.
//!
//! A page can decode to more PCM than staging holds (opusenc writes up to a
//! second of audio per page). When the next packet does not fit, the page is
//! left pending and the following call resumes at that packet without
//! touching the file.

use ogg::opus::{prepare_stream, OpusHeaders};
use ogg::{DemuxError, OggStream};
use platform::storage::File;

use crate::config::MAX_PACKET_BYTES;
use crate::decoder::{DecoderCode, PacketDecoder};
use crate::staging::StagingBuffer;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Error from [`DecodePipeline`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineError<E: core::fmt::Debug> {
    /// Demux or storage error.
    Demux(DemuxError<E>),
    /// The decoder rejected a packet.
    DecodeFailure(DecoderCode),
}

impl<E: core::fmt::Debug> From<DemuxError<E>> for PipelineError<E> {
    fn from(e: DemuxError<E>) -> Self {
        Self::Demux(e)
    }
}

impl<E: core::fmt::Debug> From<DecoderCode> for PipelineError<E> {
    fn from(e: DecoderCode) -> Self {
        Self::DecodeFailure(e)
    }
}

impl<E: core::fmt::Debug> PipelineError<E> {
    /// `true` when the file ran out of pages.
    pub fn is_eof(&self) -> bool {
        matches!(self, Self::Demux(e) if e.is_eof())
    }
}

// ---------------------------------------------------------------------------
// DecodedPage
// ---------------------------------------------------------------------------

/// Outcome of one [`DecodePipeline::fetch_and_decode_page`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DecodedPage {
    /// Interleaved samples the decoder produced for this page.
    pub decoded: usize,
    /// Of those, samples dropped by pre-skip.
    pub skipped: usize,
    /// Packets decoded (a packet completed on this page counts here).
    pub packets: usize,
    /// Payload bytes lost because the page exceeded the page buffer.
    pub clipped_bytes: usize,
    /// Every packet of the page has been decoded. `false` when staging
    /// filled up first; the next call continues the same page.
    pub complete: bool,
    /// This call continued a page left pending by an earlier call.
    pub resumed: bool,
    /// The page carried the end-of-stream flag and is complete.
    pub end_of_stream: bool,
}

impl DecodedPage {
    /// Interleaved samples appended to the staging buffer.
    pub fn committed(&self) -> usize {
        self.decoded.saturating_sub(self.skipped)
    }
}

// ---------------------------------------------------------------------------
// DecodePipeline
// ---------------------------------------------------------------------------

/// Where decoding of the buffered page continues.
#[derive(Debug, Clone, Copy)]
struct PageCursor {
    /// Index of the next packet span to decode.
    next: usize,
    /// Payload bytes of the page held in the page buffer.
    got: usize,
}

/// Demux state, page buffer and decoder for one stream at a time.
///
/// `P` is the page payload buffer size in bytes.
pub struct DecodePipeline<D: PacketDecoder, const P: usize> {
    decoder: D,
    stream: OggStream,
    page: [u8; P],
    carry: heapless::Vec<u8, MAX_PACKET_BYTES>,
    pending: Option<PageCursor>,
    pre_skip_remaining: usize,
    pages_decoded: u32,
}

impl<D: PacketDecoder, const P: usize> DecodePipeline<D, P> {
    /// Wrap `decoder`.
    pub fn new(decoder: D) -> Self {
        Self {
            decoder,
            stream: OggStream::new(),
            page: [0u8; P],
            carry: heapless::Vec::new(),
            pending: None,
            pre_skip_remaining: 0,
            pages_decoded: 0,
        }
    }

    /// The decoder.
    pub fn decoder(&self) -> &D {
        &self.decoder
    }

    /// Demux state of the current stream.
    pub fn stream(&self) -> &OggStream {
        &self.stream
    }

    /// Interleaved pre-skip samples still to be dropped.
    pub fn pre_skip_remaining(&self) -> usize {
        self.pre_skip_remaining
    }

    /// Audio pages decoded since [`prepare`](Self::prepare).
    pub fn pages_decoded(&self) -> u32 {
        self.pages_decoded
    }

    /// A page is only partly decoded; the next fetch continues it.
    pub fn has_pending_page(&self) -> bool {
        self.pending.is_some()
    }

    /// Rewind `file`, parse the Opus headers and arm pre-skip for a new stream.
    ///
    /// Pre-skip is stored at 48 kHz in the stream; it is rescaled to the
    /// decoder's output rate and multiplied by its channel count.
    ///
    /// # Errors
    ///
    /// Any demux error from [`prepare_stream`].
    pub async fn prepare<F: File>(
        &mut self,
        file: &mut F,
    ) -> Result<OpusHeaders, PipelineError<F::Error>> {
        self.decoder.reset();
        self.carry.clear();
        self.pending = None;
        self.pages_decoded = 0;
        let headers = prepare_stream(&mut self.stream, file).await?;
        let per_channel = self.decoder.sample_rate().scale_from_48k(u32::from(headers.id.pre_skip));
        self.pre_skip_remaining = usize::try_from(per_channel)
            .unwrap_or(usize::MAX)
            .saturating_mul(usize::from(self.decoder.channels()));
        debug!(
            "opus: {} ch, pre-skip {} (48k) -> {} samples",
            headers.id.channels,
            headers.id.pre_skip,
            self.pre_skip_remaining
        );
        Ok(headers)
    }

    /// Decode the packets of the next page into `staging`.
    ///
    /// Continues a pending page if there is one, otherwise reads the next
    /// page from `file`. A packet left open at the end of the page is carried
    /// and completed by the next page. A continuation page with nothing
    /// carried skips its leading fragment.
    ///
    /// Stops early with [`DecodedPage::complete`] unset when the next packet
    /// does not fit in the free part of `staging`.
    ///
    /// # Errors
    ///
    /// [`PipelineError::Demux`] from the page read (end of file is
    /// `Demux(Format(Eof))`), [`PipelineError::DecodeFailure`] if the decoder
    /// rejects a packet or a packet does not fit even in empty staging.
    /// Samples of packets decoded before a failure stay in `staging`.
    pub async fn fetch_and_decode_page<F: File, const N: usize>(
        &mut self,
        file: &mut F,
        staging: &mut StagingBuffer<N>,
    ) -> Result<DecodedPage, PipelineError<F::Error>> {
        let (cursor, resumed) = match self.pending.take() {
            Some(cursor) => (cursor, true),
            None => (self.fetch_page(file).await?, false),
        };

        let Self { decoder, stream, page, carry, pending, pre_skip_remaining, .. } = &mut *self;
        let Some(header) = stream.page() else {
            return Ok(DecodedPage { complete: true, ..DecodedPage::default() });
        };
        let mut out = DecodedPage { resumed, ..DecodedPage::default() };
        if !resumed {
            out.clipped_bytes = header.data_length().saturating_sub(cursor.got);
        }

        let continuation = header.flags.is_continuation();
        for (index, span) in header.packets().enumerate().skip(cursor.next) {
            let end = span.offset.saturating_add(span.len);
            let Some(bytes) = page.get(span.offset..end).filter(|_| end <= cursor.got) else {
                break;
            };
            let carried = index == 0 && continuation;

            if !span.complete {
                // A leading fragment was appended to the carry on fetch.
                if !carried {
                    carry.clear();
                    if carry.extend_from_slice(bytes).is_err() {
                        warn!("carried packet exceeds {} bytes, dropped", MAX_PACKET_BYTES);
                        carry.clear();
                    }
                }
                continue;
            }

            let packet = if carried {
                if carry.is_empty() {
                    continue;
                }
                carry.as_slice()
            } else {
                bytes
            };
            match decode_packet(decoder, pre_skip_remaining, packet, staging) {
                Ok(result) => out.absorb(result),
                Err(DecoderCode::BUFFER_TOO_SMALL) if !staging.is_empty() => {
                    trace!("staging full, page {} continues at packet {}", header.sequence, index);
                    *pending = Some(PageCursor { next: index, got: cursor.got });
                    return Ok(out);
                }
                Err(code) => {
                    if carried {
                        carry.clear();
                    }
                    return Err(code.into());
                }
            }
            if carried {
                carry.clear();
            }
        }

        out.complete = true;
        out.end_of_stream = header.flags.is_last();
        self.pages_decoded = self.pages_decoded.saturating_add(1);
        Ok(out)
    }

    /// Read the next page into the page buffer and reconcile the carry with it.
    async fn fetch_page<F: File>(&mut self, file: &mut F) -> Result<PageCursor, PipelineError<F::Error>> {
        let got = self.stream.next_data_page(file, &mut self.page).await?;
        let cursor = PageCursor { next: 0, got };

        let Self { stream, page, carry, .. } = &mut *self;
        let Some(header) = stream.page() else {
            return Ok(cursor);
        };
        let clipped = header.data_length().saturating_sub(got);
        if clipped > 0 {
            warn!("page {} clipped by {} bytes", header.sequence, clipped);
        }
        trace!("page {}: {} bytes", header.sequence, got);

        if !header.flags.is_continuation() {
            if !carry.is_empty() {
                warn!("dropping unterminated packet of {} bytes", carry.len());
                carry.clear();
            }
            return Ok(cursor);
        }
        // Nothing carried: the leading fragment is an orphan and is skipped.
        if carry.is_empty() {
            return Ok(cursor);
        }
        if let Some(span) = header.packets().next() {
            let end = span.offset.saturating_add(span.len);
            match page.get(span.offset..end).filter(|_| end <= got) {
                Some(bytes) => {
                    if carry.extend_from_slice(bytes).is_err() {
                        warn!("carried packet exceeds {} bytes, dropped", MAX_PACKET_BYTES);
                        carry.clear();
                    }
                }
                None => carry.clear(),
            }
        }
        Ok(cursor)
    }
}

impl DecodedPage {
    fn absorb(&mut self, (decoded, skipped): (usize, usize)) {
        self.decoded = self.decoded.saturating_add(decoded);
        self.skipped = self.skipped.saturating_add(skipped);
        self.packets = self.packets.saturating_add(1);
    }
}

/// Decode one packet into the free tail of `staging`, dropping pre-skip samples.
///
/// Returns `(decoded, skipped)` in interleaved samples.
fn decode_packet<D: PacketDecoder, const N: usize>(
    decoder: &mut D,
    pre_skip_remaining: &mut usize,
    packet: &[u8],
    staging: &mut StagingBuffer<N>,
) -> Result<(usize, usize), DecoderCode> {
    let channels = usize::from(decoder.channels());
    let spare = staging.spare_mut();
    let frames = decoder.decode(packet, spare)?;
    let produced = frames.saturating_mul(channels).min(spare.len());
    let skipped = (*pre_skip_remaining).min(produced);
    if skipped > 0 {
        spare.copy_within(skipped..produced, 0);
        *pre_skip_remaining = pre_skip_remaining.saturating_sub(skipped);
    }
    staging.commit(produced.saturating_sub(skipped));
    Ok((produced, skipped))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::mocks::PatternDecoder;
    use std::vec::Vec;
    use ogg::writer::StreamWriter;
    use ogg::IdHeader;
    use platform::mocks::MockFile;

    const PAGE: usize = 1024;

    fn id(pre_skip: u16) -> IdHeader {
        IdHeader {
            version: 1,
            channels: 1,
            pre_skip,
            input_sample_rate: 16_000,
            output_gain: 0,
            mapping_family: 0,
        }
    }

    fn file_with(pre_skip: u16, pages: &[&[&[u8]]], max_segments: usize) -> MockFile {
        let mut w = StreamWriter::new(1);
        w.write_opus_headers(&id(pre_skip), "t");
        let mut w = w.with_max_segments(max_segments);
        for page in pages {
            w.write_packets(page);
        }
        MockFile::from_bytes(&w.finish())
    }

    #[tokio::test]
    async fn pre_skip_is_scaled_and_dropped() {
        // 312 @ 48 kHz = 104 samples @ 16 kHz mono.
        let p1 = PatternDecoder::packet(0, 320);
        let mut file = file_with(312, &[&[p1.as_slice()]], 255);
        let mut pipe: DecodePipeline<_, PAGE> = DecodePipeline::new(PatternDecoder::mono_16k());
        pipe.prepare(&mut file).await.unwrap();
        assert_eq!(pipe.pre_skip_remaining(), 104);

        let mut staging: StagingBuffer<4096> = StagingBuffer::new();
        let page = pipe.fetch_and_decode_page(&mut file, &mut staging).await.unwrap();
        assert_eq!(page.decoded, 320);
        assert_eq!(page.skipped, 104);
        assert_eq!(staging.len(), 216);
        assert_eq!(staging.as_slice()[0], 104);
        assert!(page.end_of_stream);
    }

    #[tokio::test]
    async fn pre_skip_spills_into_second_page() {
        let p = PatternDecoder::packet(0, 60);
        let q = PatternDecoder::packet(60, 60);
        let mut file = file_with(312, &[&[p.as_slice()], &[q.as_slice()]], 255);
        let mut pipe: DecodePipeline<_, PAGE> = DecodePipeline::new(PatternDecoder::mono_16k());
        pipe.prepare(&mut file).await.unwrap();
        let mut staging: StagingBuffer<4096> = StagingBuffer::new();
        assert_eq!(pipe.fetch_and_decode_page(&mut file, &mut staging).await.unwrap().skipped, 60);
        assert!(staging.is_empty());
        let second = pipe.fetch_and_decode_page(&mut file, &mut staging).await.unwrap();
        assert_eq!(second.skipped, 44);
        assert_eq!(staging.as_slice()[0], 104);
    }

    #[tokio::test]
    async fn packet_carried_across_pages() {
        // 600-byte packet forced across pages by a 2-segment cap.
        let big = PatternDecoder::packet_padded(0, 100, 600);
        let small = PatternDecoder::packet(100, 50);
        let mut file = file_with(0, &[&[big.as_slice(), small.as_slice()]], 2);
        let mut pipe: DecodePipeline<_, PAGE> = DecodePipeline::new(PatternDecoder::mono_16k());
        pipe.prepare(&mut file).await.unwrap();
        let mut staging: StagingBuffer<4096> = StagingBuffer::new();
        let mut packets = 0;
        loop {
            match pipe.fetch_and_decode_page(&mut file, &mut staging).await {
                Ok(p) => packets += p.packets,
                Err(e) => {
                    assert!(e.is_eof());
                    break;
                }
            }
        }
        assert_eq!(packets, 2);
        assert_eq!(staging.len(), 150);
        assert!(staging.as_slice().iter().enumerate().all(|(i, &s)| s == i as i16));
    }

    #[tokio::test]
    async fn decode_failure_is_reported() {
        let bad = [PatternDecoder::FAIL_TAG, 0, 0, 0];
        let mut file = file_with(0, &[&[bad.as_slice()]], 255);
        let mut pipe: DecodePipeline<_, PAGE> = DecodePipeline::new(PatternDecoder::mono_16k());
        pipe.prepare(&mut file).await.unwrap();
        let mut staging: StagingBuffer<64> = StagingBuffer::new();
        let err = pipe.fetch_and_decode_page(&mut file, &mut staging).await.unwrap_err();
        assert_eq!(err, PipelineError::DecodeFailure(DecoderCode::INVALID_PACKET));
    }

    #[tokio::test]
    async fn full_staging_is_buffer_too_small() {
        let p = PatternDecoder::packet(0, 100);
        let mut file = file_with(0, &[&[p.as_slice()]], 255);
        let mut pipe: DecodePipeline<_, PAGE> = DecodePipeline::new(PatternDecoder::mono_16k());
        pipe.prepare(&mut file).await.unwrap();
        let mut staging: StagingBuffer<64> = StagingBuffer::new();
        let err = pipe.fetch_and_decode_page(&mut file, &mut staging).await.unwrap_err();
        assert_eq!(err, PipelineError::DecodeFailure(DecoderCode::BUFFER_TOO_SMALL));
    }

    #[tokio::test]
    async fn page_larger_than_staging_resumes_without_reading() {
        let packets: Vec<Vec<u8>> = (0..3).map(|i| PatternDecoder::packet(i * 40, 40)).collect();
        let refs: Vec<&[u8]> = packets.iter().map(Vec::as_slice).collect();
        let mut file = file_with(0, &[&refs], 255);
        let mut pipe: DecodePipeline<_, PAGE> = DecodePipeline::new(PatternDecoder::mono_16k());
        pipe.prepare(&mut file).await.unwrap();
        let mut staging: StagingBuffer<64> = StagingBuffer::new();
        let mut out = [0i16; 64];

        let first = pipe.fetch_and_decode_page(&mut file, &mut staging).await.unwrap();
        assert_eq!((first.packets, first.complete, first.end_of_stream), (1, false, false));
        assert!(pipe.has_pending_page());
        let position = file.position();

        let mut played = Vec::new();
        let n = staging.take_front(&mut out);
        played.extend_from_slice(&out[..n]);
        let second = pipe.fetch_and_decode_page(&mut file, &mut staging).await.unwrap();
        assert_eq!((second.packets, second.complete, second.resumed), (1, false, true));

        let n = staging.take_front(&mut out);
        played.extend_from_slice(&out[..n]);
        let third = pipe.fetch_and_decode_page(&mut file, &mut staging).await.unwrap();
        assert!(third.complete && third.resumed && third.end_of_stream);
        assert!(!pipe.has_pending_page());
        assert_eq!(file.position(), position);
        assert_eq!(pipe.pages_decoded(), 1);

        played.extend_from_slice(staging.as_slice());
        assert!(played.iter().enumerate().all(|(i, &s)| s == i as i16));
        assert_eq!(played.len(), 120);
    }

    #[tokio::test]
    async fn carried_packet_survives_a_full_staging() {
        let head = PatternDecoder::packet(0, 50);
        let big = PatternDecoder::packet_padded(50, 40, 600);
        let mut file = file_with(0, &[&[head.as_slice(), big.as_slice()]], 2);
        let mut pipe: DecodePipeline<_, PAGE> = DecodePipeline::new(PatternDecoder::mono_16k());
        pipe.prepare(&mut file).await.unwrap();
        let mut staging: StagingBuffer<64> = StagingBuffer::new();

        // Page 1: the small packet plus the start of the big one.
        let first = pipe.fetch_and_decode_page(&mut file, &mut staging).await.unwrap();
        assert_eq!(first.packets, 1);
        // Page 2 completes the big packet, which does not fit behind 50 samples.
        let second = pipe.fetch_and_decode_page(&mut file, &mut staging).await.unwrap();
        assert!(!second.complete);
        staging.clear();
        let third = pipe.fetch_and_decode_page(&mut file, &mut staging).await.unwrap();
        assert_eq!(third.packets, 1);
        assert!(third.complete);
        assert_eq!(staging.as_slice()[0], 50);
        assert_eq!(staging.len(), 40);
    }
}
