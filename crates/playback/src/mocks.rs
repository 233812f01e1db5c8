//! Deterministic decoder for host tests.
//!
//! [`PatternDecoder`] "decodes" a tiny synthetic packet format into a sample
//! ramp, so tests can check exactly which samples reach the output:
//!
//! ```text
//! [0]    tag      0xA5 (0xFF = always fails)
//! [1..3] start    i16 le  value of the first frame
//! [3..5] frames   u16 le  frames per channel
//! [5..]  padding  ignored
//! ```
//!
//! Frame `f` of every channel is `start + f` (wrapping).

#![cfg(any(test, feature = "std"))]

use std::vec::Vec;

use platform::audio_types::SampleRateHz;

use crate::decoder::{DecoderCode, PacketDecoder};

/// Fake [`PacketDecoder`] producing ramps described by the packet bytes.
#[derive(Debug)]
pub struct PatternDecoder {
    rate: SampleRateHz,
    channels: u8,
    packets: usize,
    resets: usize,
}

impl PatternDecoder {
    /// Tag byte of a well-formed packet.
    pub const TAG: u8 = 0xA5;
    /// Tag byte of a packet the decoder rejects with `INVALID_PACKET`.
    pub const FAIL_TAG: u8 = 0xFF;
    /// Bytes of a packet without padding.
    pub const PACKET_SIZE: usize = 5;

    /// Decoder with the given output format.
    pub fn new(rate: SampleRateHz, channels: u8) -> Self {
        Self { rate, channels, packets: 0, resets: 0 }
    }

    /// 16 kHz mono decoder.
    pub fn mono_16k() -> Self {
        Self::new(SampleRateHz::WIDEBAND, 1)
    }

    /// Packet decoding to `frames` frames ramping up from `start`.
    pub fn packet(start: i16, frames: u16) -> Vec<u8> {
        Self::packet_padded(start, frames, Self::PACKET_SIZE)
    }

    /// Like [`packet`](Self::packet), padded with zeros to `len` bytes.
    pub fn packet_padded(start: i16, frames: u16, len: usize) -> Vec<u8> {
        let mut out = Vec::with_capacity(len.max(Self::PACKET_SIZE));
        out.push(Self::TAG);
        out.extend_from_slice(&start.to_le_bytes());
        out.extend_from_slice(&frames.to_le_bytes());
        out.resize(len.max(Self::PACKET_SIZE), 0);
        out
    }

    /// Packets decoded successfully so far.
    pub fn packets_decoded(&self) -> usize {
        self.packets
    }

    /// `reset` calls so far.
    pub fn resets(&self) -> usize {
        self.resets
    }
}

impl PacketDecoder for PatternDecoder {
    fn channels(&self) -> u8 {
        self.channels
    }

    fn sample_rate(&self) -> SampleRateHz {
        self.rate
    }

    fn decode(&mut self, packet: &[u8], pcm: &mut [i16]) -> Result<usize, DecoderCode> {
        let (Some(&Self::TAG), Some(start), Some(frames)) = (
            packet.first(),
            packet.get(1..3).and_then(|b| b.try_into().ok()).map(i16::from_le_bytes),
            packet.get(3..5).and_then(|b| b.try_into().ok()).map(u16::from_le_bytes),
        ) else {
            return Err(DecoderCode::INVALID_PACKET);
        };
        let frames = usize::from(frames);
        let channels = usize::from(self.channels);
        let out = pcm
            .get_mut(..frames.saturating_mul(channels))
            .ok_or(DecoderCode::BUFFER_TOO_SMALL)?;
        let mut value = start;
        for frame in out.chunks_exact_mut(channels.max(1)) {
            frame.fill(value);
            value = value.wrapping_add(1);
        }
        self.packets = self.packets.saturating_add(1);
        Ok(frames)
    }

    fn reset(&mut self) {
        self.resets = self.resets.saturating_add(1);
    }
}
