//! Shared fixtures: synthetic Opus files and a stand-in for the DMA interrupt.

#![allow(
    dead_code,
    clippy::unwrap_used,
    clippy::panic,
    clippy::arithmetic_side_effects,
    clippy::cast_possible_wrap
)]

use ogg::writer::StreamWriter;
use ogg::IdHeader;
use platform::mocks::{MockI2s, MockStorage};
use playback::mocks::PatternDecoder;
use playback::{
    BufferSlot, PlaybackScheduler, PlaybackState, PlayerConfig, SwapHandoff,
};

/// Samples per hardware buffer in these tests.
pub const N: usize = 64;

pub type Handoff = SwapHandoff<MockI2s, N>;
pub type Scheduler<'h> = PlaybackScheduler<'h, MockStorage, PatternDecoder, MockI2s, N, 256, 512>;

pub fn config() -> PlayerConfig {
    PlayerConfig { end_discard_threshold: 20, ..PlayerConfig::default() }
}

pub fn id_header(pre_skip: u16) -> IdHeader {
    IdHeader {
        version: 1,
        channels: 1,
        pre_skip,
        input_sample_rate: 16_000,
        output_gain: 0,
        mapping_family: 0,
    }
}

/// Opus file with one page per entry of `pages`, each page holding one
/// packet per `frames` value. Samples ramp continuously from 0.
pub fn ramp_file(pre_skip: u16, pages: &[&[u16]]) -> Vec<u8> {
    let mut w = StreamWriter::new(7);
    w.write_opus_headers(&id_header(pre_skip), "pattern");
    let mut next: i16 = 0;
    for page in pages {
        let packets: Vec<Vec<u8>> = page
            .iter()
            .map(|&frames| {
                let p = PatternDecoder::packet(next, frames);
                next = next.wrapping_add(frames as i16);
                p
            })
            .collect();
        let refs: Vec<&[u8]> = packets.iter().map(Vec::as_slice).collect();
        w.write_packets(&refs);
    }
    w.finish()
}

/// Storage holding `bytes` as "track.opus".
pub fn storage_with(bytes: &[u8]) -> MockStorage {
    let mut storage = MockStorage::new();
    storage.insert("track.opus", bytes);
    storage
}

pub fn scheduler<'h>(storage: MockStorage, handoff: &'h Handoff) -> Scheduler<'h> {
    Scheduler::new(storage, PatternDecoder::mono_16k(), handoff, config()).unwrap()
}

/// Buffer-released interrupts in the order the peripheral raises them: the
/// idle second buffer right after start, then alternately A and B.
pub struct HardwareSim {
    next: BufferSlot,
}

impl HardwareSim {
    pub fn new() -> Self {
        Self { next: BufferSlot::B }
    }

    pub fn release(&mut self, handoff: &Handoff) {
        handoff.on_buffer_released(self.next);
        self.next = self.next.other();
    }
}

/// Alternate interrupt and poll until the session stops.
pub async fn play_to_end(scheduler: &mut Scheduler<'_>, handoff: &Handoff) -> usize {
    let mut sim = HardwareSim::new();
    for step in 0..10_000 {
        sim.release(handoff);
        if scheduler.poll_refill().await == PlaybackState::Stopped {
            return step + 1;
        }
    }
    panic!("playback did not finish");
}

/// Everything the mock peripheral played.
pub fn played(handoff: &Handoff) -> Vec<i16> {
    handoff.output_mut(|o| o.played()).unwrap()
}
