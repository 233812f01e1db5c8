//! Packet decoder contract.
//!
//! The Opus bitstream decoder is an external collaborator. This module pins
//! down the narrow contract the pipeline relies on: one packet in, one block
//! of interleaved 16-bit PCM out, or a negative error code. The libopus
//! binding lives in [`crate::opus_decoder`] behind the `opus` feature.
//!
//! # Decoder crate selection rationale
//!
//! * **Opus**: `opusic-sys` (bundled libopus 1.x, built with cmake, no heap
//!   once the decoder state exists). Pure-Rust ports are either `std`-only or
//!   not bit-exact with the reference decoder.

use platform::audio_types::SampleRateHz;

/// Negative status code returned by a decoder (libopus `OPUS_*` error values).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DecoderCode(pub i32);

impl DecoderCode {
    /// One or more invalid/out of range arguments.
    pub const BAD_ARG: Self = Self(-1);
    /// Not enough bytes allocated in the output buffer.
    pub const BUFFER_TOO_SMALL: Self = Self(-2);
    /// An internal error was detected.
    pub const INTERNAL_ERROR: Self = Self(-3);
    /// The compressed data passed is corrupted.
    pub const INVALID_PACKET: Self = Self(-4);
    /// Invalid or unsupported request (also: decoder not compiled in).
    pub const UNIMPLEMENTED: Self = Self(-5);
    /// Memory allocation has failed.
    pub const ALLOC_FAIL: Self = Self(-7);
}

impl core::fmt::Display for DecoderCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "decoder error {}", self.0)
    }
}

/// Stateful packet decoder producing interleaved `i16` PCM.
///
/// Implementations must be `no_std`-safe and must not allocate per packet.
pub trait PacketDecoder {
    /// Output channel count; fixed for the decoder's lifetime.
    fn channels(&self) -> u8;

    /// Output sample rate.
    fn sample_rate(&self) -> SampleRateHz;

    /// Decode one packet into `pcm`.
    ///
    /// # Returns
    ///
    /// `Ok(frames)`: samples *per channel* written to the front of `pcm`
    /// (interleaved, so `frames * channels` words).
    ///
    /// # Errors
    ///
    /// The decoder's negative status, e.g. [`DecoderCode::BUFFER_TOO_SMALL`]
    /// when `pcm` cannot hold the packet's frames.
    fn decode(&mut self, packet: &[u8], pcm: &mut [i16]) -> Result<usize, DecoderCode>;

    /// Reset internal state before a new stream.
    fn reset(&mut self) {}
}
