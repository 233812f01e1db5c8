//! libopus-backed packet decoder.
//!
//! Implements [`PacketDecoder`] over the reference C decoder through
//! `opusic-sys`.
//!
//! # Feature flag
//!
//! The `opusic-sys` dependency and the real decode path are both gated behind
//! the `opus` feature so the crate builds on hosts without a C toolchain.
//! Without it, [`LibOpusDecoder::new`] fails with
//! [`DecoderCode::UNIMPLEMENTED`].

use platform::audio_types::SampleRateHz;

use crate::decoder::{DecoderCode, PacketDecoder};

// ─── Implementation ───────────────────────────────────────────────────────────

/// Opus decoder backed by libopus.
///
/// The decoder state is allocated once by `opus_decoder_create`; decoding
/// itself never allocates.
pub struct LibOpusDecoder {
    rate: SampleRateHz,
    channels: u8,
    #[cfg(feature = "opus")]
    inner: core::ptr::NonNull<opusic_sys::OpusDecoder>,
}

impl LibOpusDecoder {
    /// Create a decoder producing `channels` interleaved channels at `rate`.
    ///
    /// # Errors
    ///
    /// The libopus status if the decoder cannot be created (unsupported
    /// rate/channels, allocation failure), or [`DecoderCode::UNIMPLEMENTED`]
    /// without the `opus` feature.
    pub fn new(rate: SampleRateHz, channels: u8) -> Result<Self, DecoderCode> {
        #[cfg(feature = "opus")]
        {
            let fs = i32::try_from(rate.get()).map_err(|_| DecoderCode::BAD_ARG)?;
            let mut status: i32 = 0;
            // SAFETY: `status` is a valid out-pointer for the duration of the call.
            let raw = unsafe {
                opusic_sys::opus_decoder_create(fs, i32::from(channels), &mut status)
            };
            if status != 0 {
                return Err(DecoderCode(status));
            }
            let inner = core::ptr::NonNull::new(raw).ok_or(DecoderCode::ALLOC_FAIL)?;
            Ok(Self { rate, channels, inner })
        }

        #[cfg(not(feature = "opus"))]
        {
            let _ = (rate, channels);
            Err(DecoderCode::UNIMPLEMENTED)
        }
    }
}

impl PacketDecoder for LibOpusDecoder {
    fn channels(&self) -> u8 {
        self.channels
    }

    fn sample_rate(&self) -> SampleRateHz {
        self.rate
    }

    /// # libopus API
    ///
    /// `opus_decode(st, data, len, pcm, frame_size, decode_fec) -> c_int`
    ///
    /// - `frame_size` is the per-channel capacity of `pcm`.
    /// - Returns the per-channel sample count, or a negative `OPUS_*` error.
    fn decode(&mut self, packet: &[u8], pcm: &mut [i16]) -> Result<usize, DecoderCode> {
        #[cfg(feature = "opus")]
        {
            let len = i32::try_from(packet.len()).map_err(|_| DecoderCode::BAD_ARG)?;
            let per_channel = pcm.len().checked_div(usize::from(self.channels)).unwrap_or(0);
            let frame_size = i32::try_from(per_channel).unwrap_or(i32::MAX);
            // SAFETY: `inner` was returned by `opus_decoder_create` and is only
            // freed in `Drop`. `packet` is valid for `len` bytes and `pcm` for
            // `frame_size * channels` samples.
            let n = unsafe {
                opusic_sys::opus_decode(
                    self.inner.as_ptr(),
                    packet.as_ptr(),
                    len,
                    pcm.as_mut_ptr(),
                    frame_size,
                    0,
                )
            };
            usize::try_from(n).map_err(|_| DecoderCode(n))
        }

        #[cfg(not(feature = "opus"))]
        {
            let _ = (packet, pcm);
            Err(DecoderCode::UNIMPLEMENTED)
        }
    }

    fn reset(&mut self) {
        #[cfg(feature = "opus")]
        {
            let fs = i32::try_from(self.rate.get()).unwrap_or(16_000);
            // SAFETY: `inner` points to a live decoder of the size
            // `opus_decoder_create` allocated for these parameters.
            let status = unsafe {
                opusic_sys::opus_decoder_init(self.inner.as_ptr(), fs, i32::from(self.channels))
            };
            if status != 0 {
                warn!("opus decoder reset failed ({})", status);
            }
        }
    }
}

#[cfg(feature = "opus")]
impl Drop for LibOpusDecoder {
    fn drop(&mut self) {
        // SAFETY: `inner` came from `opus_decoder_create` and is not used after this.
        unsafe { opusic_sys::opus_decoder_destroy(self.inner.as_ptr()) };
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[cfg(not(feature = "opus"))]
    #[test]
    fn without_feature_new_is_unimplemented() {
        let rate = SampleRateHz::new(16_000).unwrap();
        assert_eq!(LibOpusDecoder::new(rate, 1).err(), Some(DecoderCode::UNIMPLEMENTED));
    }

    #[cfg(feature = "opus")]
    #[test]
    fn creates_mono_16k_decoder() {
        let rate = SampleRateHz::new(16_000).unwrap();
        let dec = LibOpusDecoder::new(rate, 1).unwrap();
        assert_eq!(dec.channels(), 1);
        assert_eq!(dec.sample_rate().get(), 16_000);
    }

    #[cfg(feature = "opus")]
    #[test]
    fn rejects_non_opus_rate() {
        let rate = SampleRateHz::new(44_100).unwrap();
        assert_eq!(LibOpusDecoder::new(rate, 1).err(), Some(DecoderCode::BAD_ARG));
    }

    #[cfg(feature = "opus")]
    #[test]
    fn decodes_after_reset() {
        let rate = SampleRateHz::new(16_000).unwrap();
        let mut dec = LibOpusDecoder::new(rate, 1).unwrap();
        dec.reset();
        // TOC only: one empty 20 ms CELT frame, decoded as concealment.
        let mut pcm = [0i16; 960];
        assert_eq!(dec.decode(&[0xF8], &mut pcm), Ok(320));
    }
}
