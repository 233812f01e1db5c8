//! Audio output abstraction
//!
//! The output peripheral (SAI/I2S fed by DMA) plays one buffer while the next
//! one is queued. When it finishes a buffer it raises a "buffer released"
//! interrupt; the handler must queue the following buffer with
//! [`I2sOutput::set_next_buffer`] before the current one runs out.

use crate::audio_types::{OutOfRangeError, SampleRateHz};

/// Double-buffered audio output peripheral.
///
/// Methods are synchronous: [`I2sOutput::set_next_buffer`] is called from
/// interrupt context and must only program the DMA descriptor.
///
/// The slices handed to [`start`](I2sOutput::start) and
/// [`set_next_buffer`](I2sOutput::set_next_buffer) stay valid until the
/// peripheral releases them; callers keep the backing storage in a `static`.
pub trait I2sOutput {
    /// Error type
    type Error: core::fmt::Debug;

    /// Apply the output format. Called before [`start`](I2sOutput::start).
    fn configure(&mut self, config: AudioConfig) -> Result<(), Self::Error>;

    /// Start playback with `first` as the initial playing buffer.
    fn start(&mut self, first: &[i16]) -> Result<(), Self::Error>;

    /// Queue `next` to play after the current buffer.
    fn set_next_buffer(&mut self, next: &[i16]) -> Result<(), Self::Error>;

    /// Stop playback and disable the peripheral.
    fn stop(&mut self) -> Result<(), Self::Error>;
}

/// Audio configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AudioConfig {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels (1 = mono, 2 = stereo)
    pub channels: u8,
    /// Bit depth (16 or 24)
    pub bit_depth: u8,
}

impl AudioConfig {
    /// Check the configuration against what the output path supports.
    ///
    /// # Errors
    ///
    /// Returns [`OutOfRangeError`] for the first field out of range: sample
    /// rate outside [`SampleRateHz`] bounds, channels outside 1–2, or a bit
    /// depth other than 16 or 24.
    pub fn validate(&self) -> Result<(), OutOfRangeError> {
        SampleRateHz::new(self.sample_rate)?;
        if !(1..=2).contains(&self.channels) {
            return Err(OutOfRangeError { value: u32::from(self.channels), min: 1, max: 2 });
        }
        if self.bit_depth != 16 && self.bit_depth != 24 {
            return Err(OutOfRangeError { value: u32::from(self.bit_depth), min: 16, max: 24 });
        }
        Ok(())
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            channels: 1,
            bit_depth: 16,
        }
    }
}
