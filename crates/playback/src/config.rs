//! Player sizing constants and runtime configuration.

use platform::audio_types::{OutOfRangeError, SampleRateHz};

/// Samples (interleaved `i16` words) in one hardware buffer.
///
/// 120 ms of 16 kHz mono, i.e. six 20 ms Opus frames.
pub const HW_BUFFER_SAMPLES: usize = 1920;

/// Capacity of the decode staging buffer, in interleaved samples.
///
/// Holds one hardware buffer's worth of look-ahead plus the whole of the
/// page that crossed the buffer boundary.
pub const STAGING_SAMPLES: usize = 7680; // 4 × HW_BUFFER_SAMPLES

/// Capacity of the page payload buffer. Longer pages are clipped.
pub const PAGE_BUFFER_BYTES: usize = 4096;

/// Largest packet that can be carried across a page boundary.
pub const MAX_PACKET_BYTES: usize = 2550; // two maximum-size 20 ms frames

/// Pages decoding to fewer samples per channel than this are dropped as
/// encoder flush at the end of a stream.
pub const DEFAULT_END_DISCARD_THRESHOLD: usize = 320;

/// Opus decoder output rates.
pub const OPUS_RATES_HZ: [u32; 5] = [8_000, 12_000, 16_000, 24_000, 48_000];

/// Invalid [`PlayerConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// The decode rate is not an Opus output rate.
    UnsupportedRate(OutOfRangeError),
    /// Channel count other than 1 or 2.
    Channels(u8),
    /// The end-discard threshold does not fit in one hardware buffer.
    Threshold(usize),
    /// The decoder's output format differs from the configured one.
    DecoderFormat {
        /// Decoder output rate in Hz.
        rate_hz: u32,
        /// Decoder output channels.
        channels: u8,
    },
    /// The staging buffer cannot hold the two buffers primed before start.
    Staging {
        /// Staging capacity in samples.
        capacity: usize,
        /// Samples needed.
        required: usize,
    },
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::UnsupportedRate(e) => write!(f, "unsupported decode rate: {e}"),
            Self::Channels(n) => write!(f, "unsupported channel count {n}"),
            Self::Threshold(t) => write!(f, "end discard threshold {t} exceeds buffer"),
            Self::DecoderFormat { rate_hz, channels } => {
                write!(f, "decoder outputs {rate_hz} Hz x{channels}, not the configured format")
            }
            Self::Staging { capacity, required } => {
                write!(f, "staging holds {capacity} samples, priming needs {required}")
            }
        }
    }
}

/// Runtime player configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PlayerConfig {
    /// Decoder output rate in Hz.
    pub decode_rate_hz: u32,
    /// Decoder output channels.
    pub channels: u8,
    /// Samples per channel below which the last page of a stream is dropped.
    pub end_discard_threshold: usize,
}

impl PlayerConfig {
    /// Validate the configuration for a hardware buffer of `buffer_samples`.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self, buffer_samples: usize) -> Result<SampleRateHz, ConfigError> {
        let rate = SampleRateHz::new(self.decode_rate_hz).map_err(ConfigError::UnsupportedRate)?;
        if !OPUS_RATES_HZ.contains(&rate.get()) {
            return Err(ConfigError::UnsupportedRate(OutOfRangeError {
                value: rate.get(),
                min: 8_000,
                max: 48_000,
            }));
        }
        if !(1..=2).contains(&self.channels) {
            return Err(ConfigError::Channels(self.channels));
        }
        let per_channel = buffer_samples.checked_div(usize::from(self.channels)).unwrap_or(0);
        if self.end_discard_threshold >= per_channel {
            return Err(ConfigError::Threshold(self.end_discard_threshold));
        }
        Ok(rate)
    }
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            decode_rate_hz: 16_000,
            channels: 1,
            end_discard_threshold: DEFAULT_END_DISCARD_THRESHOLD,
        }
    }
}
