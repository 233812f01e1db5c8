//! Audio domain newtypes for compile-time safety.
//!
//! - `SampleRateHz`: validates 8000–768000 Hz range

// ── Error type ───────────────────────────────────────────────────────────────

/// Error returned when a value is out of the valid range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct OutOfRangeError {
    /// The value that was out of range.
    pub value: u32,
    /// The inclusive minimum allowed value.
    pub min: u32,
    /// The inclusive maximum allowed value.
    pub max: u32,
}

impl core::fmt::Display for OutOfRangeError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{} is outside {}..={}", self.value, self.min, self.max)
    }
}

// ── SampleRateHz ─────────────────────────────────────────────────────────────

/// Sample rate in Hz, validated to the range the output path supports.
///
/// Valid range: 8000–768000 Hz (8 kHz to 768 kHz PCM).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(transparent)]
pub struct SampleRateHz(u32);

impl SampleRateHz {
    /// Minimum supported sample rate: 8000 Hz (telephony).
    pub const MIN_HZ: u32 = 8_000;

    /// Maximum supported sample rate: 768000 Hz.
    pub const MAX_HZ: u32 = 768_000;

    /// 16 kHz, the wideband Opus output rate.
    pub const WIDEBAND: Self = Self(16_000);

    /// 48 kHz, the Opus reference rate.
    pub const FULLBAND: Self = Self(48_000);

    /// Create a `SampleRateHz`, returning an error if out of 8000–768000 Hz.
    ///
    /// # Errors
    ///
    /// Returns [`OutOfRangeError`] if `hz < 8000` or `hz > 768000`.
    pub fn new(hz: u32) -> Result<Self, OutOfRangeError> {
        if hz < Self::MIN_HZ || hz > Self::MAX_HZ {
            Err(OutOfRangeError {
                value: hz,
                min: Self::MIN_HZ,
                max: Self::MAX_HZ,
            })
        } else {
            Ok(Self(hz))
        }
    }

    /// Return the sample rate in Hz.
    #[must_use]
    pub fn get(self) -> u32 {
        self.0
    }

    /// Convert a sample count at 48 kHz to the equivalent count at this rate.
    ///
    /// Rounds down. Opus expresses pre-skip and granule positions at 48 kHz
    /// regardless of the decoder's output rate.
    #[must_use]
    pub fn scale_from_48k(self, samples_48k: u32) -> u32 {
        let scaled = u64::from(samples_48k)
            .saturating_mul(u64::from(self.0))
            .checked_div(48_000)
            .unwrap_or(0);
        u32::try_from(scaled).unwrap_or(u32::MAX)
    }
}
