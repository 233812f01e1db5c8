//! Type system enforcement tests for audio domain newtypes.

#![allow(clippy::unwrap_used)]

// ── SampleRateHz ─────────────────────────────────────────────────────────────

#[test]
fn sample_rate_accepts_opus_rates() {
    use platform::audio_types::SampleRateHz;
    for hz in [8_000, 12_000, 16_000, 24_000, 48_000] {
        assert_eq!(SampleRateHz::new(hz).map(SampleRateHz::get), Ok(hz));
    }
}

#[test]
fn sample_rate_rejects_below_min() {
    use platform::audio_types::{OutOfRangeError, SampleRateHz};
    assert_eq!(
        SampleRateHz::new(7_999),
        Err(OutOfRangeError { value: 7_999, min: 8_000, max: 768_000 })
    );
}

#[test]
fn sample_rate_is_one_word() {
    use platform::audio_types::SampleRateHz;
    assert_eq!(core::mem::size_of::<SampleRateHz>(), 4);
}

// ── Pre-skip scaling ─────────────────────────────────────────────────────────

#[test]
fn standard_pre_skip_at_16k() {
    use platform::audio_types::SampleRateHz;
    // 312 samples at 48 kHz is 104 samples at 16 kHz.
    let rate = SampleRateHz::new(16_000).unwrap();
    assert_eq!(rate.scale_from_48k(312), 104);
}

#[test]
fn pre_skip_unchanged_at_48k() {
    use platform::audio_types::SampleRateHz;
    let rate = SampleRateHz::new(48_000).unwrap();
    assert_eq!(rate.scale_from_48k(3_840), 3_840);
}

// ── OutOfRangeError ──────────────────────────────────────────────────────────

#[test]
fn out_of_range_error_displays_bounds() {
    use platform::audio_types::OutOfRangeError;
    let e = OutOfRangeError { value: 3, min: 1, max: 2 };
    assert_eq!(e.to_string(), "3 is outside 1..=2");
}
