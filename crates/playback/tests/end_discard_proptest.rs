//! Property tests for how a stream's last page reaches the output.

#![allow(
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::panic
)]

mod common;

use common::{play_to_end, played, ramp_file, scheduler, storage_with, Handoff, N};
use embassy_futures::block_on;
use platform::mocks::MockI2s;
use playback::StopReason;
use proptest::prelude::*;

proptest! {
    /// A last page below the discard threshold never plays; any other last
    /// page plays in full, and the output is always whole buffers with
    /// silence after the last decoded sample.
    #[test]
    fn last_page_discarded_or_padded(full_pages in 1usize..6, last in 1u16..64) {
        let body: &[u16] = &[40];
        let tail = [last];
        let mut pages: Vec<&[u16]> = vec![body; full_pages];
        pages.push(&tail);
        let bytes = ramp_file(0, &pages);

        let handoff = Handoff::with_output(MockI2s::new());
        let mut s = scheduler(storage_with(&bytes), &handoff);
        block_on(async {
            s.prepare_playback("track.opus").await.unwrap();
            play_to_end(&mut s, &handoff).await;
        });

        let kept = if usize::from(last) < common::config().end_discard_threshold {
            40 * full_pages
        } else {
            40 * full_pages + usize::from(last)
        };
        let out = played(&handoff);
        prop_assert_eq!(out.len(), kept.div_ceil(N) * N);
        prop_assert!(out[..kept].iter().enumerate().all(|(i, &v)| v == i as i16));
        prop_assert!(out[kept..].iter().all(|&v| v == 0));
        prop_assert_eq!(s.stop_reason(), Some(StopReason::EndOfStream));
    }

    /// Pre-skip removes exactly the scaled count from the front of the output.
    #[test]
    fn pre_skip_trims_the_front(pre_skip_48k in 0u16..=480) {
        let body: &[u16] = &[40];
        let bytes = ramp_file(pre_skip_48k, &[body; 6]);

        let handoff = Handoff::with_output(MockI2s::new());
        let mut s = scheduler(storage_with(&bytes), &handoff);
        block_on(async {
            s.prepare_playback("track.opus").await.unwrap();
            play_to_end(&mut s, &handoff).await;
        });

        let skipped = usize::from(pre_skip_48k) / 3;
        let out = played(&handoff);
        prop_assert_eq!(out.first().copied(), Some(skipped as i16));
        let kept = 240 - skipped;
        prop_assert!(out[..kept].iter().enumerate().all(|(i, &v)| v == (i + skipped) as i16));
    }
}
