//! Opus playback: page-level decode-ahead into a double-buffered output.
//!
//! Built on the `ogg` demuxer and the `platform` HAL traits. No heap
//! allocation; every buffer is sized by const generics so the whole player
//! can live in `static` memory.
//!
//! # Modules
//!
//! - [`decoder`]: `PacketDecoder` contract and decoder error codes
//! - [`opus_decoder`]: libopus-backed decoder (`opus` feature)
//! - [`staging`]: linear PCM staging buffer
//! - [`pipeline`]: page → packets → PCM, pre-skip, cross-page carry
//! - [`handoff`]: interrupt/poll buffer handoff (`SwapHandoff`)
//! - [`scheduler`]: `PlaybackScheduler` state machine
//! - [`config`]: sizing constants and `PlayerConfig`
//! - `mocks`: deterministic test decoder (`std` only)
//!
//! # Wiring
//!
//! ```ignore
//! static HANDOFF: SwapHandoff<SaiOutput, HW_BUFFER_SAMPLES> = SwapHandoff::new();
//!
//! #[interrupt]
//! fn DMA1_STREAM0() {
//!     HANDOFF.on_buffer_released(released_slot());
//! }
//!
//! HANDOFF.attach(sai);
//! let mut player = DefaultScheduler::new(sd, decoder, &HANDOFF, PlayerConfig::default())?;
//! player.prepare_playback("track.opus").await?;
//! while player.poll_refill().await != PlaybackState::Stopped {
//!     Timer::after_millis(20).await;
//! }
//! ```

#![cfg_attr(not(test), no_std)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]
#![deny(clippy::expect_used)]
#![allow(async_fn_in_trait)]

#[cfg(all(feature = "std", not(test)))]
extern crate std;

#[macro_use]
mod fmt;

pub mod config;
pub mod decoder;
pub mod handoff;
#[cfg(any(test, feature = "std"))]
pub mod mocks;
pub mod opus_decoder;
pub mod pipeline;
pub mod scheduler;
pub mod staging;

pub use config::{ConfigError, PlayerConfig};
pub use decoder::{DecoderCode, PacketDecoder};
pub use handoff::{BufferSlot, BufferTag, SwapHandoff};
pub use opus_decoder::LibOpusDecoder;
pub use pipeline::{DecodePipeline, DecodedPage, PipelineError};
pub use scheduler::{DefaultScheduler, PlaybackError, PlaybackScheduler, PlaybackState, StopReason};
pub use staging::StagingBuffer;
