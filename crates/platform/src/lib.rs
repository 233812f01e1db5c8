//! Hardware Abstraction Layer (HAL) for the Opus DAP
//!
//! This crate provides trait-based abstractions for the two peripherals the
//! streaming player touches, so that the demuxer and scheduler can be
//! developed and tested without physical hardware.
//!
//! # Architecture Layers
//!
//! ```text
//! Application Layer (board support, not in this workspace)
//!         ↓
//! Feature Layers (ogg, playback)
//!         ↓
//! Platform HAL (this crate - trait abstractions)
//!         ↓
//! Hardware Layer (FAT driver, I2S + DMA)
//! ```
//!
//! ## Peripherals
//! - [`Storage`] / [`File`] - block-storage file access
//! - [`I2sOutput`] - double-buffered audio output
//!
//! # Features
//!
//! - `std`: desktop [`storage_local`] implementation and [`mocks`]
//! - `defmt`: Enable defmt logging derives
//!
//! # Example
//!
//! ```no_run
//! use platform::{File, Storage};
//!
//! async fn first_bytes<S: Storage>(storage: &mut S) -> Option<[u8; 4]> {
//!     let mut file = storage.open_file("track.opus").await.ok()?;
//!     let mut magic = [0u8; 4];
//!     file.read(&mut magic).await.ok()?;
//!     Some(magic)
//! }
//! ```

// ── Lint policy ─────────────────────────────────────────────────────────────
#![deny(clippy::unwrap_used)] // no .unwrap() in production code
#![deny(clippy::expect_used)] // no .expect() in production code
#![deny(clippy::panic)] // no panic!() in production code
#![deny(clippy::unreachable)] // no unreachable!() that isn't documented
#![deny(unused_must_use)]
// all Results must be handled
// ────────────────────────────────────────────────────────────────────────────
#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(unsafe_op_in_unsafe_fn)] // unsafe fn body is not implicitly unsafe block
#![warn(clippy::print_stdout)] // prefer tracing/defmt over println! in lib code
#![allow(clippy::must_use_candidate)] // hardware accessors: callers decide
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(async_fn_in_trait)] // Embassy no_std: single-threaded, Send bounds not needed

#[cfg(all(feature = "std", not(test)))]
extern crate std;

pub mod audio;
pub mod audio_types;
pub mod config;
pub mod mocks;
pub mod storage;
#[cfg(any(test, feature = "std"))]
pub mod storage_local;

// Re-export main high-level traits
pub use audio::{AudioConfig, I2sOutput};
pub use audio_types::{OutOfRangeError, SampleRateHz};
pub use storage::{File, Storage};
