//! Ogg container demuxer for Opus streams on block storage.
//!
//! Parses page headers and lacing tables, reassembles packets and validates
//! the two Opus header packets, without any general container library and
//! without heap allocation.
//!
//! # Modules
//!
//! - [`page`]: 27-byte page header, lacing table, packet spans
//! - [`stream`]: `OggStream` packet and whole-page reads
//! - [`opus`]: `OpusHead` / `OpusTags` parsing and stream preparation
//! - [`io`]: sector-bounded exact reads and skips over `platform::File`
//! - [`error`]: `OggError` / `DemuxError`
//! - `writer`: in-memory stream builder (`std` only)
//!
//! # Example
//!
//! ```no_run
//! use ogg::{opus::prepare_stream, OggStream};
//! use platform::Storage;
//!
//! async fn channels<S: Storage>(storage: &mut S) -> Option<u8> {
//!     let mut file = storage.open_file("track.opus").await.ok()?;
//!     let mut stream = OggStream::new();
//!     let headers = prepare_stream(&mut stream, &mut file).await.ok()?;
//!     Some(headers.id.channels)
//! }
//! ```

#![cfg_attr(not(test), no_std)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]
#![deny(clippy::expect_used)]
#![allow(async_fn_in_trait)]

#[cfg(all(feature = "std", not(test)))]
extern crate std;

pub mod error;
pub mod io;
pub mod opus;
pub mod page;
pub mod stream;
#[cfg(any(test, feature = "std"))]
pub mod writer;

// Top-level re-exports for convenience
pub use error::{DemuxError, OggError};
pub use opus::{prepare_stream, CommentHeader, IdHeader, OpusHeaders};
pub use page::{PacketSpan, PageFlags, PageHeader};
pub use stream::OggStream;
