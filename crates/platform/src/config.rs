//! Platform configuration constants
//!
//! Storage geometry and environment names shared by every layer. Reference
//! these constants rather than hardcoding values.

/// Environment variable naming the music root for desktop builds.
pub const MUSIC_PATH_ENV: &str = "MUSIC_PATH";

/// Largest single read issued against block storage: one FAT sector.
///
/// Longer reads are split so a single call never stalls the cooperative
/// loop for more than one sector transfer.
pub const MAX_READ_CHUNK: usize = 512;
