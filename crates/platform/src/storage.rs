//! Storage abstraction for file systems
//!
//! Files are read sequentially with occasional forward skips. Implementations
//! on FAT block storage should serve reads of up to one sector
//! ([`crate::config::MAX_READ_CHUNK`]) without blocking for long.

/// Storage trait for file system access
pub trait Storage {
    /// Error type
    type Error: core::fmt::Debug;
    /// File type
    type File: File;

    /// Open file for reading
    fn open_file(
        &mut self,
        path: &str,
    ) -> impl core::future::Future<Output = Result<Self::File, Self::Error>>;

    /// Check if path exists
    fn exists(
        &mut self,
        path: &str,
    ) -> impl core::future::Future<Output = Result<bool, Self::Error>>;
}

/// File trait for reading files
pub trait File {
    /// Error type
    type Error: core::fmt::Debug;

    /// Read from current position.
    ///
    /// Returns the number of bytes read; `Ok(0)` means end of file. A read may
    /// return fewer bytes than requested before end of file.
    fn read(
        &mut self,
        buf: &mut [u8],
    ) -> impl core::future::Future<Output = Result<usize, Self::Error>>;

    /// Seek to an absolute position
    fn seek(&mut self, pos: u64) -> impl core::future::Future<Output = Result<u64, Self::Error>>;

    /// Seek relative to the current position, returning the new position.
    ///
    /// Seeking past the end of the file is allowed; the next read returns `Ok(0)`.
    fn seek_relative(
        &mut self,
        delta: i64,
    ) -> impl core::future::Future<Output = Result<u64, Self::Error>>;

    /// Get file size
    fn size(&self) -> u64;

    /// Close the file, releasing the underlying handle.
    fn close(self) -> impl core::future::Future<Output = Result<(), Self::Error>>
    where
        Self: Sized;
}
