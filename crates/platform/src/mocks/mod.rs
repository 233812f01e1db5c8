//! Mock implementations for testing
//!
//! This module provides mock implementations of all platform traits
//! for use in unit and integration tests.

#![cfg(any(test, feature = "std"))]

use std::cell::Cell;
use std::rc::Rc;
use std::string::String;
use std::vec::Vec;

use crate::audio::{AudioConfig, I2sOutput};
use crate::storage::{File, Storage};

/// Error returned by the mock peripherals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockError {
    /// No file registered under the requested path.
    NotFound,
    /// Injected failure.
    Injected,
}

/// Open/close bookkeeping shared between a [`MockStorage`] and its files.
#[derive(Debug, Default)]
pub struct FileStats {
    opened: Cell<usize>,
    closed: Cell<usize>,
    reads: Cell<usize>,
}

impl FileStats {
    /// Files opened so far.
    pub fn opened(&self) -> usize {
        self.opened.get()
    }

    /// Files closed so far.
    pub fn closed(&self) -> usize {
        self.closed.get()
    }

    /// Files currently open.
    pub fn open_handles(&self) -> usize {
        self.opened.get().saturating_sub(self.closed.get())
    }

    /// `read` calls served so far, across all files.
    pub fn reads(&self) -> usize {
        self.reads.get()
    }
}

/// Mock in-memory storage
pub struct MockStorage {
    files: Vec<(String, Rc<[u8]>)>,
    max_read: usize,
    stats: Rc<FileStats>,
}

impl MockStorage {
    /// Create an empty mock storage
    pub fn new() -> Self {
        Self {
            files: Vec::new(),
            max_read: usize::MAX,
            stats: Rc::new(FileStats::default()),
        }
    }

    /// Register `data` under `path`.
    pub fn insert(&mut self, path: &str, data: &[u8]) {
        self.files.retain(|(name, _)| name != path);
        self.files.push((String::from(path), Rc::from(data)));
    }

    /// Limit every `read` to at most `max_read` bytes, like a sector-bound driver.
    pub fn with_max_read(mut self, max_read: usize) -> Self {
        self.max_read = max_read.max(1);
        self
    }

    /// Shared open/close/read counters.
    pub fn stats(&self) -> Rc<FileStats> {
        Rc::clone(&self.stats)
    }
}

impl Default for MockStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl Storage for MockStorage {
    type Error = MockError;
    type File = MockFile;

    async fn open_file(&mut self, path: &str) -> Result<Self::File, Self::Error> {
        let data = self
            .files
            .iter()
            .find(|(name, _)| name == path)
            .map(|(_, data)| Rc::clone(data))
            .ok_or(MockError::NotFound)?;
        self.stats.opened.set(self.stats.opened.get().saturating_add(1));
        Ok(MockFile {
            data,
            pos: 0,
            max_read: self.max_read,
            stats: Rc::clone(&self.stats),
        })
    }

    async fn exists(&mut self, path: &str) -> Result<bool, Self::Error> {
        Ok(self.files.iter().any(|(name, _)| name == path))
    }
}

/// Mock file reading from a shared byte slice
pub struct MockFile {
    data: Rc<[u8]>,
    pos: u64,
    max_read: usize,
    stats: Rc<FileStats>,
}

impl MockFile {
    /// Open a standalone file over `data` (not tracked by any storage).
    pub fn from_bytes(data: &[u8]) -> Self {
        Self {
            data: Rc::from(data),
            pos: 0,
            max_read: usize::MAX,
            stats: Rc::new(FileStats::default()),
        }
    }

    /// Current read position.
    pub fn position(&self) -> u64 {
        self.pos
    }
}

impl File for MockFile {
    type Error = MockError;

    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        self.stats.reads.set(self.stats.reads.get().saturating_add(1));
        let start = usize::try_from(self.pos).unwrap_or(usize::MAX);
        let remaining = self.data.get(start..).unwrap_or(&[]);
        let n = remaining.len().min(buf.len()).min(self.max_read);
        if let (Some(dst), Some(src)) = (buf.get_mut(..n), remaining.get(..n)) {
            dst.copy_from_slice(src);
        }
        self.pos = self.pos.saturating_add(n as u64);
        Ok(n)
    }

    async fn seek(&mut self, pos: u64) -> Result<u64, Self::Error> {
        self.pos = pos;
        Ok(pos)
    }

    async fn seek_relative(&mut self, delta: i64) -> Result<u64, Self::Error> {
        self.pos = self.pos.saturating_add_signed(delta);
        Ok(self.pos)
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    async fn close(self) -> Result<(), Self::Error> {
        self.stats.closed.set(self.stats.closed.get().saturating_add(1));
        Ok(())
    }
}

/// Mock audio output recording every buffer handed to the "hardware"
pub struct MockI2s {
    config: Option<AudioConfig>,
    running: bool,
    started_with: Vec<i16>,
    queued: Vec<Vec<i16>>,
    stop_count: usize,
    fail_start: bool,
}

impl MockI2s {
    /// Create new mock output
    pub fn new() -> Self {
        Self {
            config: None,
            running: false,
            started_with: Vec::new(),
            queued: Vec::new(),
            stop_count: 0,
            fail_start: false,
        }
    }

    /// Make the next `start` call fail.
    pub fn failing_start(mut self) -> Self {
        self.fail_start = true;
        self
    }

    /// Check if playing
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Format applied by the last `configure` call.
    pub fn config(&self) -> Option<AudioConfig> {
        self.config
    }

    /// Contents of the buffer passed to `start`.
    pub fn started_with(&self) -> &[i16] {
        &self.started_with
    }

    /// Contents of every buffer passed to `set_next_buffer`, in order.
    pub fn queued(&self) -> &[Vec<i16>] {
        &self.queued
    }

    /// Everything the peripheral would play: the start buffer then each queued one.
    pub fn played(&self) -> Vec<i16> {
        let mut all = self.started_with.clone();
        for buf in &self.queued {
            all.extend_from_slice(buf);
        }
        all
    }

    /// Number of `stop` calls.
    pub fn stop_count(&self) -> usize {
        self.stop_count
    }
}

impl Default for MockI2s {
    fn default() -> Self {
        Self::new()
    }
}

impl I2sOutput for MockI2s {
    type Error = MockError;

    fn configure(&mut self, config: AudioConfig) -> Result<(), Self::Error> {
        self.config = Some(config);
        Ok(())
    }

    fn start(&mut self, first: &[i16]) -> Result<(), Self::Error> {
        if self.fail_start {
            self.fail_start = false;
            return Err(MockError::Injected);
        }
        self.running = true;
        self.started_with = first.to_vec();
        Ok(())
    }

    fn set_next_buffer(&mut self, next: &[i16]) -> Result<(), Self::Error> {
        self.queued.push(next.to_vec());
        Ok(())
    }

    fn stop(&mut self) -> Result<(), Self::Error> {
        self.running = false;
        self.stop_count = self.stop_count.saturating_add(1);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_storage_counts_open_and_close() {
        let mut storage = MockStorage::new();
        storage.insert("a.opus", b"OggS");
        let stats = storage.stats();
        let file = storage.open_file("a.opus").await.unwrap();
        assert_eq!(stats.open_handles(), 1);
        file.close().await.unwrap();
        assert_eq!(stats.opened(), 1);
        assert_eq!(stats.closed(), 1);
        assert_eq!(stats.open_handles(), 0);
    }

    #[tokio::test]
    async fn mock_file_honours_max_read() {
        let mut storage = MockStorage::new().with_max_read(3);
        storage.insert("a.opus", b"OggS\x00");
        let mut file = storage.open_file("a.opus").await.unwrap();
        let mut buf = [0u8; 5];
        assert_eq!(file.read(&mut buf).await.unwrap(), 3);
        assert_eq!(&buf[..3], b"Ogg");
    }

    #[tokio::test]
    async fn mock_file_reads_zero_past_end() {
        let mut file = MockFile::from_bytes(b"xy");
        file.seek_relative(10).await.unwrap();
        let mut buf = [0u8; 4];
        assert_eq!(file.read(&mut buf).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let mut storage = MockStorage::new();
        assert_eq!(storage.open_file("nope").await.err(), Some(MockError::NotFound));
    }

    #[test]
    fn mock_i2s_records_played_samples() {
        let mut out = MockI2s::new();
        out.start(&[1, 2]).unwrap();
        out.set_next_buffer(&[3, 4]).unwrap();
        assert_eq!(out.played(), vec![1, 2, 3, 4]);
        out.stop().unwrap();
        assert!(!out.is_running());
    }
}
