//! Packet assembly over a sequence of pages.
//!
//! [`OggStream`] holds the demux state of one open file: the current page
//! header and the index of the next unconsumed lacing segment. It owns no
//! file; every call borrows the file it reads from, so one session value can
//! be moved between tasks together with its file handle.

use platform::storage::File;

use crate::error::{DemuxError, OggError};
use crate::io::{read_exact, skip};
use crate::page::{PageHeader, LACING_CONTINUE};

/// Demux position within a single logical Ogg stream.
#[derive(Debug, Clone, Default)]
pub struct OggStream {
    page: Option<PageHeader>,
    next_segment: usize,
    pages_read: u32,
}

impl OggStream {
    /// Create a stream positioned before the first page.
    #[must_use]
    pub const fn new() -> Self {
        Self { page: None, next_segment: 0, pages_read: 0 }
    }

    /// Forget the current page, e.g. after seeking the file back to 0.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// The most recently read page header.
    #[must_use]
    pub fn page(&self) -> Option<&PageHeader> {
        self.page.as_ref()
    }

    /// Pages read since creation or the last [`reset`](Self::reset).
    #[must_use]
    pub fn pages_read(&self) -> u32 {
        self.pages_read
    }

    /// `true` when every segment of the current page has been consumed.
    #[must_use]
    pub fn page_exhausted(&self) -> bool {
        self.page.as_ref().map_or(true, |p| self.next_segment >= p.segment_count())
    }

    /// Read the next page header and lacing table, returning the page's data length.
    ///
    /// The file must be positioned at a page boundary.
    ///
    /// # Errors
    ///
    /// See [`PageHeader::read`].
    pub async fn read_page_header<F: File>(
        &mut self,
        file: &mut F,
    ) -> Result<usize, DemuxError<F::Error>> {
        let header = PageHeader::read(file).await?;
        let len = header.data_length();
        self.page = Some(header);
        self.next_segment = 0;
        self.pages_read = self.pages_read.saturating_add(1);
        Ok(len)
    }

    /// Mark the rest of the current page as consumed by the caller.
    ///
    /// Used after reading a page payload directly (header packets).
    pub fn consume_page(&mut self) {
        self.next_segment = self.page.as_ref().map_or(0, PageHeader::segment_count);
    }

    /// Read the next packet into `dest`, returning its length.
    ///
    /// A packet is a run of 255-valued segments closed by a segment below 255
    /// and may span pages; new pages are pulled as needed. Bytes beyond
    /// `dest.len()` are skipped so the stream stays on a packet boundary, and
    /// the returned length is the number of bytes written.
    ///
    /// # Errors
    ///
    /// Returns [`OggError::Eof`] if the file holds fewer bytes than the
    /// lacing table promised, plus every error of [`PageHeader::read`].
    pub async fn next_packet<F: File>(
        &mut self,
        file: &mut F,
        dest: &mut [u8],
    ) -> Result<usize, DemuxError<F::Error>> {
        let mut written = 0usize;
        loop {
            if self.page_exhausted() {
                self.read_page_header(file).await?;
            }
            let lace = self
                .page
                .as_ref()
                .and_then(|p| p.segment(self.next_segment))
                .ok_or(OggError::NoSegments)?;
            self.next_segment = self.next_segment.saturating_add(1);

            let len = usize::from(lace);
            let room = dest.len().saturating_sub(written);
            let take = len.min(room);
            let end = written.saturating_add(take);
            if let Some(slot) = dest.get_mut(written..end) {
                read_exact(file, slot).await?;
            }
            skip(file, len.saturating_sub(take)).await?;
            written = end;

            if lace < LACING_CONTINUE {
                return Ok(written);
            }
        }
    }

    /// Read an entire page payload into `dest`, returning the bytes written.
    ///
    /// Any unconsumed segments of the current page are skipped first. The
    /// payload is clipped to `dest.len()`; the clipped tail is skipped so the
    /// next call starts on a page boundary. The page's lacing table is
    /// available from [`page`](Self::page) afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`OggError::Eof`] if the payload is truncated, plus every error
    /// of [`PageHeader::read`].
    pub async fn next_data_page<F: File>(
        &mut self,
        file: &mut F,
        dest: &mut [u8],
    ) -> Result<usize, DemuxError<F::Error>> {
        if let Some(page) = self.page.as_ref() {
            let rest = page.data_length_from(self.next_segment);
            skip(file, rest).await?;
            self.consume_page();
        }
        let len = self.read_page_header(file).await?;
        let take = len.min(dest.len());
        if let Some(slot) = dest.get_mut(..take) {
            read_exact(file, slot).await?;
        }
        skip(file, len.saturating_sub(take)).await?;
        self.consume_page();
        Ok(take)
    }
}
