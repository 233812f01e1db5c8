//! Byte-level helpers over [`platform::File`].

use platform::config::MAX_READ_CHUNK;
use platform::storage::File;

use crate::error::{DemuxError, OggError};

/// Fill `buf` completely, reading at most [`MAX_READ_CHUNK`] bytes per call.
///
/// # Errors
///
/// Returns [`OggError::Eof`] if the file ends first; the bytes read so far
/// are left in `buf`.
pub async fn read_exact<F: File>(file: &mut F, buf: &mut [u8]) -> Result<(), DemuxError<F::Error>> {
    for chunk in buf.chunks_mut(MAX_READ_CHUNK) {
        let mut filled = 0usize;
        while let Some(rest) = chunk.get_mut(filled..).filter(|r| !r.is_empty()) {
            let n = file.read(rest).await.map_err(DemuxError::Storage)?;
            if n == 0 {
                return Err(OggError::Eof.into());
            }
            filled = filled.saturating_add(n);
        }
    }
    Ok(())
}

/// Advance the read position by `count` bytes without reading them.
///
/// # Errors
///
/// Returns [`OggError::Eof`] if the skip lands past the end of the file.
pub async fn skip<F: File>(file: &mut F, count: usize) -> Result<(), DemuxError<F::Error>> {
    if count == 0 {
        return Ok(());
    }
    let delta = i64::try_from(count).unwrap_or(i64::MAX);
    let pos = file.seek_relative(delta).await.map_err(DemuxError::Storage)?;
    if pos > file.size() {
        return Err(OggError::Eof.into());
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use platform::mocks::MockStorage;
    use platform::Storage;

    #[tokio::test]
    async fn read_exact_splits_into_sector_reads() {
        let data: std::vec::Vec<u8> = (0..=255u8).cycle().take(1300).collect();
        let mut storage = MockStorage::new();
        storage.insert("t", &data);
        let stats = storage.stats();
        let mut file = storage.open_file("t").await.unwrap();
        let mut buf = [0u8; 1300];
        read_exact(&mut file, &mut buf).await.unwrap();
        assert_eq!(&buf[..], &data[..]);
        assert_eq!(stats.reads(), 3);
    }

    #[tokio::test]
    async fn read_exact_retries_short_reads() {
        let mut storage = MockStorage::new().with_max_read(7);
        storage.insert("t", &[9u8; 40]);
        let mut file = storage.open_file("t").await.unwrap();
        let mut buf = [0u8; 40];
        read_exact(&mut file, &mut buf).await.unwrap();
        assert_eq!(buf, [9u8; 40]);
    }

    #[tokio::test]
    async fn read_exact_reports_eof() {
        let mut storage = MockStorage::new();
        storage.insert("t", b"abc");
        let mut file = storage.open_file("t").await.unwrap();
        let mut buf = [0u8; 4];
        let err = read_exact(&mut file, &mut buf).await.unwrap_err();
        assert_eq!(err, DemuxError::Format(OggError::Eof));
    }

    #[tokio::test]
    async fn skip_then_read() {
        let mut storage = MockStorage::new();
        storage.insert("t", b"0123456789");
        let mut file = storage.open_file("t").await.unwrap();
        skip(&mut file, 6).await.unwrap();
        let mut buf = [0u8; 4];
        read_exact(&mut file, &mut buf).await.unwrap();
        assert_eq!(&buf, b"6789");
    }

    #[tokio::test]
    async fn skip_to_end_is_fine_but_past_it_is_eof() {
        let mut storage = MockStorage::new();
        storage.insert("t", b"0123456789");
        let mut file = storage.open_file("t").await.unwrap();
        skip(&mut file, 10).await.unwrap();
        let err = skip(&mut file, 1).await.unwrap_err();
        assert_eq!(err, DemuxError::Format(OggError::Eof));
    }
}
