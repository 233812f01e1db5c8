//! Const-generic, stack-allocated staging buffer for decoded PCM.
//!
//! `StagingBuffer<N>` accumulates up to `N` interleaved `i16` samples between
//! the decoder and the hardware buffers. Decoders write straight into the
//! free tail ([`spare_mut`](StagingBuffer::spare_mut) then
//! [`commit`](StagingBuffer::commit)); the scheduler drains whole hardware
//! buffers from the front.
//!
//! # Constraints
//!
//! - Linear, not circular: decoders need one contiguous output slice. Draining
//!   from the front moves the remainder down (at most `N` samples per buffer
//!   swap, on the poll path only).
//! - The backing store lives inside the scheduler, so its size is a const generic.
//! - Owned by the cooperative poll path; never touched from interrupt context.

/// A fixed-capacity linear buffer of interleaved `i16` samples.
pub struct StagingBuffer<const N: usize> {
    buf: [i16; N],
    /// Number of valid samples at the front of `buf`.
    len: usize,
}

impl<const N: usize> StagingBuffer<N> {
    /// Create a new, empty staging buffer.
    pub const fn new() -> Self {
        Self { buf: [0i16; N], len: 0 }
    }

    /// Free space after the valid samples, for a decoder to write into.
    pub fn spare_mut(&mut self) -> &mut [i16] {
        self.buf.get_mut(self.len..).unwrap_or(&mut [])
    }

    /// Mark `n` samples written into [`spare_mut`](Self::spare_mut) as valid.
    ///
    /// Clamped to the remaining capacity.
    pub fn commit(&mut self, n: usize) {
        self.len = self.len.saturating_add(n).min(N);
    }

    /// Valid samples.
    pub fn as_slice(&self) -> &[i16] {
        self.buf.get(..self.len).unwrap_or(&[])
    }

    /// Move up to `out.len()` samples from the front into `out`.
    ///
    /// Returns the number of samples moved; the rest shift to the front.
    pub fn take_front(&mut self, out: &mut [i16]) -> usize {
        let n = out.len().min(self.len);
        if let (Some(dst), Some(src)) = (out.get_mut(..n), self.buf.get(..n)) {
            dst.copy_from_slice(src);
        }
        self.buf.copy_within(n..self.len, 0);
        self.len = self.len.saturating_sub(n);
        n
    }

    /// Zero-fill up to `target` valid samples (clamped to capacity).
    ///
    /// Returns the number of padding samples added.
    pub fn pad_to(&mut self, target: usize) -> usize {
        let target = target.min(N);
        let added = target.saturating_sub(self.len);
        if let Some(tail) = self.buf.get_mut(self.len..target) {
            tail.fill(0);
        }
        self.len = self.len.max(target);
        added
    }

    /// Drop samples beyond `len`.
    pub fn truncate(&mut self, len: usize) {
        self.len = self.len.min(len);
    }

    /// Discard everything.
    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// Number of valid samples.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Maximum number of samples the buffer can hold.
    pub const fn capacity(&self) -> usize {
        N
    }

    /// `true` when no samples are present.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl<const N: usize> Default for StagingBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}
