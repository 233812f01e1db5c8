//! Buffer handoff between the buffer-released interrupt and the poll loop.
//!
//! The output peripheral plays one of two hardware buffers while the other is
//! queued. When it finishes a buffer it raises a notification; the handler
//! ([`SwapHandoff::on_buffer_released`]) refills the released buffer from the
//! one-buffer *ready* slot the poll loop published, or with silence if the
//! poll loop fell behind, and queues it.
//!
//! ```text
//!  poll loop (thread mode)                 notification (interrupt)
//!  ───────────────────────                 ────────────────────────
//!  decode page → staging
//!  publish(staging → ready)  ── Mutex ──►  ready → released buffer
//!  acknowledge_release()     ◄─ AtomicU8 ─ released = slot
//!  take_underrun/drained     ◄─ AtomicBool underrun / drained / fault
//! ```
//!
//! # Concurrency
//!
//! Buffers, tags, the ready slot and the output peripheral live behind an
//! `embassy_sync` blocking mutex with [`CriticalSectionRawMutex`], so each
//! side's access runs with interrupts masked. The released-slot marker is
//! written only by the notification and read-and-cleared only by the poll
//! loop. A second notification that finds the marker still set means the poll
//! loop never ran in between: that is an underrun.
//!
//! The notification side can refill and queue but has no way to stop the
//! session; stopping is only reachable from the poll loop.
//!
//! # Placement
//!
//! [`SwapHandoff::new`] is `const`, so the handoff (and with it both hardware
//! buffers) can live in a `static` where DMA can reach it:
//!
//! ```ignore
//! static HANDOFF: SwapHandoff<SaiOutput, HW_BUFFER_SAMPLES> = SwapHandoff::new();
//! ```

use core::cell::RefCell;
use core::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use platform::audio::{AudioConfig, I2sOutput};

/// One of the two hardware buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BufferSlot {
    /// The buffer handed to the peripheral at start.
    A,
    /// The buffer queued behind it.
    B,
}

impl BufferSlot {
    /// The other buffer.
    #[must_use]
    pub const fn other(self) -> Self {
        match self {
            Self::A => Self::B,
            Self::B => Self::A,
        }
    }

    const fn index(self) -> usize {
        match self {
            Self::A => 0,
            Self::B => 1,
        }
    }

    const fn from_marker(marker: u8) -> Option<Self> {
        match marker {
            0 => Some(Self::A),
            1 => Some(Self::B),
            _ => None,
        }
    }
}

/// Ownership of a hardware buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BufferTag {
    /// Holds nothing to play.
    Idle,
    /// Owned by the peripheral (playing or queued).
    Queued,
    /// Released by the peripheral and being rewritten.
    Refilling,
}

const NO_RELEASE: u8 = u8::MAX;

struct Shared<O, const N: usize> {
    output: Option<O>,
    buffers: [[i16; N]; 2],
    tags: [BufferTag; 2],
    ready: [i16; N],
    ready_full: bool,
    ready_final: bool,
    end_of_stream: bool,
    final_slot: Option<BufferSlot>,
    played_samples: u64,
}

impl<O, const N: usize> Shared<O, N> {
    const fn new() -> Self {
        Self {
            output: None,
            buffers: [[0i16; N]; 2],
            tags: [BufferTag::Idle; 2],
            ready: [0i16; N],
            ready_full: false,
            ready_final: false,
            end_of_stream: false,
            final_slot: None,
            played_samples: 0,
        }
    }

    fn clear_session(&mut self) {
        self.tags = [BufferTag::Idle; 2];
        self.ready_full = false;
        self.ready_final = false;
        self.end_of_stream = false;
        self.final_slot = None;
        self.played_samples = 0;
    }

    fn tag_mut(&mut self, slot: BufferSlot) -> Option<&mut BufferTag> {
        self.tags.get_mut(slot.index())
    }
}

/// Interrupt/poll handoff for a double-buffered output of `N` samples per buffer.
pub struct SwapHandoff<O, const N: usize> {
    shared: Mutex<CriticalSectionRawMutex, RefCell<Shared<O, N>>>,
    released: AtomicU8,
    underrun: AtomicBool,
    drained: AtomicBool,
    fault: AtomicBool,
}

impl<O: I2sOutput, const N: usize> SwapHandoff<O, N> {
    /// Empty handoff with no output attached.
    pub const fn new() -> Self {
        Self {
            shared: Mutex::new(RefCell::new(Shared::new())),
            released: AtomicU8::new(NO_RELEASE),
            underrun: AtomicBool::new(false),
            drained: AtomicBool::new(false),
            fault: AtomicBool::new(false),
        }
    }

    /// Handoff driving `output`.
    pub fn with_output(output: O) -> Self {
        let handoff = Self::new();
        handoff.attach(output);
        handoff
    }

    // ── Notification side ────────────────────────────────────────────────────

    /// Buffer-released notification. Call from the peripheral's interrupt.
    ///
    /// `slot` is the buffer the peripheral no longer needs; at start the
    /// peripheral reports the never-played second buffer ([`BufferSlot::B`]).
    /// Copies the ready slot into it and queues it. With nothing ready the
    /// buffer is queued as silence and an underrun is flagged, unless the
    /// stream has ended, in which case the buffer stays idle and the
    /// session drains once the last queued buffer is released.
    pub fn on_buffer_released(&self, slot: BufferSlot) {
        let previous = self.released.swap(slot as u8, Ordering::AcqRel);

        self.shared.lock(|cell| {
            let mut guard = cell.borrow_mut();
            let s = &mut *guard;
            let index = slot.index();

            if s.tags.get(index) == Some(&BufferTag::Queued) {
                s.played_samples = s.played_samples.saturating_add(N as u64);
            }
            if let Some(tag) = s.tag_mut(slot) {
                *tag = BufferTag::Refilling;
            }

            if s.final_slot == Some(slot) {
                if let Some(tag) = s.tag_mut(slot) {
                    *tag = BufferTag::Idle;
                }
                self.drained.store(true, Ordering::Release);
                return;
            }

            if previous != NO_RELEASE && !s.end_of_stream {
                self.underrun.store(true, Ordering::Release);
            }

            let Shared {
                output,
                buffers,
                tags,
                ready,
                ready_full,
                ready_final,
                end_of_stream,
                final_slot,
                ..
            } = s;
            let (Some(buffer), Some(tag)) = (buffers.get_mut(index), tags.get_mut(index)) else {
                return;
            };

            if *ready_full {
                buffer.copy_from_slice(ready.as_slice());
                *ready_full = false;
                if *ready_final {
                    *final_slot = Some(slot);
                }
            } else if *end_of_stream {
                *tag = BufferTag::Idle;
                if final_slot.is_none() {
                    *final_slot = Some(slot.other());
                }
                return;
            } else {
                self.underrun.store(true, Ordering::Release);
                buffer.fill(0);
            }

            *tag = BufferTag::Queued;
            let queued = output.as_mut().map(|o| o.set_next_buffer(buffer.as_slice()));
            if !matches!(queued, Some(Ok(()))) {
                self.fault.store(true, Ordering::Release);
            }
        });
    }

    // ── Poll side ────────────────────────────────────────────────────────────

    /// Install the output peripheral, replacing any previous one.
    pub fn attach(&self, output: O) {
        self.shared.lock(|cell| cell.borrow_mut().output = Some(output));
    }

    /// Remove and return the output peripheral.
    pub fn detach(&self) -> Option<O> {
        self.shared.lock(|cell| cell.borrow_mut().output.take())
    }

    /// Run `f` on the attached output. `None` if no output is attached.
    pub fn output_mut<R>(&self, f: impl FnOnce(&mut O) -> R) -> Option<R> {
        self.shared.lock(|cell| cell.borrow_mut().output.as_mut().map(f))
    }

    /// Apply `config` to the output.
    ///
    /// # Errors
    ///
    /// `Err(None)` if no output is attached, `Err(Some(e))` if it refused.
    pub fn configure(&self, config: AudioConfig) -> Result<(), Option<O::Error>> {
        self.output_mut(|o| o.configure(config)).ok_or(None)?.map_err(Some)
    }

    /// Fill buffer A (the first to play) through `fill`, zero-padding the rest.
    ///
    /// Returns the number of samples `fill` reported written.
    pub fn load_initial(&self, fill: impl FnOnce(&mut [i16]) -> usize) -> usize {
        self.shared.lock(|cell| {
            let mut guard = cell.borrow_mut();
            let s = &mut *guard;
            let index = BufferSlot::A.index();
            let Some(buffer) = s.buffers.get_mut(index) else {
                return 0;
            };
            let written = fill(buffer.as_mut_slice()).min(N);
            if let Some(tail) = buffer.get_mut(written..) {
                tail.fill(0);
            }
            if let Some(tag) = s.tag_mut(BufferSlot::A) {
                *tag = BufferTag::Queued;
            }
            written
        })
    }

    /// Start the output with buffer A.
    ///
    /// # Errors
    ///
    /// `Err(None)` if no output is attached, `Err(Some(e))` if it refused.
    pub fn start(&self) -> Result<(), Option<O::Error>> {
        self.shared.lock(|cell| {
            let mut guard = cell.borrow_mut();
            let s = &mut *guard;
            let first = s.buffers.get(BufferSlot::A.index()).ok_or(None)?;
            s.output.as_mut().ok_or(None)?.start(first).map_err(Some)
        })
    }

    /// Stop the output. Missing output or a refusal is ignored.
    pub fn stop_output(&self) {
        self.output_mut(|o| {
            let _ = o.stop();
        });
    }

    /// Fill the ready slot through `fill`, zero-padding the rest.
    ///
    /// `last` marks the buffer as the final one of the stream. Returns the
    /// number of samples written, or `None` if the slot was still full.
    pub fn publish(&self, last: bool, fill: impl FnOnce(&mut [i16]) -> usize) -> Option<usize> {
        self.shared.lock(|cell| {
            let mut guard = cell.borrow_mut();
            let s = &mut *guard;
            if s.ready_full {
                return None;
            }
            let written = fill(s.ready.as_mut_slice()).min(N);
            if let Some(tail) = s.ready.get_mut(written..) {
                tail.fill(0);
            }
            s.ready_full = true;
            s.ready_final = last;
            Some(written)
        })
    }

    /// `true` when the notification has consumed the last published buffer.
    pub fn ready_is_empty(&self) -> bool {
        self.shared.lock(|cell| !cell.borrow().ready_full)
    }

    /// Nothing further will be published.
    pub fn mark_end_of_stream(&self) {
        self.shared.lock(|cell| cell.borrow_mut().end_of_stream = true);
    }

    /// Read and clear the released-slot marker.
    pub fn acknowledge_release(&self) -> Option<BufferSlot> {
        BufferSlot::from_marker(self.released.swap(NO_RELEASE, Ordering::AcqRel))
    }

    /// Read and clear the underrun flag.
    pub fn take_underrun(&self) -> bool {
        self.underrun.swap(false, Ordering::AcqRel)
    }

    /// Read and clear the drained flag (last buffer finished playing).
    pub fn take_drained(&self) -> bool {
        self.drained.swap(false, Ordering::AcqRel)
    }

    /// Read and clear the output fault flag (queueing a buffer failed).
    pub fn take_fault(&self) -> bool {
        self.fault.swap(false, Ordering::AcqRel)
    }

    /// Ownership tag of `slot`.
    pub fn tag(&self, slot: BufferSlot) -> BufferTag {
        self.shared
            .lock(|cell| cell.borrow().tags.get(slot.index()).copied())
            .unwrap_or(BufferTag::Idle)
    }

    /// Interleaved samples the peripheral has finished playing this session.
    pub fn played_samples(&self) -> u64 {
        self.shared.lock(|cell| cell.borrow().played_samples)
    }

    /// Forget the current session; the output stays attached.
    pub fn reset(&self) {
        self.shared.lock(|cell| cell.borrow_mut().clear_session());
        self.released.store(NO_RELEASE, Ordering::Release);
        self.underrun.store(false, Ordering::Release);
        self.drained.store(false, Ordering::Release);
        self.fault.store(false, Ordering::Release);
    }
}

impl<O: I2sOutput, const N: usize> Default for SwapHandoff<O, N> {
    fn default() -> Self {
        Self::new()
    }
}
