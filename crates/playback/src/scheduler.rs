//! Playback scheduler.
//!
//! `PlaybackScheduler` owns one playback session at a time and drives it
//! through `Idle → Priming → Playing → Draining → Stopped`:
//!
//! - **Priming** ([`prepare_playback`]): open the file, parse the Opus
//!   headers, decode ahead until both hardware buffers can be filled, load
//!   buffer A, publish buffer B and start the peripheral. Any failure stops
//!   the session.
//! - **Playing** ([`poll_refill`]): whenever the notification has consumed
//!   the published buffer, decode pages into staging until a full buffer is
//!   available and publish it.
//! - **Draining**: the input has ended (end of file, end-of-stream page or
//!   decode failure). Remaining samples are published, the last buffer
//!   zero-padded, and the session stops once the peripheral releases it.
//!
//! A page shorter than the discard threshold is encoder flush only when it
//! ends the stream. Its samples are held back from publishing until the next
//! fetch shows whether another page follows; if none does they are dropped.
//! - **Stopped**: output disabled, file closed, staging cleared. A new
//!   [`prepare_playback`] starts over.
//!
//! Underruns (the peripheral needed a buffer before the poll loop published
//! one) and output faults stop the session from the poll loop.
//!
//! [`prepare_playback`]: PlaybackScheduler::prepare_playback
//! [`poll_refill`]: PlaybackScheduler::poll_refill

use ogg::{DemuxError, IdHeader, OpusHeaders};
use platform::audio::{AudioConfig, I2sOutput};
use platform::audio_types::SampleRateHz;
use platform::storage::{File, Storage};

use crate::config::{
    ConfigError, PlayerConfig, HW_BUFFER_SAMPLES, PAGE_BUFFER_BYTES, STAGING_SAMPLES,
};
use crate::decoder::{DecoderCode, PacketDecoder};
use crate::handoff::SwapHandoff;
use crate::pipeline::{DecodePipeline, PipelineError};
use crate::staging::StagingBuffer;

// ---------------------------------------------------------------------------
// State and errors
// ---------------------------------------------------------------------------

/// Lifecycle state of the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PlaybackState {
    /// No session has been started.
    Idle,
    /// Opening the file and filling the first buffers.
    Priming,
    /// Decoding ahead of the peripheral.
    Playing,
    /// Input exhausted; playing out what is buffered.
    Draining,
    /// Session ended; see [`PlaybackScheduler::stop_reason`].
    Stopped,
}

/// Why the last session stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StopReason {
    /// Everything decoded was played.
    EndOfStream,
    /// The peripheral needed a buffer before one was published.
    Underrun,
    /// Priming failed.
    Failed,
    /// [`PlaybackScheduler::stop`] was called.
    Requested,
    /// The peripheral refused a buffer.
    OutputFault,
}

impl core::fmt::Display for StopReason {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            Self::EndOfStream => "end of stream",
            Self::Underrun => "underrun",
            Self::Failed => "start failed",
            Self::Requested => "stop requested",
            Self::OutputFault => "output fault",
        })
    }
}

/// Errors returned by [`PlaybackScheduler::prepare_playback`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackError<E: core::fmt::Debug> {
    /// A session is already active; stop it first.
    AlreadyPlaying,
    /// Opening the file failed.
    Storage(E),
    /// The stream headers or first pages could not be read.
    Demux(DemuxError<E>),
    /// The decoder rejected the first audio page.
    DecodeFailure(DecoderCode),
    /// The output peripheral refused the format or the start.
    Output,
    /// The stream decodes to no audio.
    NothingToPlay,
}

impl<E: core::fmt::Debug> From<PipelineError<E>> for PlaybackError<E> {
    fn from(e: PipelineError<E>) -> Self {
        match e {
            PipelineError::Demux(e) => Self::Demux(e),
            PipelineError::DecodeFailure(code) => Self::DecodeFailure(code),
        }
    }
}

impl<E: core::fmt::Debug> core::fmt::Display for PlaybackError<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::AlreadyPlaying => f.write_str("already playing"),
            Self::Storage(_) | Self::Demux(DemuxError::Storage(_)) => f.write_str("storage error"),
            Self::Demux(DemuxError::Format(e)) => write!(f, "{e}"),
            Self::DecodeFailure(code) => write!(f, "{code}"),
            Self::Output => f.write_str("output error"),
            Self::NothingToPlay => f.write_str("nothing to play"),
        }
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Resources of the active session: released when playback stops.
struct PlaybackSession<F> {
    file: F,
    headers: Option<OpusHeaders>,
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Decode-ahead scheduler feeding a double-buffered output.
///
/// - `N`: samples per hardware buffer (the [`SwapHandoff`] size).
/// - `STAGING`: decoded samples held between decoder and hardware; at least `2 * N`.
/// - `PAGE`: page payload buffer in bytes.
pub struct PlaybackScheduler<
    'h,
    S: Storage,
    D: PacketDecoder,
    O: I2sOutput,
    const N: usize,
    const STAGING: usize,
    const PAGE: usize,
> {
    storage: S,
    handoff: &'h SwapHandoff<O, N>,
    config: PlayerConfig,
    rate: SampleRateHz,
    pipeline: DecodePipeline<D, PAGE>,
    staging: StagingBuffer<STAGING>,
    session: Option<PlaybackSession<S::File>>,
    state: PlaybackState,
    stop_reason: Option<StopReason>,
    input_done: bool,
    end_marked: bool,
    /// Samples at the tail of staging from a short page that may be the last.
    held: usize,
    played_samples: u64,
}

/// Scheduler sized with the default buffer constants.
pub type DefaultScheduler<'h, S, D, O> =
    PlaybackScheduler<'h, S, D, O, HW_BUFFER_SAMPLES, STAGING_SAMPLES, PAGE_BUFFER_BYTES>;

impl<'h, S, D, O, const N: usize, const STAGING: usize, const PAGE: usize>
    PlaybackScheduler<'h, S, D, O, N, STAGING, PAGE>
where
    S: Storage,
    S::File: File<Error = S::Error>,
    D: PacketDecoder,
    O: I2sOutput,
{
    /// Build an idle scheduler.
    ///
    /// # Errors
    ///
    /// [`ConfigError`] if `config` is invalid for buffers of `N` samples, the
    /// decoder's output format differs from `config`, or `STAGING` is
    /// smaller than two buffers.
    pub fn new(
        storage: S,
        decoder: D,
        handoff: &'h SwapHandoff<O, N>,
        config: PlayerConfig,
    ) -> Result<Self, ConfigError> {
        let rate = config.validate(N)?;
        if decoder.sample_rate() != rate || decoder.channels() != config.channels {
            return Err(ConfigError::DecoderFormat {
                rate_hz: decoder.sample_rate().get(),
                channels: decoder.channels(),
            });
        }
        let required = N.saturating_mul(2);
        if STAGING < required {
            return Err(ConfigError::Staging { capacity: STAGING, required });
        }
        Ok(Self {
            storage,
            handoff,
            config,
            rate,
            pipeline: DecodePipeline::new(decoder),
            staging: StagingBuffer::new(),
            session: None,
            state: PlaybackState::Idle,
            stop_reason: None,
            input_done: false,
            end_marked: false,
            held: 0,
            played_samples: 0,
        })
    }

    /// Current lifecycle state.
    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// Why the last session stopped, once it has.
    pub fn stop_reason(&self) -> Option<StopReason> {
        self.stop_reason
    }

    /// Identification header of the active session.
    pub fn id_header(&self) -> Option<IdHeader> {
        self.session.as_ref().and_then(|s| s.headers).map(|h| h.id)
    }

    /// The storage backend.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// The decoder.
    pub fn decoder(&self) -> &D {
        self.pipeline.decoder()
    }

    /// Samples decoded but not yet published.
    pub fn staged(&self) -> usize {
        self.staging.len()
    }

    /// Milliseconds of audio the peripheral has finished playing this session.
    ///
    /// After a stop, the position the session reached.
    pub fn position_ms(&self) -> u64 {
        let samples = match self.state {
            PlaybackState::Idle | PlaybackState::Stopped => self.played_samples,
            _ => self.handoff.played_samples(),
        };
        let frames = samples.checked_div(u64::from(self.config.channels)).unwrap_or(0);
        frames
            .saturating_mul(1000)
            .checked_div(u64::from(self.rate.get()))
            .unwrap_or(0)
    }

    /// Open `name` and start playing it.
    ///
    /// On success the peripheral is running and the state is `Playing`, or
    /// `Draining` if the whole stream fit in the primed buffers.
    ///
    /// # Errors
    ///
    /// [`PlaybackError::AlreadyPlaying`] while a session is active (state
    /// unchanged). Any other error leaves the scheduler `Stopped` with
    /// [`StopReason::Failed`].
    pub async fn prepare_playback(&mut self, name: &str) -> Result<(), PlaybackError<S::Error>> {
        if matches!(
            self.state,
            PlaybackState::Priming | PlaybackState::Playing | PlaybackState::Draining
        ) {
            return Err(PlaybackError::AlreadyPlaying);
        }

        self.state = PlaybackState::Priming;
        self.stop_reason = None;
        self.played_samples = 0;
        self.input_done = false;
        self.end_marked = false;
        self.held = 0;
        self.staging.clear();
        self.handoff.reset();

        match self.prime(name).await {
            Ok(()) => {
                info!("playing {}", name);
                Ok(())
            }
            Err(e) => {
                warn!("cannot play {}: {}", name, e.as_str());
                self.stop_with(StopReason::Failed).await;
                Err(e)
            }
        }
    }

    async fn prime(&mut self, name: &str) -> Result<(), PlaybackError<S::Error>> {
        let file = self.storage.open_file(name).await.map_err(PlaybackError::Storage)?;
        let session = self.session.insert(PlaybackSession { file, headers: None });

        let headers = self.pipeline.prepare(&mut session.file).await?;
        session.headers = Some(headers);
        info!(
            "{}: {} ch, pre-skip {}, input rate {}",
            name,
            headers.id.channels,
            headers.id.pre_skip,
            headers.id.input_sample_rate
        );
        if headers.id.channels != self.config.channels {
            debug!("stream has {} ch, decoding to {}", headers.id.channels, self.config.channels);
        }

        self.handoff
            .configure(AudioConfig {
                sample_rate: self.rate.get(),
                channels: self.config.channels,
                bit_depth: 16,
            })
            .map_err(|_| PlaybackError::Output)?;

        let target = N.saturating_mul(2);
        while !self.input_done && self.publishable() < target {
            match self.decode_next_page().await {
                Ok(true) => {}
                Ok(false) => break,
                Err(e) if self.staging.is_empty() => return Err(e.into()),
                Err(e) => {
                    warn_pipeline(&e);
                    self.input_done = true;
                }
            }
        }
        if self.staging.is_empty() {
            return Err(PlaybackError::NothingToPlay);
        }

        let staging = &mut self.staging;
        self.handoff.load_initial(|buf| staging.take_front(buf));
        self.publish_next();
        self.handoff.start().map_err(|_| PlaybackError::Output)?;

        self.state = if self.input_done {
            PlaybackState::Draining
        } else {
            PlaybackState::Playing
        };
        Ok(())
    }

    /// Cooperative refill. Call at least once between buffer notifications.
    ///
    /// Acknowledges the last notification, reacts to underrun, fault and
    /// drain signals, and publishes the next buffer once the previous one has
    /// been taken. Returns the state afterwards.
    pub async fn poll_refill(&mut self) -> PlaybackState {
        if !matches!(self.state, PlaybackState::Playing | PlaybackState::Draining) {
            return self.state;
        }

        if self.handoff.take_fault() {
            warn!("output refused a buffer");
            self.stop_with(StopReason::OutputFault).await;
            return self.state;
        }
        if self.handoff.take_underrun() {
            warn!("underrun: buffer needed before refill completed");
            self.stop_with(StopReason::Underrun).await;
            return self.state;
        }
        if self.handoff.take_drained() {
            self.stop_with(StopReason::EndOfStream).await;
            return self.state;
        }

        if self.handoff.acknowledge_release().is_some() {
            trace!("buffer released");
        }

        if !self.end_marked && self.handoff.ready_is_empty() {
            while !self.input_done && self.publishable() < N {
                match self.decode_next_page().await {
                    Ok(true) => {}
                    Ok(false) => break,
                    Err(e) => {
                        warn_pipeline(&e);
                        self.input_done = true;
                    }
                }
            }
            self.publish_next();
        }

        if self.input_done && self.state == PlaybackState::Playing {
            debug!("input finished, draining");
            self.state = PlaybackState::Draining;
        }
        self.state
    }

    /// Stop the active session: output off, file closed, staging cleared.
    ///
    /// No-op unless a session is active.
    pub async fn stop(&mut self) {
        if matches!(self.state, PlaybackState::Idle | PlaybackState::Stopped) {
            return;
        }
        self.stop_with(StopReason::Requested).await;
    }

    async fn stop_with(&mut self, reason: StopReason) {
        self.handoff.stop_output();
        self.played_samples = self.handoff.played_samples();
        if let Some(session) = self.session.take() {
            if session.file.close().await.is_err() {
                warn!("closing the stream failed");
            }
        }
        self.staging.clear();
        self.handoff.reset();
        self.input_done = false;
        self.end_marked = false;
        self.held = 0;
        self.state = PlaybackState::Stopped;
        self.stop_reason = Some(reason);
        info!("playback stopped: {}", reason);
    }

    /// Staged samples that may be published now.
    fn publishable(&self) -> usize {
        self.staging.len().saturating_sub(self.held)
    }

    /// Decode one page (or the next part of a page too large for staging).
    ///
    /// End of file and an end-of-stream page end the input without an error.
    /// A complete page with fewer samples per channel than the discard
    /// threshold is held; it is dropped if the stream ends right after it.
    ///
    /// Returns `false` when staging has no room for the rest of the page.
    async fn decode_next_page(&mut self) -> Result<bool, PipelineError<S::Error>> {
        let Some(session) = self.session.as_mut() else {
            self.input_done = true;
            return Ok(true);
        };
        let page = match self.pipeline.fetch_and_decode_page(&mut session.file, &mut self.staging).await {
            Ok(page) => page,
            Err(e) if e.is_eof() => {
                debug!("end of file");
                self.discard_held();
                self.input_done = true;
                return Ok(true);
            }
            Err(e) => {
                self.held = 0;
                return Err(e);
            }
        };

        if page.packets > 0 && self.held > 0 {
            trace!("short page of {} samples was not the last", self.held);
            self.held = 0;
        }
        let per_channel = page.decoded.checked_div(usize::from(self.config.channels)).unwrap_or(0);
        if page.complete
            && !page.resumed
            && page.packets > 0
            && per_channel < self.config.end_discard_threshold
        {
            self.held = page.committed();
        }
        if page.end_of_stream {
            debug!("end-of-stream page");
            self.discard_held();
            self.input_done = true;
        }
        Ok(page.complete)
    }

    /// Drop the held short page from the tail of staging.
    fn discard_held(&mut self) {
        if self.held == 0 {
            return;
        }
        let keep = self.staging.len().saturating_sub(self.held);
        self.staging.truncate(keep);
        info!("discarding trailing page of {} samples", self.held);
        self.held = 0;
    }

    /// Publish the next hardware buffer if one is due.
    ///
    /// Full buffers are published while input continues; once it has ended
    /// the remainder is zero-padded to a full buffer, published as the last
    /// one, and end of stream is signalled.
    fn publish_next(&mut self) {
        if self.end_marked {
            return;
        }
        let staged = self.staging.len();
        if self.publishable() < N && !self.input_done {
            return;
        }
        if staged == 0 {
            self.handoff.mark_end_of_stream();
            self.end_marked = true;
            return;
        }
        if staged < N {
            let padding = self.staging.pad_to(N);
            debug!("padding last buffer with {} zeros", padding);
        }
        let last = self.input_done && self.staging.len() <= N;
        let staging = &mut self.staging;
        if self.handoff.publish(last, |buf| staging.take_front(buf)).is_none() {
            return;
        }
        if last {
            self.handoff.mark_end_of_stream();
            self.end_marked = true;
        }
    }
}

impl<E: core::fmt::Debug> PlaybackError<E> {
    /// Short description for logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AlreadyPlaying => "already playing",
            Self::Storage(_) => "storage error",
            Self::Demux(DemuxError::Storage(_)) => "storage error while demuxing",
            Self::Demux(DemuxError::Format(_)) => "malformed stream",
            Self::DecodeFailure(_) => "decode failure",
            Self::Output => "output error",
            Self::NothingToPlay => "nothing to play",
        }
    }
}

fn warn_pipeline<E: core::fmt::Debug>(e: &PipelineError<E>) {
    match e {
        PipelineError::DecodeFailure(code) => warn!("decode failed ({}), draining", code.0),
        PipelineError::Demux(DemuxError::Format(f)) => warn!("stream error ({}), draining", f),
        PipelineError::Demux(DemuxError::Storage(_)) => warn!("read error, draining"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::mocks::PatternDecoder;
    use platform::mocks::{MockI2s, MockStorage};

    type Scheduler<'h> = PlaybackScheduler<'h, MockStorage, PatternDecoder, MockI2s, 64, 256, 512>;

    fn config() -> PlayerConfig {
        PlayerConfig { end_discard_threshold: 20, ..PlayerConfig::default() }
    }

    #[test]
    fn rejects_mismatched_decoder() {
        let handoff = SwapHandoff::with_output(MockI2s::new());
        let decoder = PatternDecoder::new(SampleRateHz::FULLBAND, 1);
        let err = Scheduler::new(MockStorage::new(), decoder, &handoff, config()).err();
        assert_eq!(err, Some(ConfigError::DecoderFormat { rate_hz: 48_000, channels: 1 }));
    }

    #[test]
    fn rejects_small_staging() {
        let handoff: SwapHandoff<MockI2s, 64> = SwapHandoff::with_output(MockI2s::new());
        let err = PlaybackScheduler::<_, _, _, 64, 100, 512>::new(
            MockStorage::new(),
            PatternDecoder::mono_16k(),
            &handoff,
            config(),
        )
        .err();
        assert_eq!(err, Some(ConfigError::Staging { capacity: 100, required: 128 }));
    }

    #[tokio::test]
    async fn starts_idle_and_stop_is_noop() {
        let handoff = SwapHandoff::with_output(MockI2s::new());
        let mut s =
            Scheduler::new(MockStorage::new(), PatternDecoder::mono_16k(), &handoff, config()).unwrap();
        assert_eq!(s.state(), PlaybackState::Idle);
        s.stop().await;
        assert_eq!(s.state(), PlaybackState::Idle);
        assert_eq!(s.stop_reason(), None);
        assert_eq!(s.poll_refill().await, PlaybackState::Idle);
    }

    #[tokio::test]
    async fn missing_file_fails_priming() {
        let handoff = SwapHandoff::with_output(MockI2s::new());
        let mut s =
            Scheduler::new(MockStorage::new(), PatternDecoder::mono_16k(), &handoff, config()).unwrap();
        let err = s.prepare_playback("absent.opus").await.unwrap_err();
        assert_eq!(err, PlaybackError::Storage(platform::mocks::MockError::NotFound));
        assert_eq!(s.state(), PlaybackState::Stopped);
        assert_eq!(s.stop_reason(), Some(StopReason::Failed));
    }

    #[test]
    fn stop_reason_display() {
        assert_eq!(StopReason::Underrun.to_string(), "underrun");
        assert_eq!(
            PlaybackError::<()>::Demux(DemuxError::Format(ogg::OggError::BadMagic)).to_string(),
            "bad magic"
        );
    }
}
