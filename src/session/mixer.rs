use log::{debug, error, warn};
use parking_lot::Mutex;

use crate::models::audio_models::{MixerDiagnostics, RawAudioBuffer, SourceId, StereoChunk};
use crate::models::config::MixerConfig;
use crate::models::error::MixdownError;
use crate::models::recording_result::RecordingResult;
use crate::models::state::MixerState;
use crate::processing::converter::SampleConverter;
use crate::processing::ring_buffer::RingBuffer;
use crate::traits::encoder_sink::EncoderSink;

/// One source's conversion and buffering lane.
struct SourceLane {
    converter: SampleConverter,
    ring: RingBuffer,
}

/// Everything a session mutates, behind one lock.
///
/// A single ordering domain guarantees every chunk is assembled from a
/// consistent snapshot of both rings; no interleaving can split a source's
/// contribution across two chunks.
struct MixerInner {
    state: MixerState,
    primary: Option<SourceLane>,
    secondary: Option<SourceLane>,
    sink: Option<Box<dyn EncoderSink>>,
    diagnostics: MixerDiagnostics,
}

impl MixerInner {
    fn lane_mut(&mut self, source: SourceId) -> Option<&mut SourceLane> {
        match source {
            SourceId::Primary => self.primary.as_mut(),
            SourceId::Secondary => self.secondary.as_mut(),
        }
    }

    /// Largest unread count across the enabled rings.
    fn max_available(&self) -> usize {
        let primary = self.primary.as_ref().map_or(0, |l| l.ring.available());
        let secondary = self.secondary.as_ref().map_or(0, |l| l.ring.available());
        primary.max(secondary)
    }

    /// Cut `frames` from every enabled ring; short rings zero-pad their
    /// tail and absent sources contribute pure silence.
    fn cut_chunk(&mut self, frames: usize) -> StereoChunk {
        let left = match self.primary.as_mut() {
            Some(lane) => lane.ring.take(frames),
            None => vec![0.0; frames],
        };
        let right = match self.secondary.as_mut() {
            Some(lane) => lane.ring.take(frames),
            None => vec![0.0; frames],
        };
        StereoChunk::new(left, right)
    }

    fn teardown(&mut self) {
        self.primary = None;
        self.secondary = None;
        self.sink = None;
        self.state = MixerState::Idle;
    }
}

/// Serializes two independently-clocked producers into stereo chunks.
///
/// The primary source (microphone) fills the left output channel, the
/// secondary (system audio) the right. Capture backends call
/// `append_primary`/`append_secondary` from their own contexts in any
/// relative order; synchronization between the two is approximate
/// (ring-buffer draining within one buffering window), not timestamp-based.
///
/// Data flow, one lane per enabled source:
/// ```text
/// [primary backend]   → [SampleConverter] → [RingBuffer] ─┐
///                                                          ├→ [StereoChunk] → [EncoderSink]
/// [secondary backend] → [SampleConverter] → [RingBuffer] ─┘
/// ```
///
/// Share via `Arc`; every method takes `&self` and serializes on one
/// internal lock. Sink writes happen inside that lock and may block
/// briefly on I/O, so backends should hand buffers over rather than call
/// append inline from a real-time audio callback.
pub struct StreamMixer {
    config: MixerConfig,
    inner: Mutex<MixerInner>,
}

impl StreamMixer {
    pub fn new(config: MixerConfig) -> Result<Self, MixdownError> {
        config.validate().map_err(MixdownError::InvalidConfiguration)?;
        Ok(Self {
            config,
            inner: Mutex::new(MixerInner {
                state: MixerState::Idle,
                primary: None,
                secondary: None,
                sink: None,
                diagnostics: MixerDiagnostics::default(),
            }),
        })
    }

    pub fn state(&self) -> MixerState {
        self.inner.lock().state
    }

    pub fn diagnostics(&self) -> MixerDiagnostics {
        self.inner.lock().diagnostics
    }

    /// Begin a session: allocate lanes for the enabled sources and install
    /// the encoder sink.
    pub fn start(&self, sink: Box<dyn EncoderSink>) -> Result<(), MixdownError> {
        let mut inner = self.inner.lock();
        if !inner.state.is_idle() {
            return Err(MixdownError::AlreadyRunning);
        }

        inner.primary = self.config.enable_primary.then(|| self.make_lane());
        inner.secondary = self.config.enable_secondary.then(|| self.make_lane());
        inner.sink = Some(sink);
        inner.diagnostics = MixerDiagnostics::default();
        inner.state = MixerState::Recording;

        debug!(
            "session started (primary={}, secondary={}, chunk={} frames)",
            self.config.enable_primary, self.config.enable_secondary, self.config.chunk_frames
        );
        Ok(())
    }

    /// Feed a raw buffer from the primary (microphone) source.
    pub fn append_primary(&self, buffer: RawAudioBuffer) -> Result<(), MixdownError> {
        self.append(SourceId::Primary, buffer)
    }

    /// Feed a raw buffer from the secondary (system audio) source.
    pub fn append_secondary(&self, buffer: RawAudioBuffer) -> Result<(), MixdownError> {
        self.append(SourceId::Secondary, buffer)
    }

    /// Flush remaining frames as one final partial chunk, finalize the
    /// sink, and return the finished artifact.
    pub fn stop(&self) -> Result<RecordingResult, MixdownError> {
        let mut inner = self.inner.lock();
        if !inner.state.is_recording() {
            return Err(MixdownError::NoActiveSession);
        }
        inner.state = MixerState::Stopping;

        // Up to the longer of the two availables; the short side zero-pads.
        let remaining = inner.max_available();
        if remaining > 0 {
            let chunk = inner.cut_chunk(remaining);
            self.write_chunk(&mut inner, chunk)?;
        }

        let Some(sink) = inner.sink.take() else {
            inner.teardown();
            return Err(MixdownError::NoActiveSession);
        };
        let result = sink.finish();
        inner.teardown();
        let result = result?;

        debug!(
            "session stopped: {} frames -> {}",
            result.frames,
            result.file_path.display()
        );
        Ok(result)
    }

    /// Stop without flushing: buffered audio is discarded and the partial
    /// artifact deleted.
    pub fn cancel(&self) -> Result<(), MixdownError> {
        let mut inner = self.inner.lock();
        if !inner.state.is_recording() {
            return Err(MixdownError::NoActiveSession);
        }
        inner.state = MixerState::Cancelling;

        let discarded = inner.max_available();
        if let Some(sink) = inner.sink.take() {
            sink.abort();
        }
        inner.teardown();

        debug!("session cancelled, {} buffered frames discarded", discarded);
        Ok(())
    }

    fn make_lane(&self) -> SourceLane {
        SourceLane {
            converter: SampleConverter::new(self.config.sample_rate),
            ring: RingBuffer::new(self.config.ring_capacity),
        }
    }

    fn append(&self, source: SourceId, buffer: RawAudioBuffer) -> Result<(), MixdownError> {
        let mut inner = self.inner.lock();
        if !inner.state.is_recording() {
            // Backends may deliver a trailing buffer after a stop race.
            debug!("append from {:?} outside an active session, ignoring", source);
            return Ok(());
        }

        match source {
            SourceId::Primary => inner.diagnostics.primary_appends += 1,
            SourceId::Secondary => inner.diagnostics.secondary_appends += 1,
        }

        let converted = match inner.lane_mut(source) {
            Some(lane) => lane.converter.convert(&buffer),
            None => {
                warn!("append from {:?} but that source is not enabled", source);
                return Ok(());
            }
        };
        let mono = match converted {
            Ok(mono) => mono,
            Err(e) if e.is_recoverable() => {
                // A single bad buffer must never take down the session.
                warn!("dropping {:?} buffer: {e}", source);
                inner.diagnostics.buffers_dropped += 1;
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        inner.diagnostics.frames_converted += mono.frame_count() as u64;
        if let Some(lane) = inner.lane_mut(source) {
            lane.ring.append(mono.samples());
        }

        self.drain(&mut inner)
    }

    /// Cut and encode full chunks while *either* enabled ring can fill one.
    ///
    /// "Either, not both" is the asymmetry-tolerance policy: a fast source
    /// never waits on a slow one; the slow side's shortfall is padded with
    /// silence. Under sustained one-sided overload this repeatedly favors
    /// the fast source, trading small gaps for bounded buffering.
    fn drain(&self, inner: &mut MixerInner) -> Result<(), MixdownError> {
        while inner.max_available() >= self.config.chunk_frames {
            let chunk = inner.cut_chunk(self.config.chunk_frames);
            self.write_chunk(inner, chunk)?;
        }
        Ok(())
    }

    fn write_chunk(&self, inner: &mut MixerInner, chunk: StereoChunk) -> Result<(), MixdownError> {
        let Some(sink) = inner.sink.as_mut() else {
            return Err(MixdownError::NoActiveSession);
        };
        if let Err(e) = sink.write_chunk(&chunk) {
            // Terminal: no retry. Tear the session down, discard the
            // partial artifact, surface the failure.
            error!("encoder sink failed, aborting session: {e}");
            if let Some(sink) = inner.sink.take() {
                sink.abort();
            }
            inner.teardown();
            return Err(e);
        }
        inner.diagnostics.chunks_written += 1;
        inner.diagnostics.frames_written += chunk.frame_count() as u64;
        Ok(())
    }
}
