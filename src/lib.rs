//! # mixdown-core
//!
//! Platform-agnostic dual-source audio mixdown library.
//!
//! Merges two independently-clocked, independently-formatted PCM sources
//! (primary = microphone, secondary = system loopback) into one
//! interleaved stereo file with bounded memory, then normalizes the
//! finished recording down to a mono deliverable in a streaming two-pass
//! step.
//!
//! Platform capture backends live outside this crate: whatever callback or
//! event-loop mechanism delivers their buffers is adapted at the boundary
//! into plain `append_primary`/`append_secondary` calls on [`StreamMixer`].
//! Encoders implement the [`EncoderSink`] trait; [`WavFileSink`] is the
//! bundled WAV implementation.
//!
//! ## Architecture
//!
//! ```text
//! mixdown-core (this crate)
//! ├── traits/       ← EncoderSink
//! ├── models/       ← MixdownError, MixerState, configs, buffers, results
//! ├── processing/   ← SampleConverter, RingBuffer, TwoPassNormalizer, WAV header
//! ├── session/      ← StreamMixer (serialized orchestrator)
//! └── storage/      ← WavFileSink, metadata sidecar
//! ```
//!
//! ## Data flow
//!
//! ```text
//! [mic backend]    → append_primary   ─┐
//!                                      ├→ convert → ring buffer ─┐
//! [system backend] → append_secondary ─┘                         ├→ stereo chunks → sink
//!                                                                ┘
//! stop() → finished stereo artifact → TwoPassNormalizer → mono artifact
//! ```

pub mod models;
pub mod processing;
pub mod session;
pub mod storage;
pub mod traits;

// Re-export key types at crate root for convenience.
pub use models::audio_models::{
    FormatTag, MixerDiagnostics, MonoBuffer, RawAudioBuffer, SampleData, SampleFormat, SourceId,
    StereoChunk,
};
pub use models::config::{MixerConfig, NormalizerConfig};
pub use models::error::MixdownError;
pub use models::recording_result::{RecordingMetadata, RecordingResult};
pub use models::state::MixerState;
pub use processing::converter::SampleConverter;
pub use processing::normalizer::{ChannelProfile, NormalizeOutcome, TwoPassNormalizer};
pub use processing::ring_buffer::RingBuffer;
pub use session::mixer::StreamMixer;
pub use storage::wav_sink::WavFileSink;
pub use traits::encoder_sink::EncoderSink;

#[cfg(test)]
mod tests {
    //! End-to-end pipeline coverage: record through the real WAV sink,
    //! then normalize the finished artifact.

    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn record_then_normalize_full_pipeline() {
        let dir = tempfile::tempdir().unwrap();
        let config = MixerConfig {
            chunk_frames: 480,
            ring_capacity: 2_400,
            enable_secondary: false,
            ..Default::default()
        };
        let mixer = StreamMixer::new(config.clone()).unwrap();
        let sink = WavFileSink::create(dir.path(), &config).unwrap();
        mixer.start(Box::new(sink)).unwrap();

        // Primary-only session: the right channel stays pure silence and
        // must come out of the normalizer marked inactive.
        for _ in 0..5 {
            mixer
                .append_primary(RawAudioBuffer::f32(vec![0.1; 480], 48_000, 1))
                .unwrap();
        }
        let result = mixer.stop().unwrap();
        assert!(result.file_path.exists());
        assert_eq!(result.frames, 2_400);

        let normalizer = TwoPassNormalizer::new(NormalizerConfig {
            window_frames: 512,
            ..Default::default()
        })
        .unwrap();
        let outcome = normalizer.normalize(&result.file_path).unwrap();

        let NormalizeOutcome::Normalized { output, profiles } = outcome else {
            panic!("expected Normalized outcome");
        };
        assert!(profiles[0].is_active);
        assert!(!profiles[1].is_active);

        let mut reader = hound::WavReader::open(&output).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.sample_rate, 48_000);

        // 0.1 peak (-20 dB) boosted toward -3 dB; stays below the clip
        // knee, so samples land at peak * gain exactly.
        let expected = 0.1 * profiles[0].gain_linear;
        let samples: Vec<f32> = reader
            .samples::<i32>()
            .map(|s| s.unwrap() as f32 / 32_768.0)
            .collect();
        assert_eq!(samples.len(), 2_400);
        for sample in samples {
            assert_relative_eq!(sample, expected, epsilon = 1e-3);
        }
    }
}
