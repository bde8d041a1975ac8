use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, info};

use crate::models::config::NormalizerConfig;
use crate::models::error::MixdownError;

/// Per-channel measurements from pass 1 and the gain derived from them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelProfile {
    pub peak_linear: f32,
    pub peak_db: f32,
    pub gain_linear: f32,
    pub is_active: bool,
}

impl ChannelProfile {
    /// Derive a profile from a channel's peak absolute amplitude.
    ///
    /// A channel at or below the silence threshold is inactive and keeps
    /// unity gain, so the noise floor is never boosted. Active channels are
    /// brought to the target peak, with the boost clamped at the maximum.
    pub fn from_peak(peak_linear: f32, config: &NormalizerConfig) -> Self {
        let peak_db = linear_to_db(peak_linear);
        if peak_db <= config.silence_threshold_db {
            return Self {
                peak_linear,
                peak_db,
                gain_linear: 1.0,
                is_active: false,
            };
        }
        let gain_db = (config.target_peak_db - peak_db).min(config.max_gain_db);
        Self {
            peak_linear,
            peak_db,
            gain_linear: db_to_linear(gain_db),
            is_active: true,
        }
    }
}

/// Outcome of a normalization call.
#[derive(Debug, Clone, PartialEq)]
pub enum NormalizeOutcome {
    /// The input was mixed down to a new mono artifact.
    Normalized {
        output: PathBuf,
        profiles: [ChannelProfile; 2],
    },
    /// The input was not exactly 2-channel and is returned unchanged.
    PassedThrough { output: PathBuf },
}

impl NormalizeOutcome {
    pub fn output(&self) -> &Path {
        match self {
            Self::Normalized { output, .. } | Self::PassedThrough { output } => output,
        }
    }
}

/// Offline two-pass loudness normalizer and mono mixdown.
///
/// Pass 1 streams the finished stereo file in fixed windows to find each
/// channel's peak amplitude; pass 2 re-streams it, applies per-channel
/// gain, mixes to mono with soft clipping, and publishes the result
/// atomically. Memory stays O(window) regardless of recording length.
///
/// The operation is sequential and long-running; it never runs on the
/// real-time path and can be cancelled from another thread via
/// `request_cancel`.
pub struct TwoPassNormalizer {
    config: NormalizerConfig,
    cancelled: AtomicBool,
}

impl TwoPassNormalizer {
    pub fn new(config: NormalizerConfig) -> Result<Self, MixdownError> {
        config.validate().map_err(MixdownError::InvalidConfiguration)?;
        Ok(Self {
            config,
            cancelled: AtomicBool::new(false),
        })
    }

    /// Request cancellation; the normalizer checks between windows and
    /// removes any partially written output.
    pub fn request_cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Normalize a finished stereo recording into a mono artifact.
    ///
    /// Non-stereo input passes through unchanged. The mono output keeps
    /// the input's sample rate and sample format and is written next to it
    /// as `{stem}.mono.wav`, published atomically on success.
    pub fn normalize(&self, input: &Path) -> Result<NormalizeOutcome, MixdownError> {
        let stream = open_stream(input)?;
        if stream.spec.channels != 2 {
            debug!(
                "{} has {} channels, passing through unchanged",
                input.display(),
                stream.spec.channels
            );
            return Ok(NormalizeOutcome::PassedThrough {
                output: input.to_path_buf(),
            });
        }

        let profiles = self.scan_peaks(stream)?;
        debug!(
            "pass 1: left {:.1} dB (gain {:.3}), right {:.1} dB (gain {:.3})",
            profiles[0].peak_db, profiles[0].gain_linear, profiles[1].peak_db,
            profiles[1].gain_linear
        );

        let output = self.write_mono(input, &profiles)?;
        info!("normalized {} -> {}", input.display(), output.display());
        Ok(NormalizeOutcome::Normalized { output, profiles })
    }

    /// Pass 1: running per-channel peak over fixed windows.
    fn scan_peaks(&self, mut stream: WavStream) -> Result<[ChannelProfile; 2], MixdownError> {
        let window_len = self.config.window_frames * 2;
        let mut window = Vec::with_capacity(window_len);
        let mut peaks = [0.0f32; 2];

        loop {
            if self.cancelled.load(Ordering::SeqCst) {
                return Err(MixdownError::Cancelled);
            }
            fill_window(&mut stream.samples, window_len, &mut window)?;
            if window.is_empty() {
                break;
            }
            for frame in window.chunks_exact(2) {
                peaks[0] = peaks[0].max(frame[0].abs());
                peaks[1] = peaks[1].max(frame[1].abs());
            }
            if window.len() < window_len {
                break;
            }
        }

        Ok([
            ChannelProfile::from_peak(peaks[0], &self.config),
            ChannelProfile::from_peak(peaks[1], &self.config),
        ])
    }

    /// Pass 2: re-stream, apply gain, mix to mono, publish atomically.
    fn write_mono(
        &self,
        input: &Path,
        profiles: &[ChannelProfile; 2],
    ) -> Result<PathBuf, MixdownError> {
        let mut stream = open_stream(input)?;
        let output = input.with_extension("mono.wav");
        let temp = input.with_extension("mono.wav.part");

        let out_spec = hound::WavSpec {
            channels: 1,
            sample_rate: stream.spec.sample_rate,
            bits_per_sample: stream.spec.bits_per_sample,
            sample_format: stream.spec.sample_format,
        };

        match self.run_pass2(&mut stream, &temp, out_spec, profiles) {
            Ok(()) => {
                fs::rename(&temp, &output).map_err(|e| {
                    MixdownError::Io(format!("cannot publish {}: {e}", output.display()))
                })?;
                Ok(output)
            }
            Err(e) => {
                // A failed or cancelled pass must not leave a half-written
                // artifact visible.
                let _ = fs::remove_file(&temp);
                Err(e)
            }
        }
    }

    fn run_pass2(
        &self,
        stream: &mut WavStream,
        temp: &Path,
        out_spec: hound::WavSpec,
        profiles: &[ChannelProfile; 2],
    ) -> Result<(), MixdownError> {
        let mut writer = hound::WavWriter::create(temp, out_spec)
            .map_err(|e| MixdownError::Io(format!("cannot create {}: {e}", temp.display())))?;

        let window_len = self.config.window_frames * 2;
        let mut window = Vec::with_capacity(window_len);
        let int_peak = ((1u64 << (out_spec.bits_per_sample - 1)) - 1) as f32;

        loop {
            if self.cancelled.load(Ordering::SeqCst) {
                return Err(MixdownError::Cancelled);
            }
            fill_window(&mut stream.samples, window_len, &mut window)?;
            if window.is_empty() {
                break;
            }
            for frame in window.chunks_exact(2) {
                let mono = soft_clip(mix_frame(frame[0], frame[1], profiles));
                match out_spec.sample_format {
                    hound::SampleFormat::Float => writer.write_sample(mono),
                    hound::SampleFormat::Int => {
                        writer.write_sample((mono.clamp(-1.0, 1.0) * int_peak) as i32)
                    }
                }
                .map_err(|e| MixdownError::Io(format!("write failed: {e}")))?;
            }
            if window.len() < window_len {
                break;
            }
        }

        writer
            .finalize()
            .map_err(|e| MixdownError::Io(format!("finalize failed: {e}")))
    }
}

/// Mix one stereo frame down to mono according to channel activity.
fn mix_frame(left: f32, right: f32, profiles: &[ChannelProfile; 2]) -> f32 {
    match (profiles[0].is_active, profiles[1].is_active) {
        (true, true) => 0.5 * (left * profiles[0].gain_linear + right * profiles[1].gain_linear),
        (true, false) => left * profiles[0].gain_linear,
        (false, true) => right * profiles[1].gain_linear,
        (false, false) => 0.0,
    }
}

/// Saturating nonlinearity applied near full scale.
///
/// Samples below the 0.9 knee pass unchanged; louder samples are replaced
/// by `tanh(x)`, bounding output to (-1, 1) without hard digital clipping.
pub fn soft_clip(x: f32) -> f32 {
    if x.abs() < 0.9 {
        x
    } else {
        x.tanh()
    }
}

pub fn db_to_linear(db: f32) -> f32 {
    10f32.powf(db / 20.0)
}

/// `20·log10(x)`, or negative infinity for exact silence.
pub fn linear_to_db(linear: f32) -> f32 {
    if linear > 0.0 {
        20.0 * linear.log10()
    } else {
        f32::NEG_INFINITY
    }
}

/// A WAV file as a stream of f32 samples, whatever its storage format.
struct WavStream {
    spec: hound::WavSpec,
    samples: Box<dyn Iterator<Item = Result<f32, hound::Error>>>,
}

fn open_stream(path: &Path) -> Result<WavStream, MixdownError> {
    let reader = hound::WavReader::open(path)
        .map_err(|e| MixdownError::Io(format!("cannot open {}: {e}", path.display())))?;
    let spec = reader.spec();

    let samples: Box<dyn Iterator<Item = Result<f32, hound::Error>>> =
        match (spec.sample_format, spec.bits_per_sample) {
            (hound::SampleFormat::Float, 32) => Box::new(reader.into_samples::<f32>()),
            (hound::SampleFormat::Int, bits @ 1..=32) => {
                let scale = (1u64 << (bits - 1)) as f32;
                Box::new(
                    reader
                        .into_samples::<i32>()
                        .map(move |s| s.map(|v| v as f32 / scale)),
                )
            }
            (format, bits) => {
                return Err(MixdownError::Io(format!(
                    "unsupported sample format {format:?}/{bits} in {}",
                    path.display()
                )))
            }
        };

    Ok(WavStream { spec, samples })
}

/// Refill `window` with up to `max_len` samples; empty at end of stream.
fn fill_window(
    samples: &mut Box<dyn Iterator<Item = Result<f32, hound::Error>>>,
    max_len: usize,
    window: &mut Vec<f32>,
) -> Result<(), MixdownError> {
    window.clear();
    while window.len() < max_len {
        match samples.next() {
            Some(Ok(sample)) => window.push(sample),
            Some(Err(e)) => return Err(MixdownError::Io(format!("read failed: {e}"))),
            None => break,
        }
    }
    Ok(())
}
