use log::debug;
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

use crate::models::audio_models::{FormatTag, MonoBuffer, RawAudioBuffer, SampleData};
use crate::models::error::MixdownError;

/// Converts raw capture buffers to canonical-rate mono.
///
/// One long-lived instance per source, reused across calls. The sinc
/// resampler is fixed-input-size, so it is rebuilt whenever the effective
/// input format changes: the buffer's format tag (device switch) or the
/// delivered frame count.
pub struct SampleConverter {
    canonical_rate: u32,
    resampler: Option<SincFixedIn<f32>>,
    resampler_input_frames: usize,
    current_tag: Option<FormatTag>,
}

impl SampleConverter {
    pub fn new(canonical_rate: u32) -> Self {
        Self {
            canonical_rate,
            resampler: None,
            resampler_input_frames: 0,
            current_tag: None,
        }
    }

    /// Convert one raw buffer to canonical-rate mono.
    ///
    /// An error means this buffer is unusable; the caller drops it and the
    /// session continues.
    pub fn convert(&mut self, raw: &RawAudioBuffer) -> Result<MonoBuffer, MixdownError> {
        if raw.channels == 0 {
            return Err(MixdownError::ConversionFailed(
                "buffer has zero channels".into(),
            ));
        }
        if raw.sample_rate == 0 {
            return Err(MixdownError::ConversionFailed(
                "buffer has zero sample rate".into(),
            ));
        }

        let mono = decode_to_mono(raw)?;
        if mono.is_empty() || raw.sample_rate == self.canonical_rate {
            return Ok(MonoBuffer::new(mono));
        }

        let tag = raw.format_tag();
        if self.resampler.is_none()
            || self.current_tag != Some(tag)
            || self.resampler_input_frames != mono.len()
        {
            debug!(
                "rebuilding resampler: {} Hz x{} ({} frames) -> {} Hz",
                tag.sample_rate,
                tag.channels,
                mono.len(),
                self.canonical_rate
            );
            self.resampler = Some(build_resampler(
                raw.sample_rate,
                self.canonical_rate,
                mono.len(),
            )?);
            self.resampler_input_frames = mono.len();
            self.current_tag = Some(tag);
        }

        let Some(resampler) = self.resampler.as_mut() else {
            return Err(MixdownError::ConversionFailed(
                "resampler unavailable".into(),
            ));
        };
        let mut waves = resampler
            .process(&[mono], None)
            .map_err(|e| MixdownError::ConversionFailed(format!("resampling failed: {e}")))?;
        if waves.is_empty() {
            return Err(MixdownError::ConversionFailed(
                "resampler produced no output channel".into(),
            ));
        }
        Ok(MonoBuffer::new(waves.swap_remove(0)))
    }
}

/// Decode samples to f32 and reduce to mono by per-frame arithmetic mean.
fn decode_to_mono(raw: &RawAudioBuffer) -> Result<Vec<f32>, MixdownError> {
    let channels = raw.channels as usize;
    let frames = raw.samples.len() / channels;

    // Frame counts come from untrusted backend tags; a bogus tag must cost
    // one dropped buffer, not the process.
    let mut mono = Vec::new();
    mono.try_reserve_exact(frames).map_err(|e| {
        MixdownError::BufferAllocationFailed(format!("{frames} frame staging buffer: {e}"))
    })?;

    match &raw.samples {
        SampleData::F32(samples) => frame_means(samples, channels, |v| v, &mut mono),
        SampleData::I16(samples) => {
            frame_means(samples, channels, |v| v as f32 / 32_768.0, &mut mono)
        }
        SampleData::I32(samples) => {
            frame_means(samples, channels, |v| v as f32 / 2_147_483_648.0, &mut mono)
        }
    }
    Ok(mono)
}

fn frame_means<T: Copy>(
    samples: &[T],
    channels: usize,
    to_f32: impl Fn(T) -> f32,
    out: &mut Vec<f32>,
) {
    let scale = 1.0 / channels as f32;
    for frame in samples.chunks_exact(channels) {
        out.push(frame.iter().map(|&v| to_f32(v)).sum::<f32>() * scale);
    }
}

fn build_resampler(
    from_rate: u32,
    to_rate: u32,
    input_frames: usize,
) -> Result<SincFixedIn<f32>, MixdownError> {
    let ratio = to_rate as f64 / from_rate as f64;
    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };
    SincFixedIn::new(ratio, 2.0, params, input_frames, 1).map_err(|e| {
        MixdownError::ConversionFailed(format!(
            "cannot construct resampler for {from_rate} Hz -> {to_rate} Hz: {e}"
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::audio_models::RawAudioBuffer;
    use approx::assert_relative_eq;

    #[test]
    fn mono_f32_at_canonical_rate_passes_through() {
        let mut converter = SampleConverter::new(48_000);
        let input = vec![0.1, -0.2, 0.3];
        let out = converter
            .convert(&RawAudioBuffer::f32(input.clone(), 48_000, 1))
            .unwrap();
        assert_eq!(out.samples(), input.as_slice());
    }

    #[test]
    fn stereo_reduces_to_per_frame_mean() {
        let mut converter = SampleConverter::new(48_000);
        let out = converter
            .convert(&RawAudioBuffer::f32(vec![0.2, 0.8, -0.4, 0.4], 48_000, 2))
            .unwrap();
        assert_eq!(out.frame_count(), 2);
        assert_relative_eq!(out.samples()[0], 0.5, epsilon = 1e-6);
        assert_relative_eq!(out.samples()[1], 0.0, epsilon = 1e-6);
    }

    #[test]
    fn i16_samples_are_scaled_to_unit_range() {
        let mut converter = SampleConverter::new(48_000);
        let out = converter
            .convert(&RawAudioBuffer::i16(vec![16_384, -16_384], 48_000, 1))
            .unwrap();
        assert_relative_eq!(out.samples()[0], 0.5, epsilon = 1e-4);
        assert_relative_eq!(out.samples()[1], -0.5, epsilon = 1e-4);
    }

    #[test]
    fn empty_buffer_yields_empty_output() {
        let mut converter = SampleConverter::new(48_000);
        let out = converter
            .convert(&RawAudioBuffer::f32(Vec::new(), 44_100, 1))
            .unwrap();
        assert_eq!(out.frame_count(), 0);
    }

    #[test]
    fn zero_channels_is_a_conversion_error() {
        let mut converter = SampleConverter::new(48_000);
        let err = converter
            .convert(&RawAudioBuffer::f32(vec![0.0; 4], 48_000, 0))
            .unwrap_err();
        assert!(err.is_recoverable());
    }

    #[test]
    fn resamples_to_roughly_ratio_scaled_length() {
        let mut converter = SampleConverter::new(48_000);
        let input = vec![0.1f32; 4410];
        let out = converter
            .convert(&RawAudioBuffer::f32(input, 44_100, 1))
            .unwrap();

        // Sinc group delay makes the count inexact; it must stay near
        // frames * 48000 / 44100 = 4800.
        let frames = out.frame_count() as f64;
        assert!((4300.0..=5300.0).contains(&frames), "got {frames} frames");
    }

    #[test]
    fn survives_format_changes_between_calls() {
        let mut converter = SampleConverter::new(48_000);

        converter
            .convert(&RawAudioBuffer::f32(vec![0.1; 4410], 44_100, 1))
            .unwrap();
        // Device switch: new rate, new channel count, new representation.
        converter
            .convert(&RawAudioBuffer::i16(vec![100; 3200], 16_000, 2))
            .unwrap();
        let out = converter
            .convert(&RawAudioBuffer::f32(vec![0.2; 4800], 48_000, 1))
            .unwrap();
        assert_eq!(out.frame_count(), 4800);
    }
}
