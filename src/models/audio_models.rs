use serde::{Deserialize, Serialize};

/// Identifies one of the two capture sources feeding the mixer.
///
/// `Primary` (microphone) always maps to the left output channel,
/// `Secondary` (system audio) to the right.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceId {
    Primary,
    Secondary,
}

/// Sample representation of a raw capture buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleFormat {
    F32,
    I16,
    I32,
}

/// Typed sample payload of a raw capture buffer.
///
/// Interleaved when the buffer has more than one channel.
#[derive(Debug, Clone, PartialEq)]
pub enum SampleData {
    F32(Vec<f32>),
    I16(Vec<i16>),
    I32(Vec<i32>),
}

impl SampleData {
    pub fn len(&self) -> usize {
        match self {
            Self::F32(s) => s.len(),
            Self::I16(s) => s.len(),
            Self::I32(s) => s.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn format(&self) -> SampleFormat {
        match self {
            Self::F32(_) => SampleFormat::F32,
            Self::I16(_) => SampleFormat::I16,
            Self::I32(_) => SampleFormat::I32,
        }
    }
}

/// The part of a buffer's format tag that forces a converter rebuild when
/// it changes (e.g. on a device switch).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatTag {
    pub sample_rate: u32,
    pub channels: u16,
    pub format: SampleFormat,
}

/// A raw PCM buffer as delivered by a capture backend.
///
/// The core makes no assumption about format consistency between calls;
/// backends may switch devices mid-session and deliver a different rate,
/// channel count, or sample representation at any time.
#[derive(Debug, Clone)]
pub struct RawAudioBuffer {
    pub samples: SampleData,
    pub sample_rate: u32,
    pub channels: u16,
}

impl RawAudioBuffer {
    pub fn f32(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        Self {
            samples: SampleData::F32(samples),
            sample_rate,
            channels,
        }
    }

    pub fn i16(samples: Vec<i16>, sample_rate: u32, channels: u16) -> Self {
        Self {
            samples: SampleData::I16(samples),
            sample_rate,
            channels,
        }
    }

    pub fn frame_count(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }

    pub fn format_tag(&self) -> FormatTag {
        FormatTag {
            sample_rate: self.sample_rate,
            channels: self.channels,
            format: self.samples.format(),
        }
    }
}

/// Owned mono samples at the canonical rate, ready for a ring-buffer
/// append. Produced by the converter, consumed exactly once.
#[derive(Debug, Clone, PartialEq)]
pub struct MonoBuffer {
    samples: Vec<f32>,
}

impl MonoBuffer {
    pub fn new(samples: Vec<f32>) -> Self {
        Self { samples }
    }

    pub fn frame_count(&self) -> usize {
        self.samples.len()
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }
}

/// A fixed-size block of stereo frames cut from the two ring buffers.
///
/// Left carries the primary source, right the secondary; an absent or
/// short source contributes silence. Both channels always hold the same
/// number of frames.
#[derive(Debug, Clone, PartialEq)]
pub struct StereoChunk {
    left: Vec<f32>,
    right: Vec<f32>,
}

impl StereoChunk {
    pub fn new(left: Vec<f32>, right: Vec<f32>) -> Self {
        debug_assert_eq!(left.len(), right.len());
        Self { left, right }
    }

    pub fn frame_count(&self) -> usize {
        self.left.len()
    }

    pub fn left(&self) -> &[f32] {
        &self.left
    }

    pub fn right(&self) -> &[f32] {
        &self.right
    }

    /// Interleave the two channels as `[L0, R0, L1, R1, ...]`.
    pub fn interleaved(&self) -> Vec<f32> {
        let mut stereo = Vec::with_capacity(self.left.len() * 2);
        for (l, r) in self.left.iter().zip(&self.right) {
            stereo.push(*l);
            stereo.push(*r);
        }
        stereo
    }
}

/// Diagnostics for debugging mixer sessions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MixerDiagnostics {
    pub primary_appends: u64,
    pub secondary_appends: u64,
    pub frames_converted: u64,
    pub buffers_dropped: u64,
    pub chunks_written: u64,
    pub frames_written: u64,
}
