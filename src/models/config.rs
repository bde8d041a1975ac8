/// Configuration for a mixer session.
#[derive(Debug, Clone)]
pub struct MixerConfig {
    /// Canonical internal sample rate in Hz (default: 48000). Every source
    /// is converted to this rate before buffering.
    pub sample_rate: u32,

    /// Per-source ring buffer capacity in frames (default: 24_000 ≈ 0.5 s
    /// at 48 kHz). Bounds memory for arbitrarily long sessions; sustained
    /// producer/consumer imbalance drops the oldest audio instead of
    /// growing.
    pub ring_capacity: usize,

    /// Stereo chunk size in frames (default: 4_800 ≈ 0.1 s). Chunks are
    /// written atomically to the encoder sink.
    pub chunk_frames: usize,

    /// Whether the primary (microphone) source is attached this session.
    pub enable_primary: bool,

    /// Whether the secondary (system audio) source is attached this session.
    pub enable_secondary: bool,
}

impl MixerConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.sample_rate == 0 {
            return Err("sample rate must be positive".into());
        }
        if self.chunk_frames == 0 {
            return Err("chunk size must be positive".into());
        }
        if self.chunk_frames > self.ring_capacity {
            return Err(format!(
                "chunk size {} exceeds ring capacity {}",
                self.chunk_frames, self.ring_capacity
            ));
        }
        if !self.enable_primary && !self.enable_secondary {
            return Err("at least one source must be enabled".into());
        }
        Ok(())
    }
}

impl Default for MixerConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            ring_capacity: 24_000,
            chunk_frames: 4_800,
            enable_primary: true,
            enable_secondary: true,
        }
    }
}

/// Configuration for the two-pass normalizer.
#[derive(Debug, Clone)]
pub struct NormalizerConfig {
    /// Peak level each active channel is brought to (default: -3 dBFS).
    pub target_peak_db: f32,

    /// Peak level at or below which a channel counts as silent and is left
    /// unboosted (default: -50 dB).
    pub silence_threshold_db: f32,

    /// Maximum boost applied to any channel (default: +24 dB). Keeps very
    /// quiet channels from being amplified into the noise floor.
    pub max_gain_db: f32,

    /// Streaming window size in frames (default: 48_000 ≈ 1 s). Memory use
    /// is O(window) regardless of recording length.
    pub window_frames: usize,
}

impl NormalizerConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.window_frames == 0 {
            return Err("window size must be positive".into());
        }
        if self.max_gain_db < 0.0 {
            return Err("max gain must be non-negative".into());
        }
        Ok(())
    }
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            target_peak_db: -3.0,
            silence_threshold_db: -50.0,
            max_gain_db: 24.0,
            window_frames: 48_000,
        }
    }
}
