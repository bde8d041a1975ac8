use std::fs::{self, File};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use log::{debug, warn};
use sha2::{Digest, Sha256};

use crate::models::audio_models::{SourceId, StereoChunk};
use crate::models::config::MixerConfig;
use crate::models::error::MixdownError;
use crate::models::recording_result::{RecordingMetadata, RecordingResult};
use crate::processing::wav_format;
use crate::storage::metadata;
use crate::traits::encoder_sink::EncoderSink;

const BIT_DEPTH: u16 = 16;
const CHANNELS: u16 = 2;

/// Streaming stereo WAV sink.
///
/// Writes the 44-byte RIFF header with placeholder sizes at creation,
/// streams 16-bit PCM chunk by chunk, and patches the size fields in place
/// on `finish`. The finished artifact gets a SHA-256 checksum and a JSON
/// metadata sidecar.
pub struct WavFileSink {
    file: File,
    file_path: PathBuf,
    sample_rate: u32,
    sources: Vec<SourceId>,
    data_bytes: u64,
    frames: u64,
}

impl WavFileSink {
    /// Create `recording_{uuid}.wav` under `output_dir` and write the
    /// initial header.
    pub fn create(output_dir: &Path, config: &MixerConfig) -> Result<Self, MixdownError> {
        fs::create_dir_all(output_dir).map_err(|e| {
            MixdownError::Io(format!(
                "failed to create directory {}: {e}",
                output_dir.display()
            ))
        })?;

        let file_name = format!("recording_{}.wav", uuid::Uuid::new_v4());
        let file_path = output_dir.join(file_name);
        let mut file = File::create(&file_path).map_err(|e| {
            MixdownError::Io(format!("failed to create {}: {e}", file_path.display()))
        })?;

        let header = wav_format::generate_wav_header(config.sample_rate, BIT_DEPTH, CHANNELS, 0);
        file.write_all(&header)
            .map_err(|e| MixdownError::Io(format!("failed to write header: {e}")))?;

        let mut sources = Vec::new();
        if config.enable_primary {
            sources.push(SourceId::Primary);
        }
        if config.enable_secondary {
            sources.push(SourceId::Secondary);
        }

        debug!("opened wav sink at {}", file_path.display());
        Ok(Self {
            file,
            file_path,
            sample_rate: config.sample_rate,
            sources,
            data_bytes: 0,
            frames: 0,
        })
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }
}

impl EncoderSink for WavFileSink {
    fn write_chunk(&mut self, chunk: &StereoChunk) -> Result<(), MixdownError> {
        let pcm = wav_format::pack_i16_le(&chunk.interleaved());
        self.file
            .write_all(&pcm)
            .map_err(|e| MixdownError::Io(format!("write failed: {e}")))?;
        self.data_bytes += pcm.len() as u64;
        self.frames += chunk.frame_count() as u64;
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<RecordingResult, MixdownError> {
        let WavFileSink {
            mut file,
            file_path,
            sample_rate,
            sources,
            data_bytes,
            frames,
        } = *self;

        // Patch RIFF chunk size, then data chunk size.
        file.seek(SeekFrom::Start(wav_format::RIFF_SIZE_OFFSET))
            .map_err(|e| MixdownError::Io(e.to_string()))?;
        file.write_all(&(36 + data_bytes as u32).to_le_bytes())
            .map_err(|e| MixdownError::Io(e.to_string()))?;
        file.seek(SeekFrom::Start(wav_format::DATA_SIZE_OFFSET))
            .map_err(|e| MixdownError::Io(e.to_string()))?;
        file.write_all(&(data_bytes as u32).to_le_bytes())
            .map_err(|e| MixdownError::Io(e.to_string()))?;
        file.flush().map_err(|e| MixdownError::Io(e.to_string()))?;
        drop(file);

        let checksum = sha256_file(&file_path)?;
        let duration_secs = frames as f64 / sample_rate as f64;
        let file_path_str = file_path.to_string_lossy().into_owned();

        let meta = RecordingMetadata::new(
            duration_secs,
            &file_path_str,
            &checksum,
            sample_rate,
            CHANNELS,
            sources,
        );
        metadata::write_metadata(&meta, &file_path)?;

        debug!(
            "finalized {} ({} frames, {:.2} s)",
            file_path.display(),
            frames,
            duration_secs
        );
        Ok(RecordingResult {
            file_path,
            duration_secs,
            frames,
            metadata: meta,
            checksum,
        })
    }

    fn abort(self: Box<Self>) {
        let path = self.file_path.clone();
        drop(self);
        if let Err(e) = fs::remove_file(&path) {
            warn!("failed to delete partial artifact {}: {e}", path.display());
        } else {
            debug!("discarded partial artifact {}", path.display());
        }
    }
}

/// SHA-256 hex digest of a file, streamed.
fn sha256_file(path: &Path) -> Result<String, MixdownError> {
    let mut file = File::open(path)
        .map_err(|e| MixdownError::Io(format!("failed to open file for checksum: {e}")))?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)
        .map_err(|e| MixdownError::Io(format!("failed to hash file: {e}")))?;
    Ok(hex_encode(&hasher.finalize()))
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> MixerConfig {
        MixerConfig::default()
    }

    #[test]
    fn writes_valid_wav_structure() {
        let dir = tempfile::tempdir().unwrap();
        let sink = WavFileSink::create(dir.path(), &test_config()).unwrap();
        let path = sink.file_path().to_path_buf();

        let mut boxed: Box<dyn EncoderSink> = Box::new(sink);
        let chunk = StereoChunk::new(vec![0.5; 4], vec![-0.5; 4]);
        boxed.write_chunk(&chunk).unwrap();
        let result = boxed.finish().unwrap();

        assert_eq!(result.frames, 4);
        assert_eq!(result.file_path, path);
        assert!(!result.checksum.is_empty());

        let data = fs::read(&path).unwrap();
        // header + 4 frames * 2 channels * 2 bytes
        assert_eq!(data.len(), 44 + 16);
        assert_eq!(&data[0..4], b"RIFF");
        assert_eq!(
            u32::from_le_bytes([data[40], data[41], data[42], data[43]]),
            16
        );
        assert_eq!(
            u32::from_le_bytes([data[4], data[5], data[6], data[7]]),
            36 + 16
        );
    }

    #[test]
    fn finished_artifact_is_readable_stereo() {
        let dir = tempfile::tempdir().unwrap();
        let sink = WavFileSink::create(dir.path(), &test_config()).unwrap();

        let mut boxed: Box<dyn EncoderSink> = Box::new(sink);
        boxed
            .write_chunk(&StereoChunk::new(vec![0.25; 100], vec![0.0; 100]))
            .unwrap();
        let result = boxed.finish().unwrap();

        let reader = hound::WavReader::open(&result.file_path).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 2);
        assert_eq!(spec.sample_rate, 48_000);
        assert_eq!(spec.bits_per_sample, 16);
        assert_eq!(reader.len(), 200); // samples, both channels
    }

    #[test]
    fn writes_metadata_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let sink = WavFileSink::create(dir.path(), &test_config()).unwrap();

        let boxed: Box<dyn EncoderSink> = Box::new(sink);
        let result = boxed.finish().unwrap();

        let meta = metadata::read_metadata(&result.file_path).unwrap();
        assert_eq!(meta, result.metadata);
        assert_eq!(meta.sample_rate, 48_000);
        assert_eq!(meta.channels, 2);
        assert_eq!(meta.sources, vec![SourceId::Primary, SourceId::Secondary]);
    }

    #[test]
    fn abort_deletes_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let sink = WavFileSink::create(dir.path(), &test_config()).unwrap();
        let path = sink.file_path().to_path_buf();
        assert!(path.exists());

        let mut boxed: Box<dyn EncoderSink> = Box::new(sink);
        boxed
            .write_chunk(&StereoChunk::new(vec![0.1; 10], vec![0.1; 10]))
            .unwrap();
        boxed.abort();
        assert!(!path.exists());
    }
}
