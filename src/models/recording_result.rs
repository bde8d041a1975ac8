use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::audio_models::SourceId;

/// Result returned when a mixer session completes successfully.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingResult {
    pub file_path: PathBuf,
    pub duration_secs: f64,
    pub frames: u64,
    pub metadata: RecordingMetadata,
    pub checksum: String,
}

/// Metadata stored as a JSON sidecar next to a finished artifact.
///
/// Serializable for export to upload/storage collaborators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingMetadata {
    pub id: String,
    pub duration_secs: f64,
    pub file_path: String,
    pub checksum: String,
    pub sample_rate: u32,
    pub channels: u16,
    pub created_at: String,
    pub sources: Vec<SourceId>,
}

impl RecordingMetadata {
    pub fn new(
        duration_secs: f64,
        file_path: &str,
        checksum: &str,
        sample_rate: u32,
        channels: u16,
        sources: Vec<SourceId>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            duration_secs,
            file_path: file_path.to_string(),
            checksum: checksum.to_string(),
            sample_rate,
            channels,
            created_at: chrono::Utc::now().to_rfc3339(),
            sources,
        }
    }
}
