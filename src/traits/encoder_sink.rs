use crate::models::audio_models::StereoChunk;
use crate::models::error::MixdownError;
use crate::models::recording_result::RecordingResult;

/// Destination for mixed stereo chunks.
///
/// The mixer owns exactly one sink per session and calls it from inside
/// its serialized drain step, so implementations need no internal locking.
/// Container and codec are the sink's concern; the mixer only guarantees
/// interleaved stereo at the canonical rate, full chunks during recording
/// and at most one partial chunk during the stop flush.
pub trait EncoderSink: Send {
    /// Persist one chunk. An error is terminal for the session: the mixer
    /// aborts the sink and surfaces the failure without retrying.
    fn write_chunk(&mut self, chunk: &StereoChunk) -> Result<(), MixdownError>;

    /// Finalize the artifact and return its handle.
    fn finish(self: Box<Self>) -> Result<RecordingResult, MixdownError>;

    /// Discard the artifact, deleting anything partially written.
    fn abort(self: Box<Self>);
}
