/// Mixer session state machine.
///
/// State transitions:
/// ```text
/// idle → recording → stopping → idle
///            ↓
///       cancelling → idle
/// ```
///
/// `append_primary`/`append_secondary` only do work in `recording`;
/// appends in `idle` are tolerated no-ops because capture backends may
/// deliver a trailing buffer after a stop race.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MixerState {
    Idle,
    Recording,
    Stopping,
    Cancelling,
}

impl MixerState {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn is_recording(&self) -> bool {
        matches!(self, Self::Recording)
    }
}
