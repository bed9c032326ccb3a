use super::error::RecorderError;

/// Transcode bridge state machine.
///
/// State transitions:
/// ```text
/// idle → initializing → encoding → finishing → complete
///            ↓              ↓           ↓
///                        errored
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum TranscodeState {
    Idle,
    Initializing,
    Encoding,
    Finishing,
    Complete,
    Errored(RecorderError),
}

impl TranscodeState {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    /// Whether a job is between `init` and its terminal response.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Initializing | Self::Encoding | Self::Finishing)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Errored(_))
    }
}
