use thiserror::Error;

use crate::audio::CaptureStatus;
use crate::model::Operation;

/// What the user forgot to provide before triggering an action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingInput {
    File,
    SourceUrl,
}

impl MissingInput {
    pub fn message(self) -> &'static str {
        match self {
            MissingInput::File => "Please select a file first.",
            MissingInput::SourceUrl => "Please paste a Spotify track link.",
        }
    }
}

fn application_message<'a>(operation: &Operation, detail: &'a Option<String>) -> &'a str {
    detail.as_deref().unwrap_or(operation.fallback_message())
}

/// Every failure a user action can end in
///
/// None of these escape the session orchestrator: each one is turned into a
/// status line on the control that triggered it.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClientError {
    #[error("{}", .0.message())]
    InputMissing(MissingInput),

    #[error("Could not read {path}: {reason}")]
    InputUnreadable { path: String, reason: String },

    #[error("Microphone access denied")]
    PermissionDenied(String),

    #[error("Recording not supported on this platform")]
    CaptureUnsupported(String),

    #[error("Recording failed: {0}")]
    Encoder(String),

    /// The request never produced a response. The reason is logged, the user
    /// only sees the operation fallback.
    #[error("{}", .operation.fallback_message())]
    TransportFailure { operation: Operation, reason: String },

    #[error("{}", application_message(.operation, .detail))]
    ApplicationFailure {
        operation: Operation,
        detail: Option<String>,
    },

    #[error("Unexpected response from server: {0}")]
    MalformedResponse(String),

    #[error("Illegal recording transition {from:?} -> {to:?}")]
    IllegalTransition { from: CaptureStatus, to: CaptureStatus },
}
