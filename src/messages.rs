use std::path::PathBuf;

use crate::controls::ControlGuard;
use crate::error::ClientError;
use crate::model::AudioFile;

/// Commands for the Recorder service
#[derive(Debug)]
pub enum RecorderCommand {
    /// Start a capture when idle, stop it when recording
    Toggle,
}

/// What the Recorder hands back once a capture attempt ends
#[derive(Debug)]
pub enum CaptureReport {
    /// A finished clip. The guard keeps the mic control disabled until the
    /// clip has been uploaded.
    Clip { file: AudioFile, guard: Option<ControlGuard> },
    Failed(ClientError),
}

/// The user-triggerable actions
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    SaveFile(Option<PathBuf>),
    FindFile(Option<PathBuf>),
    DownloadFromSource(String),
    ToggleMic,
}
