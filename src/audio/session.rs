use super::encoder::Segment;
use crate::error::ClientError;
use crate::model::DEFAULT_CLIP_MIME;

/// Fixed length of one microphone capture
pub const RECORDING_BUDGET_SECS: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureStatus {
    Idle,
    Acquiring,
    Recording,
    Stopping,
}

impl CaptureStatus {
    /// `Idle -> Acquiring -> Recording -> Stopping -> Idle`, plus the failed
    /// acquisition shortcut `Acquiring -> Idle`.
    pub fn can_transition_to(self, next: CaptureStatus) -> bool {
        use CaptureStatus::*;
        matches!(
            (self, next),
            (Idle, Acquiring)
                | (Acquiring, Recording)
                | (Acquiring, Idle)
                | (Recording, Stopping)
                | (Stopping, Idle)
        )
    }
}

/// Finished recording, ready to be uploaded
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBlob {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

/// State of one microphone capture attempt
#[derive(Debug)]
pub struct RecordingSession {
    status: CaptureStatus,
    remaining_seconds: u32,
    segments: Vec<Segment>,
}

impl RecordingSession {
    pub fn new() -> Self {
        Self {
            status: CaptureStatus::Idle,
            remaining_seconds: 0,
            segments: Vec::new(),
        }
    }

    pub fn status(&self) -> CaptureStatus {
        self.status
    }

    pub fn remaining_seconds(&self) -> u32 {
        self.remaining_seconds
    }

    fn transition(&mut self, next: CaptureStatus) -> Result<(), ClientError> {
        if !self.status.can_transition_to(next) {
            return Err(ClientError::IllegalTransition {
                from: self.status,
                to: next,
            });
        }
        tracing::debug!("Recording session {:?} -> {:?}", self.status, next);
        self.status = next;
        Ok(())
    }

    pub fn begin_acquire(&mut self) -> Result<(), ClientError> {
        self.transition(CaptureStatus::Acquiring)
    }

    pub fn start_recording(&mut self, budget_secs: u32) -> Result<(), ClientError> {
        self.transition(CaptureStatus::Recording)?;
        self.remaining_seconds = budget_secs;
        self.segments.clear();
        Ok(())
    }

    /// Countdown update. The remaining time never goes back up.
    pub fn tick(&mut self, remaining: u32) -> Result<(), ClientError> {
        if self.status != CaptureStatus::Recording {
            return Err(ClientError::IllegalTransition {
                from: self.status,
                to: CaptureStatus::Recording,
            });
        }
        self.remaining_seconds = self.remaining_seconds.min(remaining);
        Ok(())
    }

    pub fn begin_stop(&mut self) -> Result<(), ClientError> {
        self.transition(CaptureStatus::Stopping)?;
        self.remaining_seconds = 0;
        Ok(())
    }

    /// Collect an encoder segment in arrival order. Empty segments are dropped.
    pub fn push_segment(&mut self, segment: Segment) -> Result<(), ClientError> {
        if !matches!(
            self.status,
            CaptureStatus::Recording | CaptureStatus::Stopping
        ) {
            return Err(ClientError::IllegalTransition {
                from: self.status,
                to: CaptureStatus::Recording,
            });
        }
        if !segment.bytes.is_empty() {
            self.segments.push(segment);
        }
        Ok(())
    }

    /// `Stopping -> Idle`: concatenate everything collected into one blob.
    ///
    /// The blob takes the MIME type of the first segment; with no segments it
    /// is empty and typed [`DEFAULT_CLIP_MIME`].
    pub fn finish(&mut self) -> Result<AudioBlob, ClientError> {
        self.transition(CaptureStatus::Idle)?;

        let segments = std::mem::take(&mut self.segments);
        let mime_type = segments
            .first()
            .and_then(|s| s.mime_type.clone())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| DEFAULT_CLIP_MIME.to_string());
        let bytes = segments.into_iter().flat_map(|s| s.bytes).collect();

        Ok(AudioBlob { bytes, mime_type })
    }

    /// Return to `Idle` from wherever a failure left the session, only
    /// through legal transitions.
    pub fn abandon(&mut self) {
        if self.status == CaptureStatus::Recording {
            let _ = self.begin_stop();
        }
        if self.status != CaptureStatus::Idle {
            let _ = self.transition(CaptureStatus::Idle);
        }
        self.remaining_seconds = 0;
        self.segments.clear();
    }
}

impl Default for RecordingSession {
    fn default() -> Self {
        Self::new()
    }
}
