use async_trait::async_trait;
use tokio::sync::mpsc;

use super::encoder::{AudioEncoder, Segment};
use crate::error::ClientError;

/// Ownership of the microphone hardware
///
/// `release` consumes the handle, so it can run at most once.
pub trait HardwareHandle {
    fn release(self: Box<Self>);
}

/// An acquired microphone: the hardware handle plus the raw sample stream
///
/// The hardware is released exactly once, by [`MicrophoneInput::release`] or
/// on drop, whichever comes first.
pub struct MicrophoneInput {
    pub samples: mpsc::Receiver<Vec<f32>>,
    handle: Option<Box<dyn HardwareHandle>>,
}

impl MicrophoneInput {
    pub fn new(samples: mpsc::Receiver<Vec<f32>>, handle: Box<dyn HardwareHandle>) -> Self {
        Self {
            samples,
            handle: Some(handle),
        }
    }

    /// Release the hardware. `samples` stays readable until the samples
    /// buffered so far have been delivered, then closes.
    pub fn release(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.release();
            tracing::debug!("Microphone released");
        }
    }
}

impl Drop for MicrophoneInput {
    fn drop(&mut self) {
        self.release();
    }
}

/// What the platform offers for recording audio
///
/// Acquiring fails with `PermissionDenied` when the microphone cannot be
/// opened; opening an encoder fails with `CaptureUnsupported` when the
/// platform cannot record at all.
#[async_trait(?Send)]
pub trait CapturePlatform {
    async fn acquire_microphone(&self) -> Result<MicrophoneInput, ClientError>;

    fn open_encoder(
        &self,
        segments: mpsc::UnboundedSender<Segment>,
    ) -> Result<Box<dyn AudioEncoder>, ClientError>;
}
