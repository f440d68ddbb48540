pub mod capture;
pub mod encoder;
pub mod format;
pub mod platform;
pub mod session;
pub mod wav_encoder;

pub use capture::CpalPlatform;
pub use encoder::{AudioEncoder, Segment};
pub use format::AudioFormat;
pub use platform::{CapturePlatform, HardwareHandle, MicrophoneInput};
pub use session::{AudioBlob, CaptureStatus, RECORDING_BUDGET_SECS, RecordingSession};
