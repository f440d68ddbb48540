use anyhow::Result;
use async_trait::async_trait;

/// One chunk of encoded audio handed out by an encoder
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub bytes: Vec<u8>,
    /// MIME type the encoder reported for this segment, if any
    pub mime_type: Option<String>,
}

impl Segment {
    pub fn new(bytes: Vec<u8>, mime_type: Option<&str>) -> Self {
        Self {
            bytes,
            mime_type: mime_type.map(str::to_owned),
        }
    }
}

/// Streaming audio encoder
///
/// Samples are pushed in while recording. Encoded output is emitted as
/// [`Segment`]s on the channel the encoder was opened with, in order, at
/// whatever granularity the format allows. `finalize` returns once every
/// segment has been emitted.
#[async_trait]
pub trait AudioEncoder: Send {
    /// Write audio samples (streaming, called repeatedly during recording)
    /// The Vec is moved to avoid copying
    fn write_chunk(&mut self, samples: Vec<f32>) -> Result<()>;

    /// Flush remaining output and close the encoder
    async fn finalize(&mut self) -> Result<()>;
}
