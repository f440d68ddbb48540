use super::encoder::{AudioEncoder, Segment};
use super::format::AudioFormat;
use anyhow::{Context, Result};
use async_trait::async_trait;
use hound::{SampleFormat, WavSpec, WavWriter};
use tempfile::NamedTempFile;
use tokio::sync::{mpsc, oneshot};

pub const WAV_MIME: &str = "audio/wav";

enum WavCommand {
    WriteChunk(Vec<f32>),
    Finalize { reply: oneshot::Sender<Result<()>> },
}

/// WAV encoder using a dedicated blocking thread for I/O
///
/// Samples are written to a temp file as they arrive. WAV needs its header
/// patched with the final length, so the whole file is emitted as a single
/// `audio/wav` segment on finalize.
pub struct WavEncoder {
    tx: mpsc::UnboundedSender<WavCommand>,
}

impl WavEncoder {
    pub fn new(format: AudioFormat, segments: mpsc::UnboundedSender<Segment>) -> Result<Self> {
        let spec = WavSpec {
            channels: format.channels,
            sample_rate: format.sample_rate,
            bits_per_sample: AudioFormat::BITS_PER_SAMPLE,
            sample_format: SampleFormat::Int,
        };

        let temp_file = tempfile::Builder::new()
            .prefix("seektune-")
            .suffix(".wav")
            .tempfile()
            .context("Failed to create temp file")?;

        let mut writer =
            WavWriter::create(temp_file.path(), spec).context("Failed to create WAV writer")?;

        let (tx, mut rx) = mpsc::unbounded_channel();

        std::thread::spawn(move || {
            while let Some(cmd) = rx.blocking_recv() {
                match cmd {
                    WavCommand::WriteChunk(samples) => {
                        for sample in samples {
                            // Convert f32 (-1.0 to 1.0) to i16
                            let amplitude = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
                            if let Err(e) = writer.write_sample(amplitude) {
                                tracing::error!("Failed to write sample: {}", e);
                                break;
                            }
                        }
                    }
                    WavCommand::Finalize { reply } => {
                        let result = Self::finish(writer, &temp_file, &segments);
                        let _ = reply.send(result);
                        break;
                    }
                }
            }
        });

        Ok(Self { tx })
    }

    fn finish(
        writer: WavWriter<std::io::BufWriter<std::fs::File>>,
        temp_file: &NamedTempFile,
        segments: &mpsc::UnboundedSender<Segment>,
    ) -> Result<()> {
        writer.finalize().context("Failed to finalize WAV")?;
        let bytes = std::fs::read(temp_file.path()).context("Failed to read encoded WAV")?;

        tracing::debug!("Encoded {} bytes of WAV", bytes.len());
        segments
            .send(Segment::new(bytes, Some(WAV_MIME)))
            .map_err(|_| anyhow::anyhow!("Segment receiver closed before finalize"))
    }
}

#[async_trait]
impl AudioEncoder for WavEncoder {
    fn write_chunk(&mut self, samples: Vec<f32>) -> Result<()> {
        self.tx
            .send(WavCommand::WriteChunk(samples))
            .map_err(|e| anyhow::anyhow!("Failed to send write command: {}", e))
    }

    async fn finalize(&mut self) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(WavCommand::Finalize { reply })
            .map_err(|e| anyhow::anyhow!("Failed to send finalize command: {}", e))?;

        rx.await
            .map_err(|e| anyhow::anyhow!("Failed to receive finalize response: {}", e))?
    }
}
