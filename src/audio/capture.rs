use super::encoder::{AudioEncoder, Segment};
use super::format::AudioFormat;
use super::platform::{CapturePlatform, HardwareHandle, MicrophoneInput};
use super::wav_encoder::WavEncoder;
use crate::error::ClientError;
use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, SampleRate, StreamConfig};
use ringbuf::{HeapRb, traits::*};
use std::sync::Arc;
use tokio::sync::{Notify, mpsc, oneshot};

/// Microphone capture through the default cpal host
pub struct CpalPlatform {
    format: AudioFormat,
}

impl CpalPlatform {
    pub fn new(format: AudioFormat) -> Self {
        Self { format }
    }

    /// Start audio capture
    ///
    /// The returned input owns the stream; audio chunks are sent via chunk_tx.
    fn start_stream(&self, chunk_tx: mpsc::Sender<Vec<f32>>) -> Result<CpalInput, ClientError> {
        let format = self.format;
        let ring = HeapRb::<f32>::new(format.samples_for_duration(30.0));
        let (mut producer, consumer) = ring.split();

        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| ClientError::PermissionDenied("no input audio device available".into()))?;

        let config = StreamConfig {
            channels: format.channels,
            sample_rate: SampleRate(format.sample_rate),
            buffer_size: BufferSize::Default,
        };

        let notify = Arc::new(Notify::new());
        let notify_callback = notify.clone();

        let stream = device
            .build_input_stream(
                &config,
                move |data: &[f32], _info: &cpal::InputCallbackInfo| {
                    producer.push_slice(data);
                    notify_callback.notify_one();
                },
                move |err| {
                    tracing::error!("Audio stream error: {}", err);
                },
                None,
            )
            .map_err(|e| ClientError::PermissionDenied(format!("failed to open input stream: {e}")))?;

        stream
            .play()
            .map_err(|e| ClientError::PermissionDenied(format!("failed to start input stream: {e}")))?;

        let (flush, flush_rx) = oneshot::channel();
        let chunk_size = format.samples_for_duration(0.25);
        tokio::task::spawn_local(bridge_task(consumer, chunk_tx, chunk_size, notify, flush_rx));

        tracing::info!("Audio capture started");
        Ok(CpalInput { stream, flush })
    }
}

/// Moves samples from the ring buffer into the chunk channel
///
/// Full chunks are forwarded as they fill up. Once `flush` fires (or its
/// sender is dropped) whatever is left, including a partial chunk, is sent
/// and the task ends, closing the channel.
async fn bridge_task(
    mut consumer: impl Consumer<Item = f32>,
    tx: mpsc::Sender<Vec<f32>>,
    chunk_size: usize,
    notify: Arc<Notify>,
    mut flush: oneshot::Receiver<()>,
) {
    loop {
        tokio::select! {
            _ = notify.notified() => {
                if !forward_chunks(&mut consumer, &tx, chunk_size, false).await {
                    return;
                }
            }
            _ = &mut flush => {
                forward_chunks(&mut consumer, &tx, chunk_size, true).await;
                return;
            }
            // Receiver dropped
            _ = tx.closed() => return,
        }
    }
}

/// Returns false once the receiver is gone
async fn forward_chunks(
    consumer: &mut impl Consumer<Item = f32>,
    tx: &mpsc::Sender<Vec<f32>>,
    chunk_size: usize,
    partial: bool,
) -> bool {
    loop {
        let available = consumer.occupied_len();
        if available == 0 || (available < chunk_size && !partial) {
            return true;
        }

        let mut chunk = vec![0.0f32; available.min(chunk_size)];
        let n = consumer.pop_slice(&mut chunk);
        chunk.truncate(n);

        if tx.send(chunk).await.is_err() {
            return false;
        }
    }
}

/// A running cpal input stream plus the bridge's flush trigger
struct CpalInput {
    stream: cpal::Stream,
    flush: oneshot::Sender<()>,
}

impl HardwareHandle for CpalInput {
    fn release(self: Box<Self>) {
        if let Err(e) = self.stream.pause() {
            tracing::warn!("Failed to pause input stream: {}", e);
        }
        // Bridge forwards what is still buffered, then closes the channel
        let _ = self.flush.send(());
        // Dropping the stream closes the device
    }
}

#[async_trait(?Send)]
impl CapturePlatform for CpalPlatform {
    async fn acquire_microphone(&self) -> Result<MicrophoneInput, ClientError> {
        let (chunk_tx, chunk_rx) = mpsc::channel(100);
        let input = self.start_stream(chunk_tx)?;
        Ok(MicrophoneInput::new(chunk_rx, Box::new(input)))
    }

    fn open_encoder(
        &self,
        segments: mpsc::UnboundedSender<Segment>,
    ) -> Result<Box<dyn AudioEncoder>, ClientError> {
        let encoder = WavEncoder::new(self.format, segments)
            .map_err(|e| ClientError::CaptureUnsupported(e.to_string()))?;
        Ok(Box::new(encoder))
    }
}
