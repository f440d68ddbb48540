use crate::audio::{
    AudioEncoder, CapturePlatform, CaptureStatus, MicrophoneInput, RECORDING_BUDGET_SECS,
    RecordingSession, Segment,
};
use crate::clock::CountdownClock;
use crate::controls::{Control, ControlGuard, ControlId};
use crate::error::ClientError;
use crate::messages::{CaptureReport, RecorderCommand};
use crate::model::{AudioFile, clip_filename};
use crate::surface::{StatusLine, Surface, TimerDisplay};
use std::rc::Rc;
use tokio::sync::mpsc;

enum ClockEvent {
    Tick(u32),
    Expired,
}

#[derive(Debug)]
enum StopReason {
    Expired,
    UserStop,
    EncoderFailed,
    InputClosed,
}

/// Owns the microphone for one capture at a time
///
/// This service:
/// - Acquires the microphone and opens an encoder on `Toggle`
/// - Bounds the capture with a 10 second countdown
/// - Stops on expiry or on a second `Toggle`, whichever comes first
/// - Releases the hardware on every exit path and reports the clip
///
/// Toggles that arrive while acquiring, finalizing or while the previous
/// clip is still being uploaded are dropped.
///
/// Note: the cpal stream inside a [`MicrophoneInput`] is !Send, so this
/// service must be spawned on a LocalSet using tokio::task::spawn_local.
pub struct Recorder {
    platform: Box<dyn CapturePlatform>,
    mic: Rc<Control>,
    surface: Rc<dyn Surface>,
    cmd_rx: mpsc::Receiver<RecorderCommand>,
    report_tx: mpsc::Sender<CaptureReport>,
}

impl Recorder {
    pub fn new(
        platform: Box<dyn CapturePlatform>,
        mic: Rc<Control>,
        surface: Rc<dyn Surface>,
        cmd_rx: mpsc::Receiver<RecorderCommand>,
        report_tx: mpsc::Sender<CaptureReport>,
    ) -> Self {
        Self {
            platform,
            mic,
            surface,
            cmd_rx,
            report_tx,
        }
    }

    pub async fn run(mut self) {
        while let Some(cmd) = self.cmd_rx.recv().await {
            match cmd {
                // Previous clip is still being uploaded
                RecorderCommand::Toggle if !self.mic.is_enabled() => {
                    tracing::debug!("Microphone busy, ignoring toggle");
                }
                RecorderCommand::Toggle => {
                    let report = self.capture().await;
                    if self.report_tx.send(report).await.is_err() {
                        break;
                    }
                }
            }
        }
        tracing::debug!("Recorder stopped");
    }

    fn status(&self, status: StatusLine) {
        self.surface.status(ControlId::Mic, &status);
    }

    async fn capture(&mut self) -> CaptureReport {
        let mut session = RecordingSession::new();
        let result = self.record(&mut session).await;

        // A stop racing the one that ended this capture must not start the next
        while let Ok(cmd) = self.cmd_rx.try_recv() {
            tracing::debug!("Dropping {:?} queued during capture", cmd);
        }

        match result {
            Ok((file, guard)) => CaptureReport::Clip { file, guard },
            Err(err) => {
                session.abandon();
                self.surface.timer(TimerDisplay::Idle);
                tracing::warn!("Capture failed: {:?}", err);
                self.status(StatusLine::error(err.to_string()));
                CaptureReport::Failed(err)
            }
        }
    }

    async fn record(
        &mut self,
        session: &mut RecordingSession,
    ) -> Result<(AudioFile, Option<ControlGuard>), ClientError> {
        session.begin_acquire()?;
        self.surface.clear_result(ControlId::Mic);
        self.status(StatusLine::info("Requesting microphone access..."));

        let acquired = {
            let acquire = self.platform.acquire_microphone();
            tokio::pin!(acquire);
            loop {
                tokio::select! {
                    result = &mut acquire => break result,
                    Some(_) = self.cmd_rx.recv() => {
                        tracing::debug!("Still acquiring microphone, ignoring toggle");
                    }
                }
            }
        };
        let mut input = acquired?;

        let (segment_tx, segment_rx) = mpsc::unbounded_channel();
        let encoder = match self.platform.open_encoder(segment_tx) {
            Ok(encoder) => encoder,
            Err(err) => {
                input.release();
                return Err(err);
            }
        };

        session.start_recording(RECORDING_BUDGET_SECS)?;
        tracing::info!("Recording started");
        self.status(StatusLine::info("Recording..."));
        self.surface.timer(TimerDisplay::Remaining(session.remaining_seconds()));

        self.record_until_stop(session, input, encoder, segment_rx)
            .await
    }

    async fn record_until_stop(
        &mut self,
        session: &mut RecordingSession,
        mut input: MicrophoneInput,
        mut encoder: Box<dyn AudioEncoder>,
        mut segment_rx: mpsc::UnboundedReceiver<Segment>,
    ) -> Result<(AudioFile, Option<ControlGuard>), ClientError> {
        let (clock_tx, mut clock_rx) = mpsc::unbounded_channel();
        let tick_tx = clock_tx.clone();
        let mut clock = CountdownClock::start(
            RECORDING_BUDGET_SECS,
            move |remaining| {
                let _ = tick_tx.send(ClockEvent::Tick(remaining));
            },
            move || {
                let _ = clock_tx.send(ClockEvent::Expired);
            },
        );

        let reason = loop {
            tokio::select! {
                Some(samples) = input.samples.recv() => {
                    if let Err(e) = encoder.write_chunk(samples) {
                        tracing::error!("Failed to encode audio chunk: {}", e);
                        break StopReason::EncoderFailed;
                    }
                }
                Some(segment) = segment_rx.recv() => session.push_segment(segment)?,
                Some(event) = clock_rx.recv() => match event {
                    ClockEvent::Tick(remaining) => {
                        session.tick(remaining)?;
                        self.surface.timer(TimerDisplay::Remaining(session.remaining_seconds()));
                    }
                    ClockEvent::Expired => break StopReason::Expired,
                },
                Some(RecorderCommand::Toggle) = self.cmd_rx.recv() => break StopReason::UserStop,
                else => break StopReason::InputClosed,
            }
        };
        tracing::info!("Stopping recording ({:?})", reason);

        // Whichever stop came first wins; the clock may not fire after this
        clock.cancel();
        session.begin_stop()?;
        let guard = self.mic.try_disable();
        self.surface.timer(TimerDisplay::Idle);
        self.status(StatusLine::info("Processing clip..."));

        // Drain the audio still buffered behind the device before finalizing
        input.release();
        while let Some(chunk) = input.samples.recv().await {
            if let Err(e) = encoder.write_chunk(chunk) {
                tracing::error!("Failed to encode audio chunk during drain: {}", e);
                break;
            }
        }
        drop(input);

        let finalized = {
            let finalize = encoder.finalize();
            tokio::pin!(finalize);
            loop {
                tokio::select! {
                    result = &mut finalize => break result,
                    Some(_) = self.cmd_rx.recv() => {
                        tracing::debug!("Finalizing clip, ignoring toggle");
                    }
                }
            }
        };
        finalized.map_err(|e| ClientError::Encoder(e.to_string()))?;

        while let Ok(segment) = segment_rx.try_recv() {
            session.push_segment(segment)?;
        }

        let blob = session.finish()?;
        debug_assert_eq!(session.status(), CaptureStatus::Idle);
        tracing::info!("Recording stopped: {} bytes of {}", blob.bytes.len(), blob.mime_type);

        let filename = clip_filename(&blob.mime_type);
        Ok((AudioFile::new(blob.bytes, filename, blob.mime_type), guard))
    }
}

/// Handle for communicating with the Recorder
#[derive(Clone)]
pub struct RecorderHandle {
    tx: mpsc::Sender<RecorderCommand>,
}

impl RecorderHandle {
    pub fn new(tx: mpsc::Sender<RecorderCommand>) -> Self {
        Self { tx }
    }

    pub async fn toggle(&self) -> anyhow::Result<()> {
        self.tx
            .send(RecorderCommand::Toggle)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to send toggle command: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakePlatform, RecordingSurface, SurfaceEvent};
    use std::time::Duration;
    use tokio::task::LocalSet;

    struct Harness {
        handle: RecorderHandle,
        reports: mpsc::Receiver<CaptureReport>,
        mic: Rc<Control>,
        surface: Rc<RecordingSurface>,
    }

    fn spawn_recorder(platform: FakePlatform) -> Harness {
        let surface = Rc::new(RecordingSurface::default());
        let mic = Control::new(ControlId::Mic, surface.clone());
        let (cmd_tx, cmd_rx) = mpsc::channel(10);
        let (report_tx, reports) = mpsc::channel(10);
        let recorder = Recorder::new(
            Box::new(platform),
            mic.clone(),
            surface.clone(),
            cmd_rx,
            report_tx,
        );
        tokio::task::spawn_local(recorder.run());
        Harness {
            handle: RecorderHandle::new(cmd_tx),
            reports,
            mic,
            surface,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_stops_and_reports_clip() {
        LocalSet::new()
            .run_until(async {
                let platform = FakePlatform::with_segments(vec![
                    Segment::new(b"RIFF".to_vec(), Some("audio/wav")),
                    Segment::new(b"data".to_vec(), None),
                ]);
                let released = platform.released.clone();
                let mut h = spawn_recorder(platform);

                h.handle.toggle().await.unwrap();
                let report = h.reports.recv().await.unwrap();

                let CaptureReport::Clip { file, guard } = report else {
                    panic!("expected a clip");
                };
                assert_eq!(file.bytes(), b"RIFFdata");
                assert_eq!(file.mime_type(), "audio/wav");
                assert_eq!(file.filename(), "mic_clip.wav");
                assert_eq!(released.get(), 1);

                // Control stays disabled until the clip has been handed off
                assert!(guard.is_some());
                assert!(!h.mic.is_enabled());
                drop(guard);
                assert!(h.mic.is_enabled());

                let timers = h.surface.timer_events();
                assert_eq!(timers.first(), Some(&TimerDisplay::Remaining(10)));
                assert!(timers.contains(&TimerDisplay::Remaining(0)));
                assert_eq!(timers.last(), Some(&TimerDisplay::Idle));
                let remaining: Vec<u32> = timers
                    .iter()
                    .filter_map(|t| match t {
                        TimerDisplay::Remaining(s) => Some(*s),
                        TimerDisplay::Idle => None,
                    })
                    .collect();
                assert!(remaining.windows(2).all(|w| w[0] >= w[1]));
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_user_stop_converges_on_same_path() {
        LocalSet::new()
            .run_until(async {
                let platform = FakePlatform::with_segments(vec![Segment::new(
                    b"clip".to_vec(),
                    Some("audio/wav"),
                )]);
                let released = platform.released.clone();
                let mut h = spawn_recorder(platform);

                h.handle.toggle().await.unwrap();
                tokio::time::sleep(Duration::from_millis(3500)).await;
                h.handle.toggle().await.unwrap();

                let report = h.reports.recv().await.unwrap();
                let CaptureReport::Clip { file, guard } = report else {
                    panic!("expected a clip");
                };
                assert_eq!(file.bytes(), b"clip");
                assert_eq!(released.get(), 1);
                drop(guard);

                // No ticks render once stopped
                tokio::time::sleep(Duration::from_secs(15)).await;
                let timers = h.surface.timer_events();
                assert_eq!(timers.last(), Some(&TimerDisplay::Idle));
                assert!(!timers.contains(&TimerDisplay::Remaining(5)));
                assert_eq!(released.get(), 1);
            })
            .await;
    }

    fn capture_attempts(surface: &RecordingSurface) -> usize {
        surface
            .status_texts(ControlId::Mic)
            .iter()
            .filter(|s| *s == "Requesting microphone access...")
            .count()
    }

    #[tokio::test(start_paused = true)]
    async fn test_double_stop_does_not_restart() {
        LocalSet::new()
            .run_until(async {
                let platform = FakePlatform::with_segments(vec![Segment::new(
                    b"clip".to_vec(),
                    Some("audio/wav"),
                )]);
                let released = platform.released.clone();
                let mut h = spawn_recorder(platform);

                h.handle.toggle().await.unwrap();
                tokio::time::sleep(Duration::from_secs(3)).await;
                h.handle.toggle().await.unwrap();
                h.handle.toggle().await.unwrap();

                let CaptureReport::Clip { guard, .. } = h.reports.recv().await.unwrap() else {
                    panic!("expected a clip");
                };

                // The upload holds the control; toggles meanwhile are dropped
                h.handle.toggle().await.unwrap();
                tokio::time::sleep(Duration::from_secs(15)).await;
                drop(guard);
                tokio::time::sleep(Duration::from_secs(15)).await;

                assert!(h.reports.try_recv().is_err());
                assert_eq!(capture_attempts(&h.surface), 1);
                assert_eq!(released.get(), 1);
                assert!(h.mic.is_enabled());
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_on_expiry_tick_does_not_restart() {
        LocalSet::new()
            .run_until(async {
                let mut h = spawn_recorder(FakePlatform::with_segments(Vec::new()));

                h.handle.toggle().await.unwrap();
                // Lands on the same instant as the expiry
                tokio::time::sleep(Duration::from_secs(10)).await;
                h.handle.toggle().await.unwrap();

                let report = h.reports.recv().await.unwrap();
                drop(report);
                tokio::time::sleep(Duration::from_secs(15)).await;

                assert!(h.reports.try_recv().is_err());
                assert_eq!(capture_attempts(&h.surface), 1);
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_permission_denied_returns_to_idle() {
        LocalSet::new()
            .run_until(async {
                let platform = FakePlatform::denied();
                let released = platform.released.clone();
                let mut h = spawn_recorder(platform);

                h.handle.toggle().await.unwrap();
                let report = h.reports.recv().await.unwrap();

                assert!(matches!(
                    report,
                    CaptureReport::Failed(ClientError::PermissionDenied(_))
                ));
                assert_eq!(released.get(), 0);
                assert!(h.mic.is_enabled());
                assert!(h.surface.events().contains(&SurfaceEvent::Status(
                    ControlId::Mic,
                    StatusLine::error("Microphone access denied")
                )));

                // The next toggle starts a fresh attempt
                h.handle.toggle().await.unwrap();
                assert!(matches!(
                    h.reports.recv().await.unwrap(),
                    CaptureReport::Failed(_)
                ));
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_unsupported_encoder_releases_microphone() {
        LocalSet::new()
            .run_until(async {
                let platform = FakePlatform::unsupported();
                let released = platform.released.clone();
                let mut h = spawn_recorder(platform);

                h.handle.toggle().await.unwrap();
                let report = h.reports.recv().await.unwrap();

                assert!(matches!(
                    report,
                    CaptureReport::Failed(ClientError::CaptureUnsupported(_))
                ));
                assert_eq!(released.get(), 1);
                assert!(h.surface.events().contains(&SurfaceEvent::Status(
                    ControlId::Mic,
                    StatusLine::error("Recording not supported on this platform")
                )));
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_toggle_while_acquiring_is_ignored() {
        LocalSet::new()
            .run_until(async {
                let platform = FakePlatform::with_segments(vec![Segment::new(
                    b"x".to_vec(),
                    Some("audio/wav"),
                )])
                .acquire_delay(Duration::from_secs(2));
                let released = platform.released.clone();
                let mut h = spawn_recorder(platform);

                h.handle.toggle().await.unwrap();
                tokio::time::sleep(Duration::from_millis(500)).await;
                h.handle.toggle().await.unwrap();

                // The ignored toggle must not cut the recording short
                let report = h.reports.recv().await.unwrap();
                assert!(matches!(report, CaptureReport::Clip { .. }));
                assert!(h.surface.timer_events().contains(&TimerDisplay::Remaining(0)));
                assert_eq!(released.get(), 1);
                drop(report);

                tokio::time::sleep(Duration::from_secs(20)).await;
                assert!(h.reports.try_recv().is_err());
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_capture_still_yields_blob() {
        LocalSet::new()
            .run_until(async {
                let mut h = spawn_recorder(FakePlatform::with_segments(Vec::new()));

                h.handle.toggle().await.unwrap();
                let CaptureReport::Clip { file, .. } = h.reports.recv().await.unwrap() else {
                    panic!("expected a clip");
                };
                assert!(file.bytes().is_empty());
                assert_eq!(file.mime_type(), "audio/webm");
                assert_eq!(file.filename(), "mic_clip.webm");
            })
            .await;
    }
}
