use crate::audio::CapturePlatform;
use crate::controls::{ControlGuard, ControlId, Controls};
use crate::coordinator::FingerprintBackend;
use crate::messages::{Action, CaptureReport};
use crate::model::{AudioFile, Operation, Payload};
use crate::presenter::{self, RenderSpec};
use crate::services::{Recorder, RecorderHandle};
use crate::surface::{StatusLine, Surface};

use anyhow::Result;
use std::path::PathBuf;
use std::rc::Rc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

/// Wires user actions to the recorder and the backend
///
/// Each action runs with its control disabled; the control comes back when
/// the operation's guard drops, whatever the outcome. Operations run as local
/// tasks so different controls can be busy at the same time.
pub struct App {
    backend: Rc<dyn FingerprintBackend>,
    surface: Rc<dyn Surface>,
    controls: Controls,
    recorder: RecorderHandle,
    reports: mpsc::Receiver<CaptureReport>,
    in_flight: JoinSet<bool>,
}

impl App {
    /// Must be called inside a LocalSet: the recorder is spawned locally.
    pub fn new(
        backend: Rc<dyn FingerprintBackend>,
        platform: Box<dyn CapturePlatform>,
        surface: Rc<dyn Surface>,
    ) -> Self {
        let controls = Controls::new(surface.clone());
        let (recorder, reports) =
            Self::setup_recorder(platform, &controls, surface.clone());

        Self {
            backend,
            surface,
            controls,
            recorder,
            reports,
            in_flight: JoinSet::new(),
        }
    }

    fn setup_recorder(
        platform: Box<dyn CapturePlatform>,
        controls: &Controls,
        surface: Rc<dyn Surface>,
    ) -> (RecorderHandle, mpsc::Receiver<CaptureReport>) {
        let (recorder_tx, recorder_rx) = mpsc::channel(10);
        let (report_tx, report_rx) = mpsc::channel(10);

        // Create and spawn Recorder (using spawn_local because it's !Send)
        let recorder = Recorder::new(
            platform,
            controls.mic.clone(),
            surface,
            recorder_rx,
            report_tx,
        );
        tokio::task::spawn_local(recorder.run());

        (RecorderHandle::new(recorder_tx), report_rx)
    }

    /// Interactive session: handle actions until the channel closes or Ctrl+C.
    pub async fn run(mut self, mut actions: mpsc::Receiver<Action>) -> Result<()> {
        loop {
            tracing::debug!("Main loop: waiting for event");
            tokio::select! {
                action = actions.recv() => match action {
                    Some(action) => self.dispatch(action).await,
                    None => break,
                },
                Some(report) = self.reports.recv() => self.handle_report(report),
                Some(finished) = self.in_flight.join_next() => {
                    if let Err(e) = finished {
                        tracing::error!("Operation task failed: {}", e);
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Received Ctrl+C, shutting down");
                    break;
                }
            }
        }

        self.drain().await;
        tracing::info!("Session closed");
        Ok(())
    }

    /// Run one file or URL action to completion. Returns whether it succeeded.
    pub async fn execute(mut self, action: Action) -> Result<bool> {
        self.dispatch(action).await;
        Ok(self.drain().await)
    }

    /// Record one clip and match it. Each message on `stop` stops the
    /// recording early.
    pub async fn listen(mut self, mut stop: mpsc::Receiver<()>) -> Result<bool> {
        self.dispatch(Action::ToggleMic).await;
        let mut stop_open = true;

        loop {
            tokio::select! {
                signal = stop.recv(), if stop_open => match signal {
                    Some(()) => self.dispatch(Action::ToggleMic).await,
                    None => stop_open = false,
                },
                report = self.reports.recv() => {
                    let report = report
                        .ok_or_else(|| anyhow::anyhow!("Recorder stopped unexpectedly"))?;
                    let captured = matches!(report, CaptureReport::Clip { .. });
                    self.handle_report(report);
                    let uploaded = self.drain().await;
                    return Ok(captured && uploaded);
                }
            }
        }
    }

    pub async fn dispatch(&mut self, action: Action) {
        tracing::debug!("Dispatching {:?}", action);
        match action {
            Action::SaveFile(path) => self.submit_file(ControlId::Save, Operation::Save, path),
            Action::FindFile(path) => self.submit_file(ControlId::Find, Operation::Find, path),
            Action::DownloadFromSource(url) => self.submit_url(url),
            Action::ToggleMic => self.toggle_mic().await,
        }
    }

    /// Disable the control and clear its previous result
    fn begin(&self, control: ControlId) -> Option<ControlGuard> {
        let Some(guard) = self.controls.get(control).try_disable() else {
            tracing::info!("{} is still busy, ignoring", control.label());
            return None;
        };
        self.surface.clear_result(control);
        Some(guard)
    }

    fn submit_file(&mut self, control: ControlId, operation: Operation, path: Option<PathBuf>) {
        let Some(guard) = self.begin(control) else {
            return;
        };
        let backend = self.backend.clone();
        let surface = self.surface.clone();

        self.in_flight.spawn_local(async move {
            let _guard = guard;
            match AudioFile::from_path(path.as_deref()).await {
                Ok(file) => {
                    run_operation(&*backend, &*surface, control, operation, Payload::Audio(file))
                        .await
                }
                Err(err) => {
                    surface.status(control, &StatusLine::error(err.to_string()));
                    false
                }
            }
        });
    }

    fn submit_url(&mut self, url: String) {
        let control = ControlId::Spotify;
        let Some(guard) = self.begin(control) else {
            return;
        };
        let backend = self.backend.clone();
        let surface = self.surface.clone();

        self.in_flight.spawn_local(async move {
            let _guard = guard;
            match Payload::source_url(&url) {
                Ok(payload) => {
                    run_operation(
                        &*backend,
                        &*surface,
                        control,
                        Operation::DownloadFromSource,
                        payload,
                    )
                    .await
                }
                Err(err) => {
                    surface.status(control, &StatusLine::error(err.to_string()));
                    false
                }
            }
        });
    }

    async fn toggle_mic(&mut self) {
        // Disabled from the moment a clip stops until its upload finishes
        if !self.controls.mic.is_enabled() {
            tracing::info!("Microphone clip still being processed, ignoring");
            return;
        }
        if let Err(e) = self.recorder.toggle().await {
            tracing::error!("Error toggling recording: {}", e);
        }
    }

    fn handle_report(&mut self, report: CaptureReport) {
        match report {
            CaptureReport::Clip { file, guard } => {
                let backend = self.backend.clone();
                let surface = self.surface.clone();
                self.in_flight.spawn_local(async move {
                    let _guard = guard;
                    run_operation(
                        &*backend,
                        &*surface,
                        ControlId::Mic,
                        Operation::Find,
                        Payload::Audio(file),
                    )
                    .await
                });
            }
            CaptureReport::Failed(err) => {
                tracing::debug!("Capture ended without a clip: {}", err);
            }
        }
    }

    /// Wait for every outstanding operation. True if all of them succeeded.
    async fn drain(&mut self) -> bool {
        let mut all_succeeded = true;
        while let Some(finished) = self.in_flight.join_next().await {
            match finished {
                Ok(succeeded) => all_succeeded &= succeeded,
                Err(e) => {
                    tracing::error!("Operation task failed: {}", e);
                    all_succeeded = false;
                }
            }
        }
        all_succeeded
    }
}

/// One backend call plus its rendering
async fn run_operation(
    backend: &dyn FingerprintBackend,
    surface: &dyn Surface,
    control: ControlId,
    operation: Operation,
    payload: Payload,
) -> bool {
    tracing::info!("{:?} started from {}", operation, control.label());
    surface.status(control, &StatusLine::info(operation.progress_message()));

    let outcome = backend.perform(operation, payload).await;

    match presenter::present(operation, &outcome) {
        RenderSpec::Error { message } => {
            tracing::info!("{:?} failed: {}", operation, message);
            surface.status(control, &StatusLine::error(format!("Error: {message}")));
            false
        }
        spec => {
            tracing::info!("{:?} complete", operation);
            surface.status(control, &StatusLine::ok(operation.success_message()));
            surface.render(control, &spec);
            true
        }
    }
}
