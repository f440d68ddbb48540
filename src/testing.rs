//! Test doubles shared by the unit tests.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::audio::{AudioEncoder, CapturePlatform, HardwareHandle, MicrophoneInput, Segment};
use crate::controls::ControlId;
use crate::coordinator::FingerprintBackend;
use crate::error::ClientError;
use crate::model::{Operation, Outcome, Payload};
use crate::presenter::{RenderSpec, ResultPanel};
use crate::surface::{StatusLine, Surface, TimerDisplay};

#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceEvent {
    Control(ControlId, bool),
    Status(ControlId, StatusLine),
    Cleared(ControlId),
    Rendered(ControlId, RenderSpec),
    Timer(TimerDisplay),
}

/// Surface that remembers everything it was asked to show
#[derive(Default)]
pub struct RecordingSurface {
    events: RefCell<Vec<SurfaceEvent>>,
}

impl RecordingSurface {
    pub fn events(&self) -> Vec<SurfaceEvent> {
        self.events.borrow().clone()
    }

    pub fn control_events(&self, control: ControlId) -> Vec<bool> {
        self.events
            .borrow()
            .iter()
            .filter_map(|e| match e {
                SurfaceEvent::Control(id, enabled) if *id == control => Some(*enabled),
                _ => None,
            })
            .collect()
    }

    pub fn status_texts(&self, control: ControlId) -> Vec<String> {
        self.events
            .borrow()
            .iter()
            .filter_map(|e| match e {
                SurfaceEvent::Status(id, status) if *id == control => Some(status.text.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn last_status(&self, control: ControlId) -> Option<StatusLine> {
        self.events.borrow().iter().rev().find_map(|e| match e {
            SurfaceEvent::Status(id, status) if *id == control => Some(status.clone()),
            _ => None,
        })
    }

    /// The panel currently on display, if the last render was not cleared
    pub fn last_panel(&self, control: ControlId) -> Option<ResultPanel> {
        self.events.borrow().iter().rev().find_map(|e| match e {
            SurfaceEvent::Cleared(id) if *id == control => Some(None),
            SurfaceEvent::Rendered(id, RenderSpec::Panel(panel)) if *id == control => {
                Some(Some(panel.clone()))
            }
            _ => None,
        })?
    }

    pub fn timer_events(&self) -> Vec<TimerDisplay> {
        self.events
            .borrow()
            .iter()
            .filter_map(|e| match e {
                SurfaceEvent::Timer(display) => Some(*display),
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: SurfaceEvent) {
        self.events.borrow_mut().push(event);
    }
}

impl Surface for RecordingSurface {
    fn control_changed(&self, control: ControlId, enabled: bool) {
        self.push(SurfaceEvent::Control(control, enabled));
    }

    fn status(&self, control: ControlId, status: &StatusLine) {
        self.push(SurfaceEvent::Status(control, status.clone()));
    }

    fn clear_result(&self, control: ControlId) {
        self.push(SurfaceEvent::Cleared(control));
    }

    fn render(&self, control: ControlId, spec: &RenderSpec) {
        self.push(SurfaceEvent::Rendered(control, spec.clone()));
    }

    fn timer(&self, display: TimerDisplay) {
        self.push(SurfaceEvent::Timer(display));
    }
}

/// Backend answering from a script of outcomes
pub struct FakeBackend {
    calls: RefCell<Vec<(Operation, Payload)>>,
    outcomes: RefCell<VecDeque<Outcome>>,
    delay: Duration,
}

impl FakeBackend {
    pub fn new(outcomes: Vec<Outcome>) -> Self {
        Self {
            calls: RefCell::new(Vec::new()),
            outcomes: RefCell::new(outcomes.into()),
            delay: Duration::ZERO,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn operations(&self) -> Vec<Operation> {
        self.calls.borrow().iter().map(|(op, _)| *op).collect()
    }

    pub fn payloads(&self) -> Vec<Payload> {
        self.calls.borrow().iter().map(|(_, p)| p.clone()).collect()
    }
}

#[async_trait(?Send)]
impl FingerprintBackend for FakeBackend {
    async fn perform(&self, operation: Operation, payload: Payload) -> Outcome {
        self.calls.borrow_mut().push((operation, payload));
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.outcomes
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| {
                Outcome::Failure(ClientError::TransportFailure {
                    operation,
                    reason: "no scripted outcome".into(),
                })
            })
    }
}

struct FakeHandle {
    released: Rc<Cell<u32>>,
    // Keeps the sample channel open for as long as the "hardware" is held
    _samples: mpsc::Sender<Vec<f32>>,
}

impl HardwareHandle for FakeHandle {
    fn release(self: Box<Self>) {
        self.released.set(self.released.get() + 1);
    }
}

/// Encoder that ignores samples and emits a fixed set of segments on finalize
struct FakeEncoder {
    segments: Vec<Segment>,
    tx: mpsc::UnboundedSender<Segment>,
}

#[async_trait]
impl AudioEncoder for FakeEncoder {
    fn write_chunk(&mut self, _samples: Vec<f32>) -> Result<()> {
        Ok(())
    }

    async fn finalize(&mut self) -> Result<()> {
        for segment in self.segments.drain(..) {
            self.tx
                .send(segment)
                .map_err(|_| anyhow::anyhow!("segment receiver closed"))?;
        }
        Ok(())
    }
}

enum Mode {
    Working(Vec<Segment>),
    Denied,
    Unsupported,
}

/// Capture platform with a scripted microphone
pub struct FakePlatform {
    mode: Mode,
    acquire_delay: Duration,
    pub released: Rc<Cell<u32>>,
}

impl FakePlatform {
    fn new(mode: Mode) -> Self {
        Self {
            mode,
            acquire_delay: Duration::ZERO,
            released: Rc::new(Cell::new(0)),
        }
    }

    pub fn with_segments(segments: Vec<Segment>) -> Self {
        Self::new(Mode::Working(segments))
    }

    pub fn denied() -> Self {
        Self::new(Mode::Denied)
    }

    pub fn unsupported() -> Self {
        Self::new(Mode::Unsupported)
    }

    pub fn acquire_delay(mut self, delay: Duration) -> Self {
        self.acquire_delay = delay;
        self
    }
}

#[async_trait(?Send)]
impl CapturePlatform for FakePlatform {
    async fn acquire_microphone(&self) -> Result<MicrophoneInput, ClientError> {
        if !self.acquire_delay.is_zero() {
            tokio::time::sleep(self.acquire_delay).await;
        }
        if let Mode::Denied = self.mode {
            return Err(ClientError::PermissionDenied("user said no".into()));
        }

        let (tx, rx) = mpsc::channel(10);
        let handle = FakeHandle {
            released: self.released.clone(),
            _samples: tx,
        };
        Ok(MicrophoneInput::new(rx, Box::new(handle)))
    }

    fn open_encoder(
        &self,
        segments: mpsc::UnboundedSender<Segment>,
    ) -> Result<Box<dyn AudioEncoder>, ClientError> {
        match &self.mode {
            Mode::Working(scripted) => Ok(Box::new(FakeEncoder {
                segments: scripted.clone(),
                tx: segments,
            })),
            Mode::Denied | Mode::Unsupported => {
                Err(ClientError::CaptureUnsupported("no encoder".into()))
            }
        }
    }
}

/// Serve a single HTTP request with a canned JSON response.
///
/// Returns the base URL and a handle resolving to the raw request text.
pub async fn serve_once(status: u16, body: &'static str) -> (String, JoinHandle<String>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let request = read_request(&mut socket).await;

        let response = format!(
            "HTTP/1.1 {status} X\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.ok();
        request
    });

    (format!("http://{addr}"), handle)
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
    let mut raw = Vec::new();
    let mut buf = [0u8; 4096];

    loop {
        let n = socket.read(&mut buf).await.unwrap();
        if n == 0 {
            break;
        }
        raw.extend_from_slice(&buf[..n]);

        let text = String::from_utf8_lossy(&raw);
        let Some(header_end) = text.find("\r\n\r\n") else {
            continue;
        };
        let headers = text[..header_end].to_ascii_lowercase();
        let body_len = raw.len() - header_end - 4;

        if headers.contains("transfer-encoding: chunked") {
            if text.ends_with("0\r\n\r\n") {
                break;
            }
        } else {
            let expected = headers
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if body_len >= expected {
                break;
            }
        }
    }

    String::from_utf8_lossy(&raw).into_owned()
}
