use crate::controls::ControlId;
use crate::presenter::{Emphasis, RenderSpec};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    Info,
    Ok,
    Error,
}

/// Short status message shown next to a control
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    pub kind: StatusKind,
    pub text: String,
}

impl StatusLine {
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            kind: StatusKind::Info,
            text: text.into(),
        }
    }

    pub fn ok(text: impl Into<String>) -> Self {
        Self {
            kind: StatusKind::Ok,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            kind: StatusKind::Error,
            text: text.into(),
        }
    }
}

/// Countdown display of the microphone control
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerDisplay {
    Remaining(u32),
    Idle,
}

/// Where statuses and results end up
///
/// Everything runs on the local task set, so implementations can use
/// interior mutability freely.
pub trait Surface {
    fn control_changed(&self, control: ControlId, enabled: bool);

    fn status(&self, control: ControlId, status: &StatusLine);

    fn clear_result(&self, control: ControlId);

    fn render(&self, control: ControlId, spec: &RenderSpec);

    fn timer(&self, display: TimerDisplay);
}

/// Plain terminal output
pub struct TerminalSurface;

impl Surface for TerminalSurface {
    fn control_changed(&self, control: ControlId, enabled: bool) {
        tracing::debug!(
            "Control {} {}",
            control.label(),
            if enabled { "enabled" } else { "disabled" }
        );
    }

    fn status(&self, control: ControlId, status: &StatusLine) {
        let marker = match status.kind {
            StatusKind::Info => "",
            StatusKind::Ok => " ok",
            StatusKind::Error => " !!",
        };
        println!("[{}]{} {}", control.label(), marker, status.text);
    }

    // Nothing is left on screen to clear: results are printed once.
    fn clear_result(&self, _control: ControlId) {}

    fn render(&self, control: ControlId, spec: &RenderSpec) {
        let RenderSpec::Panel(panel) = spec else {
            return;
        };

        if let Some(heading) = panel.heading {
            println!("[{}] {}:", control.label(), heading);
        }
        for field in &panel.fields {
            match field.emphasis {
                Emphasis::Strong => println!("    {}: {}", field.label, field.value),
                Emphasis::Code => println!("    {}: `{}`", field.label, field.value),
            }
        }
        for link in &panel.links {
            println!("    {}: {}", link.label, link.url);
        }
    }

    fn timer(&self, display: TimerDisplay) {
        match display {
            TimerDisplay::Remaining(secs) => println!("[mic] 00:{secs:02}"),
            TimerDisplay::Idle => tracing::debug!("Timer idle"),
        }
    }
}
