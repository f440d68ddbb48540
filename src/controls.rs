use std::cell::Cell;
use std::rc::Rc;

use crate::surface::Surface;

/// The four user-triggerable controls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlId {
    Save,
    Find,
    Spotify,
    Mic,
}

impl ControlId {
    pub fn label(self) -> &'static str {
        match self {
            ControlId::Save => "save",
            ControlId::Find => "find",
            ControlId::Spotify => "spotify",
            ControlId::Mic => "mic",
        }
    }
}

/// Enabled flag of one control
///
/// Only ever touched from the local task set, so a `Cell` is enough.
pub struct Control {
    id: ControlId,
    enabled: Cell<bool>,
    surface: Rc<dyn Surface>,
}

impl Control {
    pub fn new(id: ControlId, surface: Rc<dyn Surface>) -> Rc<Self> {
        Rc::new(Self {
            id,
            enabled: Cell::new(true),
            surface,
        })
    }

    pub fn id(&self) -> ControlId {
        self.id
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.get()
    }

    /// Disable the control for as long as the returned guard lives.
    /// Returns `None` if an operation already holds it.
    pub fn try_disable(self: &Rc<Self>) -> Option<ControlGuard> {
        if !self.enabled.replace(false) {
            return None;
        }
        self.surface.control_changed(self.id, false);
        Some(ControlGuard {
            control: Rc::clone(self),
        })
    }
}

/// Re-enables its control exactly once, when dropped
#[must_use = "the control is re-enabled as soon as the guard is dropped"]
pub struct ControlGuard {
    control: Rc<Control>,
}

impl ControlGuard {
    pub fn control(&self) -> ControlId {
        self.control.id
    }
}

impl Drop for ControlGuard {
    fn drop(&mut self) {
        self.control.enabled.set(true);
        self.control.surface.control_changed(self.control.id, true);
    }
}

impl std::fmt::Debug for ControlGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControlGuard")
            .field("control", &self.control.id)
            .finish()
    }
}

/// One control per user action
pub struct Controls {
    pub save: Rc<Control>,
    pub find: Rc<Control>,
    pub spotify: Rc<Control>,
    pub mic: Rc<Control>,
}

impl Controls {
    pub fn new(surface: Rc<dyn Surface>) -> Self {
        Self {
            save: Control::new(ControlId::Save, surface.clone()),
            find: Control::new(ControlId::Find, surface.clone()),
            spotify: Control::new(ControlId::Spotify, surface.clone()),
            mic: Control::new(ControlId::Mic, surface),
        }
    }

    pub fn get(&self, id: ControlId) -> &Rc<Control> {
        match id {
            ControlId::Save => &self.save,
            ControlId::Find => &self.find,
            ControlId::Spotify => &self.spotify,
            ControlId::Mic => &self.mic,
        }
    }
}
