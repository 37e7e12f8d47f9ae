//! Shared device mode and quit state.
//!
//! The transport layer delivers attach/detach events from its own
//! thread; the restore flow polls. The cell is edge-triggered and
//! monotonic: the mode only moves forward and the quit flag is never
//! cleared.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

use log::debug;

use crate::device::DeviceMode;

/// Attach/detach notifications from the transport layer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DeviceEvent {
    Attached,
    Detached,
}

#[derive(Debug, Default)]
struct MonitorState {
    mode: AtomicU8,
    quit: AtomicBool,
    awaiting_restore: AtomicBool,
}

/// Cheaply cloneable handle to the shared mode/quit cell.
///
/// One clone is registered with the transport layer as the event
/// observer; the restore flow polls its own.
#[derive(Clone, Debug, Default)]
pub struct EventMonitor {
    state: Arc<MonitorState>,
}

impl EventMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets the last observed device mode.
    pub fn mode(&self) -> DeviceMode {
        self.state.mode.load(Ordering::SeqCst).into()
    }

    /// Records a device mode observed by the main flow.
    pub fn set_mode(&self, mode: DeviceMode) {
        self.state.mode.store(mode as u8, Ordering::SeqCst);
    }

    /// Gets whether the run should stop.
    pub fn quit(&self) -> bool {
        self.state.quit.load(Ordering::SeqCst)
    }

    /// Requests a stop. Never cleared.
    pub fn set_quit(&self) {
        self.state.quit.store(true, Ordering::SeqCst);
    }

    /// Marks whether a device attach should be interpreted as the
    /// restore stub coming up.
    pub fn set_awaiting_restore(&self, awaiting: bool) {
        self.state
            .awaiting_restore
            .store(awaiting, Ordering::SeqCst);
    }

    /// Observer entry point for the transport layer.
    pub fn handle_event(&self, event: DeviceEvent) {
        debug!("device event: {event:?}");

        match event {
            DeviceEvent::Attached => {
                if self.state.awaiting_restore.load(Ordering::SeqCst) {
                    self.set_mode(DeviceMode::Restore);
                }
            }
            DeviceEvent::Detached => self.set_quit(),
        }
    }
}
