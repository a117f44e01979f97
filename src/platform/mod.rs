//! OS integration seam
//!
//! The engine reaches the operating system through two small traits so
//! dispatch, watchdog, and tests run anywhere; the real Win32 plumbing
//! lives in [`win32`]. Non-Windows builds get a no-op backend: the daemon
//! starts, parses config, and simply never receives key events.

#[cfg(windows)]
mod win32;

use std::sync::Arc;

use crate::hook::{HookError, HookPool, HookSlot};

/// Hardware-level "is anything held right now" query used by the
/// watchdog.
pub trait KeyStateProbe: Send + Sync {
    /// True if any key across the full virtual-key range is physically
    /// down.
    fn any_key_down(&self) -> bool;
}

/// Probe backed by the OS. On platforms without a key-state API it
/// reports nothing held, which leaves the watchdog free to reset.
#[derive(Debug, Default)]
pub struct OsKeyStateProbe;

impl KeyStateProbe for OsKeyStateProbe {
    fn any_key_down(&self) -> bool {
        #[cfg(windows)]
        return win32::any_key_down();
        #[cfg(not(windows))]
        false
    }
}

/// Installs and removes one OS-level keyboard hook per slot.
pub trait HookBackend: Send + Sync {
    /// Register a hook delivering this slot's events. The slot index is
    /// the uninstall key.
    fn install(&self, slot: Arc<HookSlot>) -> Result<(), HookError>;

    fn uninstall(&self, slot_index: usize);
}

/// The platform's real hook backend.
pub fn default_backend() -> Box<dyn HookBackend> {
    #[cfg(windows)]
    return Box::<win32::Win32Backend>::default();
    #[cfg(not(windows))]
    Box::<NullBackend>::default()
}

/// Backend that installs nothing and delivers nothing. Used on platforms
/// without hook support and throughout the tests, which feed slots
/// directly.
#[derive(Debug, Default)]
pub struct NullBackend;

impl HookBackend for NullBackend {
    fn install(&self, _slot: Arc<HookSlot>) -> Result<(), HookError> {
        Ok(())
    }

    fn uninstall(&self, _slot_index: usize) {}
}

/// Hidden OS session-notification listener. Thin platform shim; the
/// engine-facing API is [`crate::hook::SessionWatcher`].
pub struct SessionListener {
    #[cfg(windows)]
    inner: win32::SessionPump,
}

impl SessionListener {
    pub(crate) fn spawn(pool: Arc<HookPool>) -> Result<Self, HookError> {
        #[cfg(windows)]
        return win32::spawn_session_pump(pool).map(|inner| Self { inner });
        #[cfg(not(windows))]
        {
            let _ = pool;
            Err(HookError::Unsupported)
        }
    }

    pub(crate) fn stop(self) {
        #[cfg(windows)]
        self.inner.stop();
    }
}
