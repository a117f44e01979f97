//! Session-change listener
//!
//! Key-up events for keys held at the moment of a lock, unlock, user
//! switch, or remote-session transition are frequently never delivered at
//! all. Waiting for the watchdog would leave phantom state held for up to
//! a full grace window, so session notifications trigger an immediate
//! pool-wide reset instead.

use std::sync::Arc;

use crate::platform::SessionListener;

use super::pool::HookPool;
use super::HookError;

/// Subscribes a hidden listener to OS session-change notifications and
/// resets the pool on every one of them.
pub struct SessionWatcher;

impl SessionWatcher {
    /// Start listening. On platforms without session notifications this
    /// returns [`HookError::Unsupported`]; the daemon then relies on the
    /// watchdog alone.
    pub fn spawn(pool: Arc<HookPool>) -> Result<SessionWatcherHandle, HookError> {
        SessionListener::spawn(pool).map(|inner| SessionWatcherHandle { inner })
    }
}

/// Stops and joins the listener thread.
pub struct SessionWatcherHandle {
    inner: SessionListener,
}

impl SessionWatcherHandle {
    pub fn stop(self) {
        self.inner.stop();
    }
}

#[cfg(all(test, not(windows)))]
mod tests {
    use super::*;
    use crate::binding::BindingTable;
    use crate::dispatch::ShellRunner;
    use crate::platform::NullBackend;

    #[test]
    fn test_unsupported_platform_reports_cleanly() {
        let pool = Arc::new(HookPool::with_size(
            1,
            Arc::new(ShellRunner),
            Box::<NullBackend>::default(),
        ));
        pool.register(BindingTable::new()).unwrap();
        assert!(matches!(
            SessionWatcher::spawn(pool),
            Err(HookError::Unsupported)
        ));
    }
}
