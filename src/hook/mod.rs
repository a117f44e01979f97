//! Hook dispatch engine
//!
//! A fixed pool of OS-level keyboard hook registrations. Each slot tracks
//! the keys currently held as a live [`crate::binding::Binding`] and fires
//! a command when that combination exactly matches an entry in the slot's
//! table. The watchdog and session watcher repair "stuck key" state the
//! OS hook mechanism is known to leave behind.

mod pool;
mod session;
mod slot;
mod watchdog;

pub use pool::{HookPool, TableHandle, DEFAULT_POOL_SIZE};
pub use session::{SessionWatcher, SessionWatcherHandle};
pub use slot::{Dispatch, HookSlot, KeyDirection, LiveBinding};
pub use watchdog::{Watchdog, WatchdogHandle, GRACE_TICKS, POLL_INTERVAL};

/// Errors raised by the hook engine.
#[derive(Debug, thiserror::Error)]
pub enum HookError {
    #[error("hook pool exhausted: all {0} slots already hold a table")]
    PoolExhausted(usize),

    #[error("failed to install OS keyboard hook: {0}")]
    Install(String),

    #[error("session notifications are not supported on this platform")]
    Unsupported,

    #[error("failed to spawn thread: {0}")]
    ThreadSpawn(String),
}
