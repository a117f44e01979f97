//! Self-healing watchdog for stuck key state
//!
//! Low-level keyboard hooks drop or reorder events under load; a missed
//! up-event leaves a bit permanently set in a slot's live binding, and
//! because dispatch is exact-match no further correct key press can ever
//! clear it. The watchdog polls two independent signals (hardware key
//! state and in-flight callback counters) and force-resets the pool once
//! both have been quiet for a full grace window. A heuristic with bounded
//! recovery time, not a correctness proof.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{debug, info};

use crate::platform::KeyStateProbe;

use super::pool::HookPool;
use super::HookError;

/// How often the watchdog samples key and slot state.
pub const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Consecutive quiet ticks required before a reset.
pub const GRACE_TICKS: u32 = 5;

/// Configurable poll loop; [`Watchdog::spawn`] moves it onto a dedicated
/// thread.
#[derive(Debug, Clone, Copy)]
pub struct Watchdog {
    interval: Duration,
    grace_ticks: u32,
}

impl Watchdog {
    pub fn new() -> Self {
        Self {
            interval: POLL_INTERVAL,
            grace_ticks: GRACE_TICKS,
        }
    }

    /// Override the reference timing, mainly for tests.
    pub fn with_timing(interval: Duration, grace_ticks: u32) -> Self {
        Self {
            interval,
            grace_ticks: grace_ticks.max(1),
        }
    }

    pub fn spawn(
        self,
        pool: Arc<HookPool>,
        probe: Arc<dyn KeyStateProbe>,
    ) -> Result<WatchdogHandle, HookError> {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);

        let join = thread::Builder::new()
            .name("watchdog".to_string())
            .spawn(move || {
                info!("watchdog started");
                run_loop(&pool, probe.as_ref(), self.interval, self.grace_ticks, &stop_flag);
                info!("watchdog stopped");
            })
            .map_err(|e| HookError::ThreadSpawn(e.to_string()))?;

        Ok(WatchdogHandle {
            stop,
            join: Some(join),
        })
    }
}

impl Default for Watchdog {
    fn default() -> Self {
        Self::new()
    }
}

fn run_loop(
    pool: &HookPool,
    probe: &dyn KeyStateProbe,
    interval: Duration,
    grace_ticks: u32,
    stop: &AtomicBool,
) {
    let mut quiet_ticks = 0u32;

    while !stop.load(Ordering::Relaxed) {
        thread::sleep(interval);

        // A user mid-chord must not be interrupted, and an in-flight
        // callback may be a perfectly correct update still being applied.
        // Either signal restarts the grace window.
        if probe.any_key_down() {
            quiet_ticks = 0;
            continue;
        }
        if pool.slots().iter().any(|slot| slot.in_flight()) {
            quiet_ticks = 0;
            continue;
        }

        quiet_ticks += 1;
        if quiet_ticks >= grace_ticks {
            quiet_ticks = 0;
            let stuck = pool
                .slots()
                .iter()
                .any(|slot| !slot.live_snapshot().is_empty());
            if stuck {
                debug!("no key held through grace window; clearing stuck key state");
            }
            pool.reset_all();
        }
    }
}

/// Stops and joins the watchdog thread.
pub struct WatchdogHandle {
    stop: Arc<AtomicBool>,
    join: Option<thread::JoinHandle<()>>,
}

impl WatchdogHandle {
    pub fn stop(mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

impl Drop for WatchdogHandle {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}
