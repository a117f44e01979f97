//! Fixed-size pool of hook slots with round-robin table assignment

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use crate::binding::BindingTable;
use crate::dispatch::CommandRunner;
use crate::platform::HookBackend;

use super::slot::{HookSlot, TableEntry};
use super::HookError;

/// Default number of parallel hook registrations. Spreading tables over
/// several hooks limits how many bindings one silently broken hook can
/// take down with it.
pub const DEFAULT_POOL_SIZE: usize = 4;

/// Opaque identifier returned by [`HookPool::register`]. Callers keep it
/// to unregister later; they are not expected to know which slot holds
/// their table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TableHandle(u64);

impl TableHandle {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }
}

/// Owns the slot array, the round-robin cursor, and hook install state.
///
/// `register`/`unregister`/`start`/`stop` belong to a single control
/// context; only `reset_all` is expected to arrive concurrently, from the
/// watchdog and session watcher.
pub struct HookPool {
    slots: Vec<Arc<HookSlot>>,
    cursor: AtomicUsize,
    next_handle: AtomicU64,
    backend: Box<dyn HookBackend>,
    installed: Mutex<Vec<bool>>,
}

impl HookPool {
    pub fn new(runner: Arc<dyn CommandRunner>, backend: Box<dyn HookBackend>) -> Self {
        Self::with_size(DEFAULT_POOL_SIZE, runner, backend)
    }

    pub fn with_size(
        size: usize,
        runner: Arc<dyn CommandRunner>,
        backend: Box<dyn HookBackend>,
    ) -> Self {
        let size = size.max(1);
        let slots = (0..size)
            .map(|index| Arc::new(HookSlot::new(index, Arc::clone(&runner))))
            .collect();
        Self {
            slots,
            cursor: AtomicUsize::new(0),
            next_handle: AtomicU64::new(1),
            backend,
            installed: Mutex::new(vec![false; size]),
        }
    }

    pub fn size(&self) -> usize {
        self.slots.len()
    }

    pub fn slots(&self) -> &[Arc<HookSlot>] {
        &self.slots
    }

    /// Assign `table` to the first free slot at or after the cursor,
    /// advancing the cursor past it.
    pub fn register(&self, table: BindingTable) -> Result<TableHandle, HookError> {
        let n = self.slots.len();
        let start = self.cursor.load(Ordering::Relaxed);
        let index = (0..n)
            .map(|offset| (start + offset) % n)
            .find(|&i| !self.slots[i].has_table())
            .ok_or(HookError::PoolExhausted(n))?;

        let handle = TableHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        debug!(slot = index, ?handle, bindings = table.len(), "table registered");
        self.slots[index].publish_table(TableEntry {
            handle,
            table: Arc::new(table),
        });
        self.cursor.store((index + 1) % n, Ordering::Relaxed);
        Ok(handle)
    }

    /// Clear `handle`'s table from whichever slot currently holds it.
    pub fn unregister(&self, handle: TableHandle) {
        for slot in &self.slots {
            if slot.clear_table_if(handle) {
                debug!(slot = slot.index(), ?handle, "table unregistered");
                return;
            }
        }
        warn!(?handle, "unregister: no slot holds this table");
    }

    /// Install the OS hook for every slot that lacks one. A failed
    /// install disables only that slot; the pool keeps serving the rest.
    pub fn start(&self) {
        let mut installed = self.installed_state();
        for (index, slot) in self.slots.iter().enumerate() {
            if installed[index] {
                continue;
            }
            match self.backend.install(Arc::clone(slot)) {
                Ok(()) => {
                    installed[index] = true;
                    debug!(slot = index, "hook installed");
                }
                Err(e) => {
                    warn!(slot = index, %e, "hook install failed; slot disabled");
                }
            }
        }
    }

    /// Uninstall every slot's OS hook and discard its live state.
    pub fn stop(&self) {
        let mut installed = self.installed_state();
        for (index, slot) in self.slots.iter().enumerate() {
            if installed[index] {
                self.backend.uninstall(index);
                installed[index] = false;
                debug!(slot = index, "hook removed");
            }
            slot.reset();
        }
    }

    /// Clear every slot's live binding and liveness counters. Hook
    /// registrations are untouched. Safe from any thread.
    pub fn reset_all(&self) {
        for slot in &self.slots {
            slot.reset();
        }
        debug!("all slots reset");
    }

    fn installed_state(&self) -> std::sync::MutexGuard<'_, Vec<bool>> {
        match self.installed.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::ShellRunner;
    use crate::platform::NullBackend;

    fn pool(size: usize) -> HookPool {
        HookPool::with_size(size, Arc::new(ShellRunner), Box::<NullBackend>::default())
    }

    #[test]
    fn test_register_round_robins_tables() {
        let pool = pool(3);
        let handles: Vec<_> = (0..3)
            .map(|_| pool.register(BindingTable::new()).unwrap())
            .collect();

        for (i, handle) in handles.iter().enumerate() {
            assert_eq!(pool.slots()[i].table_handle(), Some(*handle));
        }
    }

    #[test]
    fn test_register_skips_occupied_slots() {
        let pool = pool(3);
        let a = pool.register(BindingTable::new()).unwrap();
        let _b = pool.register(BindingTable::new()).unwrap();
        pool.unregister(a);

        // Cursor sits at slot 2; slot 0 is free again and must be reused
        // once 2 is taken.
        let c = pool.register(BindingTable::new()).unwrap();
        let d = pool.register(BindingTable::new()).unwrap();
        assert_eq!(pool.slots()[2].table_handle(), Some(c));
        assert_eq!(pool.slots()[0].table_handle(), Some(d));
    }

    #[test]
    fn test_register_fails_when_full() {
        let pool = pool(2);
        pool.register(BindingTable::new()).unwrap();
        pool.register(BindingTable::new()).unwrap();
        assert!(matches!(
            pool.register(BindingTable::new()),
            Err(HookError::PoolExhausted(2))
        ));
    }

    #[test]
    fn test_unregister_finds_table_regardless_of_cursor() {
        let pool = pool(4);
        let handles: Vec<_> = (0..4)
            .map(|_| pool.register(BindingTable::new()).unwrap())
            .collect();

        pool.unregister(handles[1]);
        assert_eq!(pool.slots()[1].table_handle(), None);
        assert_eq!(pool.slots()[0].table_handle(), Some(handles[0]));
        assert_eq!(pool.slots()[3].table_handle(), Some(handles[3]));
    }

    #[test]
    fn test_reset_all_clears_every_slot() {
        use crate::hook::KeyDirection;

        let pool = pool(2);
        pool.slots()[0].on_key_event(KeyDirection::Down, 17);
        pool.slots()[1].on_key_event(KeyDirection::Down, 18);

        pool.reset_all();
        assert!(pool.slots().iter().all(|s| s.live_snapshot().is_empty()));
    }

    #[test]
    fn test_start_and_stop_track_backend_installs() {
        let backend = Box::<NullBackend>::default();
        let pool = HookPool::with_size(3, Arc::new(ShellRunner), backend);

        pool.start();
        pool.start(); // idempotent: already-installed slots are skipped
        pool.stop();
        pool.start();
    }
}
