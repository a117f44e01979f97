//! One hook slot: live binding accumulator, assigned table, liveness
//! counters
//!
//! The hook-delivery path through [`HookSlot::on_key_event`] never blocks:
//! the live binding is plain atomics and the table is read with
//! `try_read`, so the worst a concurrent reset or table swap can cause is
//! a missed dispatch, never a stall inside the OS callback.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use tracing::debug;

use crate::binding::{key_slot, translate, Binding, BindingTable, KeySym};
use crate::dispatch::CommandRunner;

use super::pool::TableHandle;

/// Direction of a raw key notification, "system" variants included.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyDirection {
    Down,
    Up,
}

/// Outcome of one hook callback: `Consumed` stops further propagation of
/// the event, `PassThrough` hands it to the next hook in the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Consumed,
    PassThrough,
}

/// Atomic rendition of [`Binding`] for the slot's live accumulator.
///
/// Single-writer from the slot's own hook callback; the watchdog and
/// session watcher may clear it concurrently. A racing clear can at worst
/// drop one in-flight bit, which costs a dispatch, not correctness.
#[derive(Debug, Default)]
pub struct LiveBinding {
    modifiers: AtomicU32,
    keys: [AtomicU64; 4],
}

impl LiveBinding {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the bit for `sym`; true iff it was previously unset.
    pub fn add(&self, sym: KeySym) -> bool {
        match sym {
            KeySym::Modifier(m) => {
                let bit = m.bit();
                self.modifiers.fetch_or(bit, Ordering::Relaxed) & bit == 0
            }
            KeySym::Key(code) => {
                let (word, bit) = key_slot(code);
                self.keys[word].fetch_or(bit, Ordering::Relaxed) & bit == 0
            }
            KeySym::Unmapped => false,
        }
    }

    /// Clear the bit for `sym`; true iff it was previously set.
    pub fn remove(&self, sym: KeySym) -> bool {
        match sym {
            KeySym::Modifier(m) => {
                let bit = m.bit();
                self.modifiers.fetch_and(!bit, Ordering::Relaxed) & bit != 0
            }
            KeySym::Key(code) => {
                let (word, bit) = key_slot(code);
                self.keys[word].fetch_and(!bit, Ordering::Relaxed) & bit != 0
            }
            KeySym::Unmapped => false,
        }
    }

    /// Clear all bits. Safe to call from any thread.
    pub fn reset(&self) {
        self.modifiers.store(0, Ordering::Relaxed);
        for word in &self.keys {
            word.store(0, Ordering::Relaxed);
        }
    }

    /// Copy out the current combination.
    pub fn snapshot(&self) -> Binding {
        Binding::from_raw(
            self.modifiers.load(Ordering::Relaxed),
            [
                self.keys[0].load(Ordering::Relaxed),
                self.keys[1].load(Ordering::Relaxed),
                self.keys[2].load(Ordering::Relaxed),
                self.keys[3].load(Ordering::Relaxed),
            ],
        )
    }
}

pub(crate) struct TableEntry {
    pub(crate) handle: TableHandle,
    pub(crate) table: Arc<BindingTable>,
}

/// One OS-level hook registration's worth of state.
pub struct HookSlot {
    index: usize,
    live: LiveBinding,
    table: RwLock<Option<TableEntry>>,
    entries: AtomicU64,
    exits: AtomicU64,
    runner: Arc<dyn CommandRunner>,
}

impl HookSlot {
    pub(crate) fn new(index: usize, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            index,
            live: LiveBinding::new(),
            table: RwLock::new(None),
            entries: AtomicU64::new(0),
            exits: AtomicU64::new(0),
            runner,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Process one raw key notification from this slot's OS hook.
    ///
    /// The entry and exit counters bracket every call unconditionally;
    /// they have no effect on dispatch and exist only so the watchdog can
    /// tell an in-flight callback from a stuck one.
    pub fn on_key_event(&self, direction: KeyDirection, vk: u8) -> Dispatch {
        self.enter();
        let outcome = self.handle_event(direction, vk);
        self.exit();
        outcome
    }

    fn handle_event(&self, direction: KeyDirection, vk: u8) -> Dispatch {
        let sym = translate(vk);
        if sym == KeySym::Unmapped {
            return Dispatch::PassThrough;
        }

        let dirty = match direction {
            KeyDirection::Down => self.live.add(sym),
            KeyDirection::Up => self.live.remove(sym),
        };
        if !dirty {
            return Dispatch::PassThrough;
        }

        let combo = self.live.snapshot();
        // A contended or poisoned lock means a table swap is in progress;
        // the slot behaves as empty for this event and the key passes
        // through.
        let Ok(guard) = self.table.try_read() else {
            return Dispatch::PassThrough;
        };
        let Some(entry) = guard.as_ref() else {
            return Dispatch::PassThrough;
        };

        match entry.table.lookup(&combo) {
            Some(command) => {
                debug!(slot = self.index, combo = %combo, "combination matched");
                self.runner.run(command);
                Dispatch::Consumed
            }
            None => Dispatch::PassThrough,
        }
    }

    pub(crate) fn enter(&self) {
        self.entries.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn exit(&self) {
        self.exits.fetch_add(1, Ordering::Relaxed);
    }

    /// True while a hook callback is executing on this slot.
    pub fn in_flight(&self) -> bool {
        self.entries.load(Ordering::Relaxed) != self.exits.load(Ordering::Relaxed)
    }

    /// Current live combination.
    pub fn live_snapshot(&self) -> Binding {
        self.live.snapshot()
    }

    /// Clear the live binding and zero the liveness counters. Called by
    /// the watchdog, session watcher, and pool-wide reset.
    pub fn reset(&self) {
        self.live.reset();
        self.entries.store(0, Ordering::Relaxed);
        self.exits.store(0, Ordering::Relaxed);
    }

    /// Handle of the table currently assigned to this slot, if any.
    pub fn table_handle(&self) -> Option<TableHandle> {
        match self.table.try_read() {
            Ok(guard) => guard.as_ref().map(|entry| entry.handle),
            Err(_) => None,
        }
    }

    pub(crate) fn has_table(&self) -> bool {
        self.table_handle().is_some()
    }

    fn table_write(&self) -> std::sync::RwLockWriteGuard<'_, Option<TableEntry>> {
        match self.table.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Publish a table to this slot. Control-context only; the write lock
    /// is held just long enough to swap the pair, and a concurrently
    /// running callback that loses the `try_read` race simply passes its
    /// event through.
    pub(crate) fn publish_table(&self, entry: TableEntry) {
        *self.table_write() = Some(entry);
    }

    /// Drop the slot's table iff it matches `handle`; true on removal.
    pub(crate) fn clear_table_if(&self, handle: TableHandle) -> bool {
        let mut guard = self.table_write();
        if guard.as_ref().is_some_and(|entry| entry.handle == handle) {
            *guard = None;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::Command;
    use std::sync::Mutex;

    #[derive(Default)]
    pub(crate) struct RecordingRunner {
        seen: Mutex<Vec<String>>,
    }

    impl RecordingRunner {
        pub(crate) fn commands(&self) -> Vec<String> {
            self.seen.lock().unwrap().clone()
        }
    }

    impl CommandRunner for RecordingRunner {
        fn run(&self, command: &Command) {
            let Command::Shell { command } = command;
            self.seen.lock().unwrap().push(command.clone());
        }
    }

    fn slot_with_table(table: BindingTable) -> (Arc<HookSlot>, Arc<RecordingRunner>) {
        let runner = Arc::new(RecordingRunner::default());
        let slot = Arc::new(HookSlot::new(0, runner.clone() as Arc<dyn CommandRunner>));
        slot.publish_table(TableEntry {
            handle: TableHandle::new(1),
            table: Arc::new(table),
        });
        (slot, runner)
    }

    fn ctrl_alt_k_table() -> BindingTable {
        let mut combo = Binding::new();
        combo.add(translate(17));
        combo.add(translate(18));
        combo.add(translate(b'K'));
        let mut table = BindingTable::new();
        table.push(crate::binding::Hotkey {
            combo,
            command: Command::shell("echo hi"),
        });
        table
    }

    #[test]
    fn test_dispatch_fires_on_final_key_only() {
        let (slot, runner) = slot_with_table(ctrl_alt_k_table());

        assert_eq!(slot.on_key_event(KeyDirection::Down, 17), Dispatch::PassThrough);
        assert_eq!(slot.on_key_event(KeyDirection::Down, 18), Dispatch::PassThrough);
        assert_eq!(slot.on_key_event(KeyDirection::Down, b'K'), Dispatch::Consumed);
        assert_eq!(runner.commands(), vec!["echo hi"]);
    }

    #[test]
    fn test_key_repeat_is_not_dirty() {
        let (slot, runner) = slot_with_table(ctrl_alt_k_table());

        slot.on_key_event(KeyDirection::Down, 17);
        slot.on_key_event(KeyDirection::Down, 18);
        slot.on_key_event(KeyDirection::Down, b'K');
        // Auto-repeat delivers the same down event again: no bit changes,
        // no second dispatch.
        assert_eq!(slot.on_key_event(KeyDirection::Down, b'K'), Dispatch::PassThrough);
        assert_eq!(runner.commands().len(), 1);
    }

    #[test]
    fn test_up_event_on_unset_bit_is_not_dirty() {
        let (slot, runner) = slot_with_table(ctrl_alt_k_table());
        assert_eq!(slot.on_key_event(KeyDirection::Up, b'K'), Dispatch::PassThrough);
        assert!(runner.commands().is_empty());
    }

    #[test]
    fn test_counters_bracket_every_event() {
        let (slot, _) = slot_with_table(BindingTable::new());
        slot.on_key_event(KeyDirection::Down, 17);
        slot.on_key_event(KeyDirection::Up, 17);
        assert!(!slot.in_flight());

        slot.enter();
        assert!(slot.in_flight());
        slot.exit();
        assert!(!slot.in_flight());
    }

    #[test]
    fn test_reset_clears_live_and_counters() {
        let (slot, _) = slot_with_table(BindingTable::new());
        slot.on_key_event(KeyDirection::Down, 17);
        slot.enter();
        assert!(slot.in_flight());

        slot.reset();
        assert!(slot.live_snapshot().is_empty());
        assert!(!slot.in_flight());
    }

    #[test]
    fn test_slot_without_table_passes_everything_through() {
        let runner = Arc::new(RecordingRunner::default());
        let slot = HookSlot::new(3, runner.clone() as Arc<dyn CommandRunner>);
        assert_eq!(slot.on_key_event(KeyDirection::Down, 17), Dispatch::PassThrough);
        assert!(runner.commands().is_empty());
    }

    #[test]
    fn test_contended_table_lock_passes_event_through() {
        let (slot, runner) = slot_with_table(ctrl_alt_k_table());
        slot.on_key_event(KeyDirection::Down, 17);
        slot.on_key_event(KeyDirection::Down, 18);

        // A table swap in progress: the write lock is held while the
        // final key arrives. The callback must neither block nor
        // dispatch, and the key still lands in the live binding.
        let guard = slot.table.write().unwrap();
        assert_eq!(
            slot.on_key_event(KeyDirection::Down, b'K'),
            Dispatch::PassThrough
        );
        drop(guard);

        assert!(runner.commands().is_empty());
        assert!(slot.live_snapshot().contains(KeySym::Key(b'k')));
    }

    #[test]
    fn test_live_binding_uses_the_same_bit_layout() {
        use crate::binding::Modifier;

        let live = LiveBinding::new();
        live.add(KeySym::Key(200));
        live.add(KeySym::Modifier(Modifier::Win));

        let mut expected = Binding::new();
        expected.add(KeySym::Key(200));
        expected.add(KeySym::Modifier(Modifier::Win));
        assert_eq!(live.snapshot(), expected);
    }

    #[test]
    fn test_live_binding_reset_is_idempotent() {
        let live = LiveBinding::new();
        assert!(live.add(KeySym::Key(b'k')));
        live.reset();
        live.reset();
        assert!(live.snapshot().is_empty());
        assert!(live.add(KeySym::Key(b'k')));
    }
}
