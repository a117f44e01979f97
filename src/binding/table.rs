//! Binding tables: ordered (combination, command) associations
//!
//! A [`BindingTable`] is produced by the parser, partitioned across the
//! hook pool, and read-only once a slot owns it.

use serde::Serialize;

use super::Binding;

/// What to do when a combination matches.
///
/// A tagged variant type so future kinds (built-in actions, scripts) slot
/// in without touching dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    /// Run a command line through the platform shell.
    Shell { command: String },
}

impl Command {
    pub fn shell(command: impl Into<String>) -> Self {
        Command::Shell {
            command: command.into(),
        }
    }
}

/// One configured hotkey.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Hotkey {
    pub combo: Binding,
    pub command: Command,
}

/// Ordered collection of hotkeys for one registered subscriber.
///
/// Lookup is exact-match, so ordering carries no priority semantics; it is
/// kept only so diagnostics list bindings in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BindingTable {
    entries: Vec<Hotkey>,
}

impl BindingTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, hotkey: Hotkey) {
        self.entries.push(hotkey);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Hotkey> {
        self.entries.iter()
    }

    /// Find the command bound to exactly `combo`.
    pub fn lookup(&self, combo: &Binding) -> Option<&Command> {
        self.entries
            .iter()
            .find(|hk| hk.combo == *combo)
            .map(|hk| &hk.command)
    }

    /// Split into `n` near-equal sub-tables, round-robin, so load and
    /// failure blast-radius spread across the hook pool.
    pub fn partition(self, n: usize) -> Vec<BindingTable> {
        let n = n.max(1);
        let mut parts = vec![BindingTable::new(); n];
        for (i, hotkey) in self.entries.into_iter().enumerate() {
            parts[i % n].push(hotkey);
        }
        parts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::{KeySym, Modifier};

    fn combo(mods: &[Modifier], keys: &[u8]) -> Binding {
        let mut b = Binding::new();
        for &m in mods {
            b.add(KeySym::Modifier(m));
        }
        for &k in keys {
            b.add(KeySym::Key(k));
        }
        b
    }

    #[test]
    fn test_lookup_exact_match() {
        let mut table = BindingTable::new();
        table.push(Hotkey {
            combo: combo(&[Modifier::Ctrl], &[b'k']),
            command: Command::shell("echo hi"),
        });

        let held = combo(&[Modifier::Ctrl], &[b'k']);
        assert_eq!(table.lookup(&held), Some(&Command::shell("echo hi")));
    }

    #[test]
    fn test_lookup_rejects_superset() {
        let mut table = BindingTable::new();
        table.push(Hotkey {
            combo: combo(&[Modifier::Ctrl], &[b'k']),
            command: Command::shell("echo hi"),
        });

        // Ctrl+Shift+k held: the Ctrl+k binding must not fire.
        let held = combo(&[Modifier::Ctrl, Modifier::Shift], &[b'k']);
        assert_eq!(table.lookup(&held), None);
    }

    #[test]
    fn test_partition_round_robin() {
        let mut table = BindingTable::new();
        for i in 0..7u8 {
            table.push(Hotkey {
                combo: combo(&[], &[b'a' + i]),
                command: Command::shell(format!("cmd{i}")),
            });
        }

        let parts = table.partition(3);
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].len(), 3);
        assert_eq!(parts[1].len(), 2);
        assert_eq!(parts[2].len(), 2);
        assert!(parts[0].lookup(&combo(&[], &[b'a'])).is_some());
        assert!(parts[1].lookup(&combo(&[], &[b'b'])).is_some());
        assert!(parts[2].lookup(&combo(&[], &[b'c'])).is_some());
    }

    #[test]
    fn test_partition_zero_is_treated_as_one() {
        let mut table = BindingTable::new();
        table.push(Hotkey {
            combo: combo(&[], &[b'a']),
            command: Command::shell("x"),
        });
        let parts = table.partition(0);
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].len(), 1);
    }

    #[test]
    fn test_command_serializes_tagged() {
        let cmd = Command::shell("echo hi");
        let json = serde_json::to_string(&cmd).unwrap();
        assert!(json.contains("\"type\":\"shell\""));
        assert!(json.contains("echo hi"));
    }
}
