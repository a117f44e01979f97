//! Canonical key-combination model
//!
//! A [`Binding`] is the bit-set representation of every key held at one
//! instant: one bit per modifier out of a small closed set, one bit per
//! byte-sized key code. Exactly one `Binding` value corresponds to any
//! given held-key state, so equality is bit-for-bit and dispatch never
//! does subset matching.

mod keymap;
mod table;

pub use keymap::translate;
pub use table::{BindingTable, Command, Hotkey};

use std::fmt;

use serde::{Serialize, Serializer};

/// Modifier keys recognized in a combination.
///
/// The discriminant doubles as the bit index in [`Binding`]'s modifier set,
/// and the declaration order is the canonical display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Modifier {
    Win,
    Alt,
    Ctrl,
    Shift,
    Enter,
    Space,
    NumLock,
    CapsLock,
    ScrollLock,
    F1,
    F2,
    F3,
    F4,
    F5,
    F6,
    F7,
    F8,
    F9,
    F10,
    F11,
    F12,
}

impl Modifier {
    /// All modifiers in canonical display order.
    pub const ALL: [Modifier; 21] = [
        Modifier::Win,
        Modifier::Alt,
        Modifier::Ctrl,
        Modifier::Shift,
        Modifier::Enter,
        Modifier::Space,
        Modifier::NumLock,
        Modifier::CapsLock,
        Modifier::ScrollLock,
        Modifier::F1,
        Modifier::F2,
        Modifier::F3,
        Modifier::F4,
        Modifier::F5,
        Modifier::F6,
        Modifier::F7,
        Modifier::F8,
        Modifier::F9,
        Modifier::F10,
        Modifier::F11,
        Modifier::F12,
    ];

    pub(crate) fn bit(self) -> u32 {
        1 << (self as u32)
    }

    /// Lower-case token name, shared by the parser and the display form.
    pub fn name(self) -> &'static str {
        match self {
            Modifier::Win => "win",
            Modifier::Alt => "alt",
            Modifier::Ctrl => "ctrl",
            Modifier::Shift => "shift",
            Modifier::Enter => "enter",
            Modifier::Space => "space",
            Modifier::NumLock => "numlock",
            Modifier::CapsLock => "capslock",
            Modifier::ScrollLock => "scrolllock",
            Modifier::F1 => "f1",
            Modifier::F2 => "f2",
            Modifier::F3 => "f3",
            Modifier::F4 => "f4",
            Modifier::F5 => "f5",
            Modifier::F6 => "f6",
            Modifier::F7 => "f7",
            Modifier::F8 => "f8",
            Modifier::F9 => "f9",
            Modifier::F10 => "f10",
            Modifier::F11 => "f11",
            Modifier::F12 => "f12",
        }
    }
}

/// A translated key code: either a recognized modifier, a printable key
/// (already lower-cased), or something the daemon does not track at all.
///
/// `Unmapped` never mutates a [`Binding`] and never counts as a state
/// change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySym {
    Modifier(Modifier),
    Key(u8),
    Unmapped,
}

/// Bit-set of the keys held at one instant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Binding {
    modifiers: u32,
    keys: [u64; 4],
}

pub(crate) fn key_slot(code: u8) -> (usize, u64) {
    ((code >> 6) as usize, 1u64 << (code & 63))
}

impl Binding {
    /// Create an empty combination.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_raw(modifiers: u32, keys: [u64; 4]) -> Self {
        Self { modifiers, keys }
    }

    /// Set the bit for `sym`. Returns true iff the bit was previously
    /// unset, i.e. the combination actually changed.
    pub fn add(&mut self, sym: KeySym) -> bool {
        match sym {
            KeySym::Modifier(m) => {
                let bit = m.bit();
                let was_set = self.modifiers & bit != 0;
                self.modifiers |= bit;
                !was_set
            }
            KeySym::Key(code) => {
                let (word, bit) = key_slot(code);
                let was_set = self.keys[word] & bit != 0;
                self.keys[word] |= bit;
                !was_set
            }
            KeySym::Unmapped => false,
        }
    }

    /// Clear the bit for `sym`. Returns true iff the bit was previously
    /// set.
    pub fn remove(&mut self, sym: KeySym) -> bool {
        match sym {
            KeySym::Modifier(m) => {
                let bit = m.bit();
                let was_set = self.modifiers & bit != 0;
                self.modifiers &= !bit;
                was_set
            }
            KeySym::Key(code) => {
                let (word, bit) = key_slot(code);
                let was_set = self.keys[word] & bit != 0;
                self.keys[word] &= !bit;
                was_set
            }
            KeySym::Unmapped => false,
        }
    }

    pub fn contains(&self, sym: KeySym) -> bool {
        match sym {
            KeySym::Modifier(m) => self.modifiers & m.bit() != 0,
            KeySym::Key(code) => {
                let (word, bit) = key_slot(code);
                self.keys[word] & bit != 0
            }
            KeySym::Unmapped => false,
        }
    }

    /// Clear all bits.
    pub fn reset(&mut self) {
        self.modifiers = 0;
        self.keys = [0; 4];
    }

    pub fn is_empty(&self) -> bool {
        self.modifiers == 0 && self.keys == [0; 4]
    }
}

impl fmt::Display for Binding {
    /// Modifiers first in canonical order, then literal keys lower-cased,
    /// joined by `" + "`. Diagnostics only.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        let mut sep = |f: &mut fmt::Formatter<'_>| -> fmt::Result {
            if first {
                first = false;
                Ok(())
            } else {
                write!(f, " + ")
            }
        };
        for m in Modifier::ALL {
            if self.modifiers & m.bit() != 0 {
                sep(f)?;
                write!(f, "{}", m.name())?;
            }
        }
        for code in 0..=255u8 {
            let (word, bit) = key_slot(code);
            if self.keys[word] & bit != 0 {
                sep(f)?;
                write!(f, "{}", code.to_ascii_lowercase() as char)?;
            }
        }
        Ok(())
    }
}

impl Serialize for Binding {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_reports_change_only_once() {
        let mut b = Binding::new();
        assert!(b.add(KeySym::Modifier(Modifier::Ctrl)));
        assert!(!b.add(KeySym::Modifier(Modifier::Ctrl)));
        assert!(b.add(KeySym::Key(b'k')));
        assert!(!b.add(KeySym::Key(b'k')));
    }

    #[test]
    fn test_remove_reports_change_only_when_set() {
        let mut b = Binding::new();
        assert!(!b.remove(KeySym::Key(b'k')));
        b.add(KeySym::Key(b'k'));
        assert!(b.remove(KeySym::Key(b'k')));
        assert!(!b.remove(KeySym::Key(b'k')));
    }

    #[test]
    fn test_net_parity_reflected_by_contains() {
        let mut b = Binding::new();
        let sym = KeySym::Modifier(Modifier::Shift);
        b.add(sym);
        b.add(sym);
        assert!(b.contains(sym));
        b.remove(sym);
        assert!(!b.contains(sym));
    }

    #[test]
    fn test_equality_is_exact_not_subset() {
        let mut small = Binding::new();
        small.add(KeySym::Modifier(Modifier::Alt));
        small.add(KeySym::Key(b'k'));

        let mut big = small;
        big.add(KeySym::Modifier(Modifier::Ctrl));

        assert_eq!(small, small);
        assert_ne!(small, big);
    }

    #[test]
    fn test_unmapped_never_changes_state() {
        let mut b = Binding::new();
        assert!(!b.add(KeySym::Unmapped));
        assert!(!b.remove(KeySym::Unmapped));
        assert!(b.is_empty());
    }

    #[test]
    fn test_reset_yields_empty_display() {
        let mut b = Binding::new();
        b.add(KeySym::Modifier(Modifier::Ctrl));
        b.add(KeySym::Key(b'x'));
        b.reset();
        assert!(b.is_empty());
        assert_eq!(b.to_string(), "");
    }

    #[test]
    fn test_display_order_modifiers_then_keys() {
        let mut b = Binding::new();
        b.add(KeySym::Key(b'k'));
        b.add(KeySym::Modifier(Modifier::Ctrl));
        b.add(KeySym::Modifier(Modifier::Alt));
        assert_eq!(b.to_string(), "alt + ctrl + k");
    }

    #[test]
    fn test_high_key_codes_have_their_own_bits() {
        let mut b = Binding::new();
        b.add(KeySym::Key(200));
        assert!(b.contains(KeySym::Key(200)));
        assert!(!b.contains(KeySym::Key(72)));
    }
}
