//! Win32 virtual-key translation
//!
//! Maps raw virtual-key codes to the canonical [`KeySym`] form. Left and
//! right variants of a modifier collapse onto the same bit, letters are
//! lower-cased, and everything outside the tracked set is `Unmapped`.

use super::{KeySym, Modifier};

/// Translate a raw virtual-key code into a canonical key symbol.
pub fn translate(vk: u8) -> KeySym {
    match vk {
        13 => KeySym::Modifier(Modifier::Enter),
        16 | 160 | 161 => KeySym::Modifier(Modifier::Shift),
        17 | 162 | 163 => KeySym::Modifier(Modifier::Ctrl),
        18 | 164 | 165 => KeySym::Modifier(Modifier::Alt),
        32 => KeySym::Modifier(Modifier::Space),
        91 | 92 => KeySym::Modifier(Modifier::Win),
        112 => KeySym::Modifier(Modifier::F1),
        113 => KeySym::Modifier(Modifier::F2),
        114 => KeySym::Modifier(Modifier::F3),
        115 => KeySym::Modifier(Modifier::F4),
        116 => KeySym::Modifier(Modifier::F5),
        117 => KeySym::Modifier(Modifier::F6),
        118 => KeySym::Modifier(Modifier::F7),
        119 => KeySym::Modifier(Modifier::F8),
        120 => KeySym::Modifier(Modifier::F9),
        121 => KeySym::Modifier(Modifier::F10),
        122 => KeySym::Modifier(Modifier::F11),
        123 => KeySym::Modifier(Modifier::F12),
        // OEM punctuation keys on a standard layout
        186 => KeySym::Key(b'+'),
        188 => KeySym::Key(b','),
        189 => KeySym::Key(b'-'),
        190 => KeySym::Key(b'.'),
        191 => KeySym::Key(b'#'),
        226 => KeySym::Key(b'<'),
        48..=57 => KeySym::Key(vk),
        65..=90 => KeySym::Key(vk.to_ascii_lowercase()),
        _ => KeySym::Unmapped,
    }
}
