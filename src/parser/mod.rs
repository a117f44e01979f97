//! rc-file parser
//!
//! Line-oriented format:
//!
//! ```text
//! # comment
//! "notepad.exe"
//! ctrl + alt + n
//! ```
//!
//! A double-quoted line is a command, any other non-blank line is a
//! binding of `+`-joined tokens, and a (binding, command) pair completes a
//! hotkey as soon as both halves have been seen, in file order. Either
//! half may come first.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::binding::{Binding, BindingTable, Command, Hotkey, KeySym, Modifier};

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("could not read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("line {line}: unterminated command string")]
    UnterminatedCommand { line: usize },

    #[error("line {line}: binding has no keys")]
    EmptyBinding { line: usize },
}

/// Parse an rc file into a binding table.
pub fn parse_file(path: &Path) -> Result<BindingTable, ParseError> {
    let text = fs::read_to_string(path).map_err(|source| ParseError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_str(&text)
}

/// Parse rc text into a binding table.
pub fn parse_str(input: &str) -> Result<BindingTable, ParseError> {
    let mut table = BindingTable::new();
    let mut pending_command: Option<String> = None;
    let mut pending_binding: Option<Binding> = None;

    for (idx, raw) in input.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some(rest) = line.strip_prefix('"') {
            let end = rest
                .find('"')
                .ok_or(ParseError::UnterminatedCommand { line: line_no })?;
            pending_command = Some(rest[..end].to_string());
        } else {
            // Trailing comments are allowed on binding lines.
            let text = line.split('#').next().unwrap_or("");
            pending_binding = Some(parse_binding(text, line_no)?);
        }

        if pending_command.is_some() && pending_binding.is_some() {
            let combo = pending_binding.take().unwrap_or_default();
            let command = Command::shell(pending_command.take().unwrap_or_default());
            debug!(combo = %combo, "parsed binding");
            table.push(Hotkey { combo, command });
        }
    }

    Ok(table)
}

fn parse_binding(text: &str, line: usize) -> Result<Binding, ParseError> {
    let mut combo = Binding::new();
    let mut any = false;
    for token in text.split('+').map(str::trim).filter(|t| !t.is_empty()) {
        combo.add(token_to_sym(token));
        any = true;
    }
    if any {
        Ok(combo)
    } else {
        Err(ParseError::EmptyBinding { line })
    }
}

/// Token table from the classic bindkeys rc dialect: xbindkeys-style
/// `modN` names alongside the literal modifier names.
fn token_to_sym(token: &str) -> KeySym {
    let lower = token.to_ascii_lowercase();
    let modifier = match lower.as_str() {
        "control" | "ctrl" => Some(Modifier::Ctrl),
        "shift" => Some(Modifier::Shift),
        "alt" | "mod1" => Some(Modifier::Alt),
        "mod2" | "numlock" => Some(Modifier::NumLock),
        "mod3" | "capslock" => Some(Modifier::CapsLock),
        "win" | "super" | "mod4" => Some(Modifier::Win),
        "mod5" | "scrolllock" => Some(Modifier::ScrollLock),
        "space" => Some(Modifier::Space),
        "release" | "enter" => Some(Modifier::Enter),
        "f1" => Some(Modifier::F1),
        "f2" => Some(Modifier::F2),
        "f3" => Some(Modifier::F3),
        "f4" => Some(Modifier::F4),
        "f5" => Some(Modifier::F5),
        "f6" => Some(Modifier::F6),
        "f7" => Some(Modifier::F7),
        "f8" => Some(Modifier::F8),
        "f9" => Some(Modifier::F9),
        "f10" => Some(Modifier::F10),
        "f11" => Some(Modifier::F11),
        "f12" => Some(Modifier::F12),
        _ => None,
    };
    match modifier {
        Some(m) => KeySym::Modifier(m),
        None => match lower.bytes().next() {
            Some(byte) => KeySym::Key(byte),
            None => KeySym::Unmapped,
        },
    }
}
