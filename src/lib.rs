//! bindkeysd: system-wide hotkey daemon
//!
//! Intercepts every keyboard event at the OS level, tracks the keys
//! currently held as a canonical [`binding::Binding`], and fires a
//! configured command when the held combination exactly matches a
//! binding. The engine is a pool of parallel low-level hook registrations
//! with a self-healing watchdog and a session-change listener repairing
//! the stuck-key states the OS hook mechanism leaves behind under load.

pub mod binding;
pub mod config;
pub mod dispatch;
pub mod hook;
pub mod lifecycle;
pub mod parser;
pub mod platform;
