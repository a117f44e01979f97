//! Configuration discovery and defaults

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};

const RC_FILE_NAME: &str = ".bindkeysrc";

/// Template written to `~/.bindkeysrc` on first run and printed by
/// `--defaults`.
pub const DEFAULT_RC: &str = "\
# bindkeysd configuration
#
# A double-quoted line is a command; the binding next to it is the key
# combination that runs it. Tokens are joined by '+'. Recognized modifier
# tokens: control, shift, alt/mod1, win/mod4, space, enter, f1..f12.

# Prove the daemon is alive.
\"cmd /C echo bindkeysd\"
win + b
";

/// Daemon configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the rc file holding the bindings.
    pub rc_path: PathBuf,
}

impl Config {
    /// Resolve the rc path, honoring an explicit override.
    pub fn load(override_path: Option<PathBuf>) -> Result<Self> {
        let rc_path = match override_path {
            Some(path) => path,
            None => dirs_next::home_dir()
                .context("could not determine home directory")?
                .join(RC_FILE_NAME),
        };
        Ok(Self { rc_path })
    }

    /// Write the default template if the rc file does not exist yet.
    /// Returns true if the file was created.
    pub fn ensure_rc(&self) -> Result<bool> {
        if self.rc_path.exists() {
            return Ok(false);
        }
        if let Some(parent) = self.rc_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        fs::write(&self.rc_path, DEFAULT_RC)
            .with_context(|| format!("writing {}", self.rc_path.display()))?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_path_wins() {
        let config = Config::load(Some(PathBuf::from("/tmp/custom.rc"))).unwrap();
        assert_eq!(config.rc_path, PathBuf::from("/tmp/custom.rc"));
    }

    #[test]
    fn test_ensure_rc_creates_default_once() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            rc_path: dir.path().join(RC_FILE_NAME),
        };

        assert!(config.ensure_rc().unwrap());
        assert!(!config.ensure_rc().unwrap());
        let written = fs::read_to_string(&config.rc_path).unwrap();
        assert_eq!(written, DEFAULT_RC);
    }

    #[test]
    fn test_default_rc_parses() {
        let table = crate::parser::parse_str(DEFAULT_RC).unwrap();
        assert_eq!(table.len(), 1);
    }
}
