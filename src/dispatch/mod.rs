//! Fire-and-forget command execution
//!
//! The hook callback must return promptly no matter what a command does,
//! so execution is spawn-and-detach: a child process is started, a waiter
//! thread reaps it, and the outcome is only ever logged.

use std::process;
use std::thread;

use tracing::{debug, error, info};

use crate::binding::Command;

/// Seam between dispatch and actual process spawning. Tests substitute a
/// recording implementation.
pub trait CommandRunner: Send + Sync {
    fn run(&self, command: &Command);
}

/// Runs commands through the platform shell.
#[derive(Debug, Default)]
pub struct ShellRunner;

impl CommandRunner for ShellRunner {
    fn run(&self, command: &Command) {
        match command {
            Command::Shell { command } => spawn_shell(command),
        }
    }
}

#[cfg(windows)]
fn shell_command(command: &str) -> process::Command {
    let mut cmd = process::Command::new("cmd");
    cmd.args(["/C", command]);
    cmd
}

#[cfg(not(windows))]
fn shell_command(command: &str) -> process::Command {
    let mut cmd = process::Command::new("sh");
    cmd.args(["-c", command]);
    cmd
}

fn spawn_shell(command: &str) {
    let rendered = command.to_string();
    let spawned = shell_command(command)
        .stdin(process::Stdio::null())
        .stdout(process::Stdio::null())
        .stderr(process::Stdio::null())
        .spawn();

    match spawned {
        Ok(child) => {
            info!(command = %rendered, "exec");
            if let Err(e) = thread::Builder::new()
                .name("command-reaper".to_string())
                .spawn(move || reap(child, rendered))
            {
                error!(?e, "failed to spawn command reaper thread");
            }
        }
        Err(e) => {
            error!(?e, command = %rendered, "exec failed");
        }
    }
}

fn reap(mut child: process::Child, command: String) {
    match child.wait() {
        Ok(status) if status.success() => {
            debug!(command = %command, "command finished");
        }
        Ok(status) => {
            error!(command = %command, %status, "command failed");
        }
        Err(e) => {
            error!(?e, command = %command, "could not reap command");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Records commands instead of running them.
    #[derive(Default)]
    struct RecordingRunner {
        seen: Mutex<Vec<String>>,
    }

    impl CommandRunner for RecordingRunner {
        fn run(&self, command: &Command) {
            let Command::Shell { command } = command;
            self.seen.lock().unwrap().push(command.clone());
        }
    }

    #[test]
    fn test_runner_trait_is_object_safe() {
        let runner: Box<dyn CommandRunner> = Box::<RecordingRunner>::default();
        runner.run(&Command::shell("echo hi"));
    }

    #[test]
    #[cfg(unix)]
    fn test_shell_runner_spawns_detached() {
        // `true` exits immediately; run must not block or panic.
        ShellRunner.run(&Command::shell("true"));
    }
}
