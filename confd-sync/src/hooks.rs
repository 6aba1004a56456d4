//! On-change command execution.
//!
//! Hooks are started and never awaited: the reconciler does not observe exit
//! status or output. The child is reaped on a detached thread so it does not
//! linger as a zombie.

use std::process::{Command, Stdio};

use crate::error::SyncError;

/// Starts on-change commands.
pub trait HookRunner: Send + Sync {
    /// Start `command` with no arguments. Returns once the process is spawned.
    fn start(&self, command: &str) -> Result<(), SyncError>;
}

/// Spawns each hook as an OS process inheriting the agent's environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessHookRunner;

impl HookRunner for ProcessHookRunner {
    fn start(&self, command: &str) -> Result<(), SyncError> {
        let mut child = Command::new(command)
            .stdin(Stdio::null())
            .spawn()
            .map_err(|source| SyncError::Hook {
                command: command.to_string(),
                source,
            })?;
        std::thread::spawn(move || {
            let _ = child.wait();
        });
        Ok(())
    }
}
