//! External collaborator seam: the optional pre-loop compile step, stale
//! artifact cleanup, and the end-of-session notification. The harness only
//! sequences these; what they actually do belongs to the caller.

use crate::error::BatteryError;
use std::process::{Command, Stdio};
use tracing::{info, warn};

pub trait Collaborators {
    /// Optional full rebuild before any iteration runs. A failure here
    /// aborts the session.
    fn compile(&self, verbose: bool) -> Result<(), BatteryError>;

    /// Clear stale artifacts left by a previous invocation.
    fn cleanup(&self) -> Result<(), BatteryError>;

    /// Best-effort, fire-and-forget end-of-session notification.
    fn notify(&self, category: &str, hours: f64);
}

/// Default collaborators: nothing external to call.
pub struct NoopCollaborators;

impl Collaborators for NoopCollaborators {
    fn compile(&self, _verbose: bool) -> Result<(), BatteryError> {
        Ok(())
    }

    fn cleanup(&self) -> Result<(), BatteryError> {
        Ok(())
    }

    fn notify(&self, _category: &str, _hours: f64) {}
}

/// Collaborators that shell out to user-configured commands, the same way
/// the harness treats test infrastructure it does not own.
#[derive(Default)]
pub struct ShellCollaborators {
    pub compile_cmd: Option<String>,
    pub notify_cmd: Option<String>,
}

impl Collaborators for ShellCollaborators {
    fn compile(&self, verbose: bool) -> Result<(), BatteryError> {
        let cmd = self
            .compile_cmd
            .as_deref()
            .ok_or_else(|| BatteryError::Build("no compile command configured".to_string()))?;
        info!(command = cmd, "running compile step");
        let mut child = Command::new("sh");
        child.arg("-c").arg(cmd);
        if !verbose {
            child.stdout(Stdio::null());
        }
        let status = child
            .status()
            .map_err(|e| BatteryError::Build(format!("failed to spawn '{}': {}", cmd, e)))?;
        if !status.success() {
            return Err(BatteryError::Build(format!(
                "'{}' exited with {}",
                cmd, status
            )));
        }
        Ok(())
    }

    fn cleanup(&self) -> Result<(), BatteryError> {
        Ok(())
    }

    fn notify(&self, category: &str, hours: f64) {
        let Some(cmd) = self.notify_cmd.as_deref() else {
            return;
        };
        let result = Command::new("sh")
            .arg("-c")
            .arg(cmd)
            .env("BATTERY_CATEGORY", category)
            .env("BATTERY_HOURS", format!("{}", hours))
            .status();
        match result {
            Ok(status) if status.success() => {}
            Ok(status) => warn!(command = cmd, %status, "notify command failed"),
            Err(e) => warn!(command = cmd, error = %e, "notify command could not run"),
        }
    }
}
