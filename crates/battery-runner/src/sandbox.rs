//! Ephemeral per-attempt working directories.
//!
//! Each execution attempt gets a fresh directory under
//! `<base_dir>/sandboxes/<id>` and the directory is removed when the attempt
//! finishes, whatever its outcome. The harness never changes the process
//! working directory; the sandbox path travels in the case context.

use crate::error::BatteryError;
use battery_core::{ensure_dir, short_id};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

const ID_LEN: usize = 5;
const CREATE_ATTEMPTS: usize = 16;

pub struct Sandbox {
    path: PathBuf,
}

impl Sandbox {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[derive(Debug)]
pub struct SandboxManager {
    root: PathBuf,
}

impl SandboxManager {
    pub fn new(base_dir: &Path) -> Self {
        Self {
            root: base_dir.join("sandboxes"),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Remove every leftover sandbox from prior runs. Idempotent; succeeds
    /// when nothing exists.
    pub fn reset_all(&self) -> Result<(), BatteryError> {
        match fs::remove_dir_all(&self.root) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(BatteryError::Sandbox {
                op: "reset",
                path: self.root.clone(),
                source: e,
            }),
        }
    }

    /// Create a freshly named sandbox directory. Identifier collisions with
    /// a live directory are retried; five alphanumeric characters make that
    /// rare enough for a single-threaded harness.
    pub fn enter(&self) -> Result<Sandbox, BatteryError> {
        ensure_dir(&self.root).map_err(|e| BatteryError::Sandbox {
            op: "create",
            path: self.root.clone(),
            source: std::io::Error::new(std::io::ErrorKind::Other, e.to_string()),
        })?;
        let mut rng = rand::thread_rng();
        for _ in 0..CREATE_ATTEMPTS {
            let candidate = self.root.join(short_id(&mut rng, ID_LEN));
            match fs::create_dir(&candidate) {
                Ok(()) => {
                    debug!(sandbox = %candidate.display(), "sandbox created");
                    return Ok(Sandbox { path: candidate });
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(e) => {
                    return Err(BatteryError::Sandbox {
                        op: "create",
                        path: candidate,
                        source: e,
                    })
                }
            }
        }
        Err(BatteryError::Sandbox {
            op: "create",
            path: self.root.clone(),
            source: std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                "could not find a free sandbox identifier",
            ),
        })
    }

    /// Remove the sandbox and everything the test wrote into it.
    pub fn exit(&self, sandbox: Sandbox) -> Result<(), BatteryError> {
        debug!(sandbox = %sandbox.path.display(), "sandbox removed");
        fs::remove_dir_all(&sandbox.path).map_err(|e| BatteryError::Sandbox {
            op: "remove",
            path: sandbox.path.clone(),
            source: e,
        })
    }
}
