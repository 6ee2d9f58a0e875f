//! Execution context for Docki
//!
//! Everything that is decided once per invocation (execution mode, host
//! platform, user identity, interrupt state) lives here and is passed
//! explicitly into each stage.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{DockiError, Result};

/// Whether stages talk to the engine or write equivalent scripts
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Invoke the container engine directly
    Direct,
    /// Write shell scripts to `output_dir` instead of contacting the engine
    Emit { output_dir: PathBuf },
}

impl ExecutionMode {
    pub fn is_direct(&self) -> bool {
        matches!(self, ExecutionMode::Direct)
    }
}

/// Host operating system family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostPlatform {
    Linux,
    Other,
}

impl HostPlatform {
    /// Platform this binary was compiled for
    pub fn current() -> Self {
        if cfg!(target_os = "linux") {
            HostPlatform::Linux
        } else {
            HostPlatform::Other
        }
    }
}

/// Numeric user and group the container runs as
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub uid: u32,
    pub gid: u32,
}

impl Identity {
    /// Used wherever the host identity cannot be mirrored
    pub const PLACEHOLDER: Identity = Identity { uid: 1000, gid: 1000 };

    /// Host user on Linux, the placeholder elsewhere
    pub fn for_platform(platform: HostPlatform) -> Self {
        match platform {
            HostPlatform::Linux => host_identity(),
            HostPlatform::Other => Self::PLACEHOLDER,
        }
    }

    /// `uid:gid` as accepted by `docker run --user`
    pub fn as_user_spec(&self) -> String {
        format!("{}:{}", self.uid, self.gid)
    }
}

#[cfg(unix)]
fn host_identity() -> Identity {
    // SAFETY: getuid/getgid are always successful and have no side effects
    let (uid, gid) = unsafe { (libc::getuid(), libc::getgid()) };
    Identity { uid, gid }
}

#[cfg(not(unix))]
fn host_identity() -> Identity {
    Identity::PLACEHOLDER
}

/// Set by the Ctrl+C handler, polled by long-running loops
#[derive(Debug, Clone, Default)]
pub struct InterruptFlag(Arc<AtomicBool>);

impl InterruptFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the process-wide Ctrl+C handler. Call once.
    pub fn install() -> Result<Self> {
        let flag = Self::new();
        let handle = flag.clone();
        ctrlc::set_handler(move || handle.raise())
            .map_err(|e| DockiError::Configuration(format!("Failed to set Ctrl+C handler: {}", e)))?;
        Ok(flag)
    }

    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Read and reset the flag
    pub fn take(&self) -> bool {
        self.0.swap(false, Ordering::SeqCst)
    }
}

/// Per-invocation settings threaded through every stage
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub mode: ExecutionMode,
    pub platform: HostPlatform,
    pub identity: Identity,
    /// Bypass the image cache and reinstall dependencies
    pub clean: bool,
    pub interrupt: InterruptFlag,
}

impl Default for ExecutionContext {
    fn default() -> Self {
        let platform = HostPlatform::current();
        Self {
            mode: ExecutionMode::Direct,
            platform,
            identity: Identity::for_platform(platform),
            clean: false,
            interrupt: InterruptFlag::new(),
        }
    }
}
