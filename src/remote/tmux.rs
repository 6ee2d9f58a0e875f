//! tmux backend

use std::process::Command;

use tracing::debug;

use super::Multiplexer;
use crate::error::{DockiError, Result};

/// Multiplexer backed by the `tmux` binary on `PATH`
#[derive(Debug, Clone)]
pub struct Tmux {
    binary: String,
}

impl Tmux {
    pub fn new() -> Self {
        Self {
            binary: "tmux".to_string(),
        }
    }

    fn output(&self, args: &[&str]) -> Result<std::process::Output> {
        debug!(args = ?args, "invoking tmux");
        Command::new(&self.binary)
            .args(args)
            .output()
            .map_err(|e| DockiError::Multiplexer(format!("failed to run {}: {}", self.binary, e)))
    }

    /// Run and return trimmed stdout, failing on non-zero exit
    fn run(&self, args: &[&str]) -> Result<String> {
        let out = self.output(args)?;
        if !out.status.success() {
            return Err(DockiError::Multiplexer(format!(
                "{} {}: {}",
                self.binary,
                args.join(" "),
                String::from_utf8_lossy(&out.stderr).trim()
            )));
        }
        Ok(String::from_utf8_lossy(&out.stdout).trim().to_string())
    }
}

impl Default for Tmux {
    fn default() -> Self {
        Self::new()
    }
}

impl Multiplexer for Tmux {
    fn list_sessions(&self) -> Result<Vec<String>> {
        let out = self.output(&["list-sessions", "-F", "#{session_name}"])?;
        // Non-zero when no server is running, which means no sessions
        if !out.status.success() {
            return Ok(Vec::new());
        }
        Ok(String::from_utf8_lossy(&out.stdout)
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect())
    }

    fn new_session(&self, name: &str) -> Result<()> {
        self.run(&["new-session", "-d", "-s", name]).map(|_| ())
    }

    fn new_window(&self, session: &str) -> Result<String> {
        self.run(&["new-window", "-t", session, "-P", "-F", "#{pane_id}"])
    }

    fn split_pane(&self, pane: &str) -> Result<String> {
        self.run(&["split-window", "-t", pane, "-P", "-F", "#{pane_id}"])
    }

    fn select_layout_tiled(&self, pane: &str) -> Result<()> {
        self.run(&["select-layout", "-t", pane, "tiled"]).map(|_| ())
    }

    fn send_keys(&self, pane: &str, text: &str) -> Result<()> {
        self.run(&["send-keys", "-t", pane, "-l", text])?;
        self.run(&["send-keys", "-t", pane, "Enter"]).map(|_| ())
    }

    fn send_interrupt(&self, pane: &str) -> Result<()> {
        self.run(&["send-keys", "-t", pane, "C-c"]).map(|_| ())
    }

    fn kill_pane(&self, pane: &str) -> Result<()> {
        self.run(&["kill-pane", "-t", pane]).map(|_| ())
    }
}
