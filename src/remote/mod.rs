//! Remote broadcast sessions
//!
//! Opens one multiplexer pane per remote host, logs into each host and then
//! sends every line the operator types to all panes, in host order.
//!
//! ```text
//! Creating -> Ready -> Broadcasting -> Ready -> ... -> Closing -> Closed
//! ```

mod input;
mod tmux;

pub use input::{InputEvent, LineEditor, OperatorInput};
pub use tmux::Tmux;

use std::collections::HashSet;

use tracing::{info, warn};

use crate::config::RemoteHost;
use crate::error::Result;

/// Operations Docki needs from a terminal multiplexer
pub trait Multiplexer {
    fn list_sessions(&self) -> Result<Vec<String>>;

    /// Create a detached session
    fn new_session(&self, name: &str) -> Result<()>;

    /// Open a window in `session` and return its pane
    fn new_window(&self, session: &str) -> Result<String>;

    /// Split the window holding `pane` and return the new pane
    fn split_pane(&self, pane: &str) -> Result<String>;

    /// Tile the window holding `pane`
    fn select_layout_tiled(&self, pane: &str) -> Result<()>;

    /// Type `text` literally into the pane and press Enter
    fn send_keys(&self, pane: &str, text: &str) -> Result<()>;

    /// Send Ctrl+C to the pane
    fn send_interrupt(&self, pane: &str) -> Result<()>;

    fn kill_pane(&self, pane: &str) -> Result<()>;
}

/// Session names handed out by this process
#[derive(Debug, Default)]
pub struct SessionNames {
    used: HashSet<String>,
}

impl SessionNames {
    pub fn new() -> Self {
        Self::default()
    }

    /// `desired`, or `desired_<n>` with the smallest free n, avoiding `existing`
    /// and every name allocated before
    pub fn allocate(&mut self, desired: &str, existing: &[String]) -> String {
        let taken = |name: &str| self.used.contains(name) || existing.iter().any(|e| e == name);

        let mut name = desired.to_string();
        let mut suffix = 0;
        while taken(&name) {
            suffix += 1;
            name = format!("{}_{}", desired, suffix);
        }
        self.used.insert(name.clone());
        name
    }
}

/// Lifecycle of a broadcast session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Creating,
    Ready,
    Broadcasting,
    Closing,
    Closed,
}

/// A pane logged into one host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pane {
    pub host: RemoteHost,
    pub id: String,
}

/// Multiplexed session fanning operator input out to remote shells
pub struct BroadcastSession<'a> {
    mux: &'a dyn Multiplexer,
    name: String,
    panes: Vec<Pane>,
    state: SessionState,
}

impl<'a> BroadcastSession<'a> {
    /// Create the session and one pane per host.
    ///
    /// Host panes live in a window of their own so the session's initial
    /// window outlives them. A host whose pane cannot be set up is reported
    /// and skipped; panes that already exist are kept.
    pub fn create(
        mux: &'a dyn Multiplexer,
        names: &mut SessionNames,
        tag: &str,
        hosts: &[RemoteHost],
    ) -> Result<Self> {
        let existing = mux.list_sessions()?;
        let name = names.allocate(tag, &existing);
        mux.new_session(&name)?;
        let mut session = Self {
            mux,
            name,
            panes: Vec::with_capacity(hosts.len()),
            state: SessionState::Creating,
        };
        info!(session = %session.name, hosts = hosts.len(), "creating broadcast session");

        for host in hosts {
            let allocated = match session.panes.first() {
                Some(anchor) => mux.split_pane(&anchor.id),
                None => mux.new_window(&session.name),
            };
            let pane = match allocated {
                Ok(pane) => pane,
                Err(e) => {
                    report(&host.address, &e.to_string());
                    continue;
                }
            };
            session.panes.push(Pane {
                host: host.clone(),
                id: pane.clone(),
            });

            if let Err(e) = session.login(&pane, host) {
                report(&host.address, &e.to_string());
            }
        }

        session.state = SessionState::Ready;
        Ok(session)
    }

    fn login(&self, pane: &str, host: &RemoteHost) -> Result<()> {
        self.mux.select_layout_tiled(pane)?;
        self.mux.send_keys(pane, &format!("ssh {}", host.address))?;
        if let Some(workspace) = &host.workspace {
            self.mux.send_keys(pane, &format!("cd {}", workspace))?;
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn panes(&self) -> &[Pane] {
        &self.panes
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Send `line` verbatim to every pane in host order
    pub fn broadcast(&mut self, line: &str) {
        self.state = SessionState::Broadcasting;
        for pane in &self.panes {
            if let Err(e) = self.mux.send_keys(&pane.id, line) {
                report(&pane.host.address, &e.to_string());
            }
        }
        self.state = SessionState::Ready;
    }

    /// Send Ctrl+C to every pane
    pub fn interrupt_all(&mut self) {
        for pane in &self.panes {
            if let Err(e) = self.mux.send_interrupt(&pane.id) {
                report(&pane.host.address, &e.to_string());
            }
        }
    }

    /// Read operator input until `exit` or end of input, then close
    pub fn run(&mut self, input: &mut dyn OperatorInput) {
        println!(
            "Broadcasting to {} host(s) in tmux session '{}'. Type 'exit' to quit.",
            self.panes.len(),
            self.name
        );
        let prompt = format!("docki [{}]> ", self.name);

        while self.state == SessionState::Ready {
            match input.next_event(&prompt) {
                InputEvent::Line(line) if line.trim() == "exit" => break,
                InputEvent::Line(line) => self.broadcast(&line),
                InputEvent::Interrupt => self.interrupt_all(),
                InputEvent::End => break,
            }
        }

        self.close();
    }

    /// Close every host pane in host order. The broadcast window goes with
    /// them; the session stays for re-attachment.
    pub fn close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        self.state = SessionState::Closing;
        for pane in &self.panes {
            if let Err(e) = self.mux.kill_pane(&pane.id) {
                warn!(pane = %pane.id, error = %e, "failed to close pane");
            }
        }
        self.state = SessionState::Closed;
    }
}

fn report(address: &str, message: &str) {
    warn!(host = %address, error = %message, "pane setup failed");
    eprintln!("Host {}: {}", address, message);
}
