//! In-memory engine for unit tests

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

use chrono::{DateTime, Utc};

use super::{BuildRequest, ContainerEngine, ContainerHandle, ContainerStatus, LogChunks, RunOptions};
use crate::error::{DockiError, Result};

/// Records every call; containers exit with `exit_code` once `statuses` runs out
#[derive(Debug, Default)]
pub struct FakeEngine {
    pub calls: RefCell<Vec<String>>,
    pub builds: RefCell<Vec<BuildRequest>>,
    pub runs: RefCell<Vec<RunOptions>>,
    /// Returned by the next `logs` call
    pub log_lines: RefCell<Vec<Vec<u8>>>,
    pub statuses: RefCell<VecDeque<ContainerStatus>>,
    pub exit_code: Cell<i64>,
    pub existing: RefCell<Vec<String>>,
    pub fail_build: Cell<bool>,
    /// `status` fails as if the container had already been removed
    pub fail_status: Cell<bool>,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_logs(self, lines: Vec<Vec<u8>>) -> Self {
        *self.log_lines.borrow_mut() = lines;
        self
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls.borrow().iter().filter(|c| c.starts_with(prefix)).count()
    }

    fn record(&self, call: String) {
        self.calls.borrow_mut().push(call);
    }
}

impl ContainerEngine for FakeEngine {
    fn build_image(&self, request: &BuildRequest) -> Result<String> {
        self.record(format!("build {}", request.tag));
        self.builds.borrow_mut().push(request.clone());
        if self.fail_build.get() {
            return Err(DockiError::EngineInvocation {
                command: "docker build".into(),
                output: "E: Unable to locate package nope".into(),
            });
        }
        Ok("sha256:feedface".into())
    }

    fn run_container(&self, options: &RunOptions) -> Result<ContainerHandle> {
        self.record(format!("run {}", options.name));
        self.runs.borrow_mut().push(options.clone());
        Ok(ContainerHandle {
            id: format!("id-{}", options.name),
            name: options.name.clone(),
        })
    }

    fn status(&self, id: &str) -> Result<ContainerStatus> {
        self.record(format!("status {}", id));
        if self.fail_status.get() {
            return Err(DockiError::EngineInvocation {
                command: format!("docker inspect {}", id),
                output: format!("Error: No such object: {}", id),
            });
        }
        Ok(self
            .statuses
            .borrow_mut()
            .pop_front()
            .unwrap_or(ContainerStatus::Exited(self.exit_code.get())))
    }

    fn logs(&self, id: &str, _since: Option<DateTime<Utc>>) -> Result<LogChunks> {
        self.record(format!("logs {}", id));
        let lines = std::mem::take(&mut *self.log_lines.borrow_mut());
        Ok(Box::new(lines.into_iter().map(Ok)))
    }

    fn stop(&self, id: &str) -> Result<()> {
        self.record(format!("stop {}", id));
        Ok(())
    }

    fn kill(&self, id: &str) -> Result<()> {
        self.record(format!("kill {}", id));
        Ok(())
    }

    fn remove(&self, id: &str, force: bool) -> Result<()> {
        self.record(format!("remove {} force={}", id, force));
        Ok(())
    }

    fn find_container(&self, name: &str) -> Result<Option<ContainerHandle>> {
        self.record(format!("find {}", name));
        Ok(self.existing.borrow().iter().find(|n| *n == name).map(|n| ContainerHandle {
            id: format!("id-{}", n),
            name: n.clone(),
        }))
    }
}
