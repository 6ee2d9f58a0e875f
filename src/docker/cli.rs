//! `docker` command line backend

use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdout, Command, Stdio};

use chrono::{DateTime, SecondsFormat, Utc};
use tracing::debug;

use super::{BuildRequest, ContainerEngine, ContainerHandle, ContainerStatus, LogChunks, RunOptions};
use crate::error::{DockiError, Result};

/// Container engine backed by the `docker` binary on `PATH`
#[derive(Debug, Clone)]
pub struct DockerCli {
    binary: String,
}

impl DockerCli {
    pub fn new() -> Self {
        Self {
            binary: "docker".to_string(),
        }
    }

    fn display(&self, args: &[String]) -> String {
        format!("{} {}", self.binary, args.join(" "))
    }

    /// Run to completion and return trimmed stdout
    fn capture(&self, args: &[String], input: Option<&str>) -> Result<String> {
        debug!(command = %self.display(args), "invoking engine");

        let mut child = Command::new(&self.binary)
            .args(args)
            .stdin(if input.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| DockiError::EngineInvocation {
                command: self.display(args),
                output: e.to_string(),
            })?;

        if let (Some(text), Some(mut stdin)) = (input, child.stdin.take()) {
            stdin.write_all(text.as_bytes())?;
        }

        let output = child.wait_with_output()?;
        if !output.status.success() {
            return Err(DockiError::EngineInvocation {
                command: self.display(args),
                output: format!(
                    "{}{}",
                    String::from_utf8_lossy(&output.stdout),
                    String::from_utf8_lossy(&output.stderr)
                ),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::new()
    }
}

impl ContainerEngine for DockerCli {
    fn build_image(&self, request: &BuildRequest) -> Result<String> {
        let mut args = request.docker_args();
        // Print only the image id on success
        args.insert(1, "--quiet".to_string());
        self.capture(&args, Some(&request.dockerfile))
    }

    fn run_container(&self, options: &RunOptions) -> Result<ContainerHandle> {
        let mut args = options.docker_args(true);
        args.extend(options.command.iter().cloned());
        let id = self.capture(&args, None)?;
        Ok(ContainerHandle {
            id,
            name: options.name.clone(),
        })
    }

    fn status(&self, id: &str) -> Result<ContainerStatus> {
        let args = vec![
            "inspect".to_string(),
            "--format".to_string(),
            "{{json .State}}".to_string(),
            id.to_string(),
        ];
        let json = self.capture(&args, None)?;
        ContainerStatus::from_inspect_json(&json)
    }

    fn logs(&self, id: &str, since: Option<DateTime<Utc>>) -> Result<LogChunks> {
        let mut args = vec!["logs".to_string(), "--follow".to_string()];
        if let Some(since) = since {
            args.push("--since".to_string());
            args.push(since.to_rfc3339_opts(SecondsFormat::Nanos, true));
        }
        args.push(id.to_string());
        debug!(command = %self.display(&args), "following logs");

        let mut child = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| DockiError::EngineInvocation {
                command: self.display(&args),
                output: e.to_string(),
            })?;

        let stdout = child.stdout.take().ok_or_else(|| DockiError::EngineInvocation {
            command: self.display(&args),
            output: "no stdout pipe".to_string(),
        })?;

        Ok(Box::new(FollowLogs {
            child,
            reader: BufReader::new(stdout),
        }))
    }

    fn stop(&self, id: &str) -> Result<()> {
        self.capture(&["stop".to_string(), id.to_string()], None).map(|_| ())
    }

    fn kill(&self, id: &str) -> Result<()> {
        self.capture(&["kill".to_string(), id.to_string()], None).map(|_| ())
    }

    fn remove(&self, id: &str, force: bool) -> Result<()> {
        let mut args = vec!["rm".to_string()];
        if force {
            args.push("--force".to_string());
        }
        args.push(id.to_string());
        self.capture(&args, None).map(|_| ())
    }

    fn find_container(&self, name: &str) -> Result<Option<ContainerHandle>> {
        let args = vec![
            "ps".to_string(),
            "--all".to_string(),
            "--filter".to_string(),
            format!("name=^{}$", name),
            "--format".to_string(),
            "{{.ID}}".to_string(),
        ];
        let out = self.capture(&args, None)?;
        Ok(out.lines().next().filter(|l| !l.is_empty()).map(|id| ContainerHandle {
            id: id.to_string(),
            name: name.to_string(),
        }))
    }
}

/// Line iterator over a `docker logs --follow` child
struct FollowLogs {
    child: Child,
    reader: BufReader<ChildStdout>,
}

impl Iterator for FollowLogs {
    type Item = std::io::Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut line = Vec::new();
        match self.reader.read_until(b'\n', &mut line) {
            Ok(0) => None,
            Ok(_) => Some(Ok(line)),
            Err(e) => Some(Err(e)),
        }
    }
}

impl Drop for FollowLogs {
    fn drop(&mut self) {
        // The follower outlives an interrupted stream otherwise
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
