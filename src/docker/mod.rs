//! Container engine interface
//!
//! Docki never runs containers itself. Every build, run and status query goes
//! through the [`ContainerEngine`] trait; [`DockerCli`] implements it by
//! shelling out to the `docker` binary.

mod cli;
#[cfg(test)]
pub mod fake;

pub use cli::DockerCli;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::error::Result;

/// Request to build an image from an in-memory Dockerfile
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRequest {
    pub dockerfile: String,
    pub tag: String,
    /// Bypass the layer cache
    pub no_cache: bool,
}

impl BuildRequest {
    /// Arguments to `docker` for this build. The Dockerfile is read from stdin
    /// and no build context is sent.
    pub fn docker_args(&self) -> Vec<String> {
        let mut args = vec![
            "build".to_string(),
            "--rm".to_string(),
            "--network".to_string(),
            "host".to_string(),
            "-t".to_string(),
            self.tag.clone(),
        ];
        if self.no_cache {
            args.push("--no-cache".to_string());
        }
        args.push("-".to_string());
        args
    }
}

/// A host directory bound into the container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mount {
    pub host: String,
    pub container: String,
}

impl Mount {
    pub fn bind(host: impl Into<String>, container: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            container: container.into(),
        }
    }

    /// `-v` value
    pub fn volume_spec(&self) -> String {
        format!("{}:{}:rw", self.host, self.container)
    }
}

/// Everything needed to start one container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    pub image: String,
    pub name: String,
    /// Command argv; empty means the image default
    pub command: Vec<String>,
    pub mounts: Vec<Mount>,
    /// `uid:gid`
    pub user: String,
    /// `None` selects the engine default runtime
    pub runtime: Option<String>,
    pub working_dir: String,
    pub shm_size: Option<String>,
    pub host_network: bool,
    /// Allocate a pseudo-terminal
    pub tty: bool,
    /// Keep stdin open
    pub interactive: bool,
    /// Remove the container when it exits
    pub auto_remove: bool,
}

impl RunOptions {
    /// Arguments to `docker` up to and including the image name
    pub fn docker_args(&self, detached: bool) -> Vec<String> {
        let mut args = vec!["run".to_string()];
        if detached {
            args.push("-d".to_string());
        }
        if self.auto_remove {
            args.push("--rm".to_string());
        }
        if self.interactive {
            args.push("-i".to_string());
        }
        if self.tty {
            args.push("-t".to_string());
        }
        if !self.name.is_empty() {
            args.push("--name".to_string());
            args.push(self.name.clone());
        }
        args.push("--user".to_string());
        args.push(self.user.clone());
        if self.host_network {
            args.push("--network".to_string());
            args.push("host".to_string());
        }
        if let Some(size) = &self.shm_size {
            args.push("--shm-size".to_string());
            args.push(size.clone());
        }
        for mount in &self.mounts {
            args.push("-v".to_string());
            args.push(mount.volume_spec());
        }
        args.push("-w".to_string());
        args.push(self.working_dir.clone());
        if let Some(runtime) = &self.runtime {
            args.push("--runtime".to_string());
            args.push(runtime.clone());
        }
        args.push(self.image.clone());
        args
    }
}

/// A container started by this invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerHandle {
    pub id: String,
    pub name: String,
}

/// Lifecycle state reported by the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerStatus {
    Created,
    Running,
    Paused,
    Restarting,
    Removing,
    Exited(i64),
    Dead,
    Unknown(String),
}

impl ContainerStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, ContainerStatus::Running | ContainerStatus::Restarting)
    }

    pub fn exit_code(&self) -> Option<i64> {
        match self {
            ContainerStatus::Exited(code) => Some(*code),
            _ => None,
        }
    }

    /// Parse the output of `docker inspect --format '{{json .State}}'`
    pub fn from_inspect_json(json: &str) -> Result<Self> {
        #[derive(Deserialize)]
        #[serde(rename_all = "PascalCase")]
        struct State {
            status: String,
            #[serde(default)]
            exit_code: i64,
        }

        let state: State = serde_json::from_str(json.trim())?;
        Ok(match state.status.as_str() {
            "created" => ContainerStatus::Created,
            "running" => ContainerStatus::Running,
            "paused" => ContainerStatus::Paused,
            "restarting" => ContainerStatus::Restarting,
            "removing" => ContainerStatus::Removing,
            "exited" => ContainerStatus::Exited(state.exit_code),
            "dead" => ContainerStatus::Dead,
            other => ContainerStatus::Unknown(other.to_string()),
        })
    }
}

/// Raw output chunks, one per line, newline included
pub type LogChunks = Box<dyn Iterator<Item = std::io::Result<Vec<u8>>>>;

/// Operations Docki needs from a container engine
pub trait ContainerEngine {
    /// Build an image and return its id
    fn build_image(&self, request: &BuildRequest) -> Result<String>;

    /// Start a detached container
    fn run_container(&self, options: &RunOptions) -> Result<ContainerHandle>;

    fn status(&self, id: &str) -> Result<ContainerStatus>;

    /// Follow output until the container stops, starting at `since` if given
    fn logs(&self, id: &str, since: Option<DateTime<Utc>>) -> Result<LogChunks>;

    fn stop(&self, id: &str) -> Result<()>;

    fn kill(&self, id: &str) -> Result<()>;

    fn remove(&self, id: &str, force: bool) -> Result<()>;

    /// Any container, running or not, with exactly this name
    fn find_container(&self, name: &str) -> Result<Option<ContainerHandle>>;
}
