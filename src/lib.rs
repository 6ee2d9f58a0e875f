//! Docki - reproducible Docker environments for Python projects
//!
//! Docki builds an image from the project's `docki.yaml`, installs the
//! declared Python dependencies into a virtual environment that lives in the
//! project directory, and runs commands, shells or notebook servers in a
//! container with the project mounted. A second mode opens one tmux pane per
//! remote host and types every line into all of them. `docki env` prepares
//! the same virtual environment on the host instead, without Docker.
//!
//! # Example
//!
//! ```no_run
//! use docki::{execute_command, Command, ExecutionContext, Tool};
//!
//! let cmd = Command::Run { tool: Tool::Shell, args: vec!["ls".into()] };
//! let ctx = ExecutionContext::default();
//! let result = execute_command(&cmd, &ctx).unwrap();
//! std::process::exit(result.exit_code());
//! ```

pub mod cli;
pub mod config;
pub mod container;
pub mod context;
pub mod docker;
pub mod engine;
pub mod error;
pub mod image;
pub mod local;
pub mod logs;
pub mod provision;
pub mod remote;
pub mod script;

pub use config::{Dependencies, EnvironmentSpec, ProjectPaths, RemoteHost};
pub use container::{ContainerRunner, Tool};
pub use context::{ExecutionContext, ExecutionMode, InterruptFlag};
pub use docker::{ContainerEngine, DockerCli};
pub use engine::{execute_command, execute_command_with_backends, Command, ExecutionResult};
pub use error::{DockiError, Result};
pub use image::ImageBuilder;
pub use local::{HostEnvironment, HostTool};
pub use provision::{LockStore, Provisioner};
pub use remote::{BroadcastSession, Multiplexer, Tmux};
