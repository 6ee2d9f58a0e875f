//! Host virtual environments
//!
//! `docki env` leaves Docker out: `<project>/venv` is created with the host
//! interpreter, the declared dependencies are installed with its pip, and
//! python or a notebook server runs straight from it. The lock record gates
//! the install the same way it does for containers.

#[cfg(test)]
pub mod fake;

use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, info};

use crate::config::{self, Dependencies, EnvironmentSpec, ProjectPaths};
use crate::context::ExecutionContext;
use crate::error::{DockiError, Result};
use crate::provision::{self, LockStore};

/// Interpreter used to create the virtual environment
const HOST_PYTHON: &str = if cfg!(windows) { "python" } else { "python3" };

/// What to start from the host virtual environment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostTool {
    Python,
    Notebook,
}

/// Runs programs on the host with the terminal attached
pub trait HostRunner {
    /// Exit code of `program`; `None` when a signal ended it
    fn run(&self, program: &Path, args: &[String]) -> Result<Option<i32>>;
}

/// [`HostRunner`] spawning real processes
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl HostRunner for ProcessRunner {
    fn run(&self, program: &Path, args: &[String]) -> Result<Option<i32>> {
        debug!(program = %program.display(), ?args, "running on the host");
        let status = Command::new(program).args(args).status().map_err(|e| DockiError::HostCommand {
            command: program.display().to_string(),
            reason: e.to_string(),
        })?;
        Ok(status.code())
    }
}

/// Executables of a virtual environment
pub fn venv_bin(venv: &Path) -> PathBuf {
    if cfg!(windows) {
        venv.join("Scripts")
    } else {
        venv.join("bin")
    }
}

/// `pip install` arguments for the host: inline packages, or `-r` with the
/// requirements file's host path
pub fn install_args(dependencies: &Dependencies, paths: &ProjectPaths) -> Vec<String> {
    match dependencies {
        Dependencies::None => Vec::new(),
        Dependencies::Explicit(list) => list.clone(),
        Dependencies::Manifest(file) => {
            let file = file.strip_prefix(".").unwrap_or(file);
            vec!["-r".to_string(), paths.host_root.join(file).display().to_string()]
        }
    }
}

/// What `run` did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostOutcome {
    /// Environment prepared, nothing to start
    Ready(PathBuf),
    /// The tool ran; its exit code
    Finished(Option<i32>),
}

/// Prepares `<project>/venv` on the host and runs tools from it
pub struct HostEnvironment<'a> {
    runner: &'a dyn HostRunner,
    ctx: &'a ExecutionContext,
}

impl<'a> HostEnvironment<'a> {
    pub fn new(runner: &'a dyn HostRunner, ctx: &'a ExecutionContext) -> Self {
        Self { runner, ctx }
    }

    /// Create the venv and install into it unless the lock record is current.
    /// Returns whether anything was installed.
    pub fn prepare(&self, spec: &EnvironmentSpec, paths: &ProjectPaths) -> Result<bool> {
        let Some(resolved) = provision::resolve(&spec.dependencies, paths)? else {
            return Err(DockiError::Configuration(format!(
                "python_dep must be set in {} to use the host environment",
                config::CONFIG_FILE
            )));
        };

        let store = LockStore::for_project(paths);
        if store.is_current(&resolved.packages) {
            debug!(lock = %store.path().display(), "host environment is current");
            return Ok(false);
        }

        println!("Building the virtual environment and installing the requirements...");
        let venv = paths.venv_dir();
        self.checked(
            Path::new(HOST_PYTHON),
            &["-m".to_string(), "venv".to_string(), venv.display().to_string()],
        )?;

        let mut pip = vec!["install".to_string()];
        pip.extend(install_args(&spec.dependencies, paths));
        self.checked(&venv_bin(&venv).join("pip"), &pip)?;

        store.write(spec, &resolved.packages)?;
        info!(venv = %venv.display(), packages = resolved.packages.len(), "host environment installed");
        Ok(true)
    }

    /// Program and arguments for `tool`, with the user's arguments appended
    pub fn invocation(tool: HostTool, spec: &EnvironmentSpec, paths: &ProjectPaths, args: &[String]) -> (PathBuf, Vec<String>) {
        let bin = venv_bin(&paths.venv_dir());
        match tool {
            HostTool::Python => (bin.join("python"), args.to_vec()),
            HostTool::Notebook => {
                let mut argv = vec!["notebook".to_string(), "--no-browser".to_string()];
                argv.extend(spec.notebook_args.split_whitespace().map(String::from));
                argv.push("--ServerApp.allow_origin=*".to_string());
                argv.push(format!("--ServerApp.token={}", spec.notebook_token));
                argv.push(format!("--ServerApp.password={}", spec.notebook_password));
                argv.extend(args.iter().cloned());
                (bin.join("jupyter"), argv)
            }
        }
    }

    /// Prepare the environment, then start `tool`. Python without arguments
    /// only prepares.
    pub fn run(&self, tool: HostTool, spec: &EnvironmentSpec, paths: &ProjectPaths, args: &[String]) -> Result<HostOutcome> {
        if self.prepare(spec, paths)? {
            println!("Requirements installed.");
        }
        if tool == HostTool::Python && args.is_empty() {
            return Ok(HostOutcome::Ready(paths.venv_dir()));
        }

        let (program, argv) = Self::invocation(tool, spec, paths, args);
        let code = self.runner.run(&program, &argv)?;
        if self.ctx.interrupt.take() {
            return Err(DockiError::Interrupted);
        }
        Ok(HostOutcome::Finished(code))
    }

    /// Run a setup step; anything but a clean exit fails
    fn checked(&self, program: &Path, args: &[String]) -> Result<()> {
        let code = self.runner.run(program, args)?;
        if self.ctx.interrupt.take() {
            return Err(DockiError::Interrupted);
        }
        match code {
            Some(0) => Ok(()),
            other => Err(DockiError::HostCommand {
                command: format!("{} {}", program.display(), args.join(" ")),
                reason: match other {
                    Some(code) => format!("exit status {}", code),
                    None => "terminated by a signal".to_string(),
                },
            }),
        }
    }
}
