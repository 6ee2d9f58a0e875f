//! Dependency provisioning
//!
//! Creates the project virtual environment inside a throwaway container and
//! installs the declared Python dependencies into it. The lock record gates
//! the install: an unchanged dependency set is never installed twice.

mod lock;

pub use lock::{LockStore, LOCK_FILE};

use std::fs;
use std::path::PathBuf;

use tracing::{info, warn};

use crate::config::{Dependencies, EnvironmentSpec, ProjectPaths};
use crate::container::{mounts, select_runtime};
use crate::context::{ExecutionContext, ExecutionMode};
use crate::docker::{ContainerEngine, RunOptions};
use crate::error::{DockiError, Result};
use crate::image::ImageRef;
use crate::logs::{LogStreamer, StreamOutcome};
use crate::script;

/// Dependency set to compare and the matching `pip install` arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDependencies {
    pub packages: Vec<String>,
    pub install_args: String,
}

/// Resolve a declaration against the project; `None` when nothing is declared
pub fn resolve(dependencies: &Dependencies, paths: &ProjectPaths) -> Result<Option<ResolvedDependencies>> {
    match dependencies {
        Dependencies::None => Ok(None),
        Dependencies::Explicit(list) => Ok(Some(ResolvedDependencies {
            packages: list.clone(),
            install_args: list.join(" "),
        })),
        Dependencies::Manifest(file) => {
            let host_file = paths.host_root.join(file);
            if !host_file.is_file() {
                return Err(DockiError::MissingResource(format!(
                    "Requirements file {} not found",
                    host_file.display()
                )));
            }
            let packages = fs::read_to_string(&host_file)?
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(String::from)
                .collect();
            let relative = file.to_string_lossy();
            let relative = relative.trim_start_matches("./");
            Ok(Some(ResolvedDependencies {
                packages,
                install_args: format!("-r {}/{}", paths.container_root, relative),
            }))
        }
    }
}

/// What `provision` did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisionOutcome {
    /// No dependencies declared
    NotDeclared,
    /// Lock record matches, nothing installed
    UpToDate,
    Installed,
    /// Emit mode: path of the written `install.sh`
    Emitted(PathBuf),
}

/// Installs project dependencies into `<project>/venv`
pub struct Provisioner<'a> {
    engine: &'a dyn ContainerEngine,
    ctx: &'a ExecutionContext,
}

impl<'a> Provisioner<'a> {
    pub fn new(engine: &'a dyn ContainerEngine, ctx: &'a ExecutionContext) -> Self {
        Self { engine, ctx }
    }

    /// Name of the install container
    pub fn container_name(spec: &EnvironmentSpec) -> String {
        format!("{}_provision", spec.tag)
    }

    /// Shell body creating the venv and installing into it
    pub fn install_command(paths: &ProjectPaths, resolved: &ResolvedDependencies) -> String {
        let venv = paths.container_venv();
        format!(
            "python3 -m venv {venv} && {venv}/bin/pip install {args}",
            venv = venv,
            args = resolved.install_args
        )
    }

    fn run_options(&self, image: &ImageRef, spec: &EnvironmentSpec, paths: &ProjectPaths, body: String) -> RunOptions {
        RunOptions {
            image: image.tag.clone(),
            name: Self::container_name(spec),
            command: vec!["bash".to_string(), "-c".to_string(), body],
            mounts: mounts(self.ctx.platform, paths),
            user: self.ctx.identity.as_user_spec(),
            runtime: select_runtime(&spec.base_image).map(str::to_string),
            working_dir: paths.container_root.clone(),
            shm_size: None,
            host_network: false,
            tty: true,
            interactive: false,
            auto_remove: false,
        }
    }

    /// Install the declared dependencies unless the lock record says they are current
    pub fn provision(&self, image: &ImageRef, spec: &EnvironmentSpec, paths: &ProjectPaths) -> Result<ProvisionOutcome> {
        let Some(resolved) = resolve(&spec.dependencies, paths)? else {
            return Ok(ProvisionOutcome::NotDeclared);
        };
        let body = Self::install_command(paths, &resolved);
        let mut options = self.run_options(image, spec, paths, body.clone());

        if let ExecutionMode::Emit { output_dir } = &self.ctx.mode {
            options.auto_remove = true;
            let mut args = options.docker_args(false);
            args.extend(options.command.iter().cloned());
            let content = script::docker_script(&args, "");
            let path = script::emit(output_dir, script::INSTALL_SCRIPT, &content, true)?;
            return Ok(ProvisionOutcome::Emitted(path));
        }

        let store = LockStore::for_project(paths);
        if store.is_current(&resolved.packages) {
            println!("Requirements already installed.");
            return Ok(ProvisionOutcome::UpToDate);
        }

        // Left behind by an invocation that never reached its cleanup
        if let Some(stale) = self.engine.find_container(&options.name)? {
            warn!(id = %stale.id, name = %stale.name, "removing stale install container");
            self.engine.remove(&stale.id, true)?;
        }

        println!("Building the virtual environment and installing the requirements...");
        let handle = self.engine.run_container(&options)?;
        let outcome = LogStreamer::stdout(self.engine, &self.ctx.interrupt).follow(&handle);

        if matches!(outcome, Ok(StreamOutcome::Interrupted)) {
            println!("Shutting down the container");
        }
        if let Err(e) = self.engine.stop(&handle.id) {
            warn!(id = %handle.id, error = %e, "failed to stop install container");
        }
        if let Err(e) = self.engine.remove(&handle.id, true) {
            warn!(id = %handle.id, error = %e, "failed to remove install container");
        }

        match outcome? {
            StreamOutcome::Interrupted => Err(DockiError::Interrupted),
            StreamOutcome::Exited(Some(0)) => {
                store.write(spec, &resolved.packages)?;
                info!(path = %store.path().display(), count = resolved.packages.len(), "lock record updated");
                Ok(ProvisionOutcome::Installed)
            }
            StreamOutcome::Exited(code) => Err(DockiError::EngineInvocation {
                command: body,
                output: match code {
                    Some(code) => format!("install container exited with status {}", code),
                    None => "install container disappeared before reporting a status".to_string(),
                },
            }),
        }
    }
}
