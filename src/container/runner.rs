//! Long-lived run containers

use std::path::PathBuf;

use tracing::{info, warn};

use super::compose::ComposedCommand;
use super::mapping::{mounts, select_runtime};
use crate::config::{EnvironmentSpec, ProjectPaths};
use crate::context::{ExecutionContext, ExecutionMode};
use crate::docker::{ContainerEngine, ContainerHandle, RunOptions};
use crate::error::{DockiError, Result};
use crate::image::ImageRef;
use crate::script;

/// Result of starting the run container
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Launch {
    /// A detached container owned by this invocation
    Running(ContainerHandle),
    /// Emit mode: path of the written `run.sh`, no container exists
    Emitted(PathBuf),
}

/// Starts and tears down the project's run container
pub struct ContainerRunner<'a> {
    engine: &'a dyn ContainerEngine,
    ctx: &'a ExecutionContext,
}

impl<'a> ContainerRunner<'a> {
    pub fn new(engine: &'a dyn ContainerEngine, ctx: &'a ExecutionContext) -> Self {
        Self { engine, ctx }
    }

    /// Engine options for running `command` from `image`
    pub fn run_options(
        &self,
        image: &ImageRef,
        spec: &EnvironmentSpec,
        paths: &ProjectPaths,
        command: &ComposedCommand,
    ) -> RunOptions {
        RunOptions {
            image: image.tag.clone(),
            name: spec.tag.clone(),
            command: command.argv(),
            mounts: mounts(self.ctx.platform, paths),
            user: self.ctx.identity.as_user_spec(),
            runtime: select_runtime(&spec.base_image).map(str::to_string),
            working_dir: paths.work_dir.clone(),
            shm_size: Some(spec.shared_memory_size.clone()),
            host_network: true,
            tty: true,
            interactive: true,
            auto_remove: false,
        }
    }

    /// Start the run container, or write `run.sh` in emit mode.
    ///
    /// A container already carrying the tag is never reused: the call fails
    /// with [`DockiError::NameConflict`].
    pub fn start(
        &self,
        image: &ImageRef,
        spec: &EnvironmentSpec,
        paths: &ProjectPaths,
        tokens: &[String],
    ) -> Result<Launch> {
        let command = ComposedCommand::compose(tokens, spec, paths);
        let mut options = self.run_options(image, spec, paths, &command);

        match &self.ctx.mode {
            ExecutionMode::Emit { output_dir } => {
                options.auto_remove = true;
                let mut args = options.docker_args(false);
                args.extend(command.argv());
                let body = script::docker_script(&args, "");
                let path = script::emit(output_dir, script::RUN_SCRIPT, &body, true)?;
                Ok(Launch::Emitted(path))
            }
            ExecutionMode::Direct => {
                if self.engine.find_container(&spec.tag)?.is_some() {
                    return Err(DockiError::NameConflict(spec.tag.clone()));
                }
                println!("Running the command: {}", tokens.join(" "));
                let handle = self.engine.run_container(&options)?;
                info!(id = %handle.id, name = %handle.name, runtime = ?options.runtime, "container started");
                Ok(Launch::Running(handle))
            }
        }
    }

    /// Stop then force-remove. Failures are logged, never returned.
    pub fn teardown(&self, handle: &ContainerHandle) {
        if let Err(e) = self.engine.stop(&handle.id) {
            warn!(id = %handle.id, error = %e, "failed to stop container");
        }
        if let Err(e) = self.engine.remove(&handle.id, true) {
            warn!(id = %handle.id, error = %e, "failed to remove container");
        }
    }

    /// Remove the container named `name` left by another invocation.
    /// Returns `false` when there is none.
    pub fn remove_existing(&self, name: &str, kill: bool) -> Result<bool> {
        let Some(handle) = self.engine.find_container(name)? else {
            return Ok(false);
        };
        println!("Found container {} with ID: {}", name, handle.id);
        if kill {
            self.engine.kill(&handle.id)?;
        } else {
            self.engine.stop(&handle.id)?;
        }
        self.engine.remove(&handle.id, true)?;
        println!("Container {} has been removed.", name);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{HostPlatform, Identity};
    use crate::docker::fake::FakeEngine;
    use crate::image::BuildFingerprint;

    fn paths() -> ProjectPaths {
        ProjectPaths {
            work_dir: "/proj/src".into(),
            host_root: PathBuf::from("/home/me/proj"),
            container_root: "/proj".into(),
        }
    }

    fn image() -> ImageRef {
        ImageRef {
            tag: "proj:latest".into(),
            id: Some("sha256:1".into()),
            fingerprint: BuildFingerprint::compute("x", &[], Identity::PLACEHOLDER),
        }
    }

    fn spec(base: &str) -> EnvironmentSpec {
        EnvironmentSpec::from_yaml(&format!(
            "base_image: {}\nsystem_dep: []\ntag: proj\nshm_size: 8G\npython_dep: [numpy]\n",
            base
        ))
        .unwrap()
    }

    fn ctx() -> ExecutionContext {
        ExecutionContext {
            platform: HostPlatform::Linux,
            identity: Identity { uid: 1234, gid: 99 },
            ..ExecutionContext::default()
        }
    }

    #[test]
    fn test_start_direct() {
        let engine = FakeEngine::new();
        let ctx = ctx();
        let runner = ContainerRunner::new(&engine, &ctx);
        let tokens = vec!["python3".to_string(), "run.py".to_string()];

        let launch = runner.start(&image(), &spec("nvidia/cuda:12"), &paths(), &tokens).unwrap();
        assert_eq!(
            launch,
            Launch::Running(ContainerHandle { id: "id-proj".into(), name: "proj".into() })
        );

        let runs = engine.runs.borrow();
        let opts = &runs[0];
        assert_eq!(opts.name, "proj");
        assert_eq!(opts.image, "proj:latest");
        assert_eq!(opts.user, "1234:99");
        assert_eq!(opts.runtime.as_deref(), Some("nvidia"));
        assert_eq!(opts.mounts.len(), 2);
        assert_eq!(opts.working_dir, "/proj/src");
        assert_eq!(opts.shm_size.as_deref(), Some("8G"));
        assert!(opts.tty && opts.interactive && !opts.auto_remove);
        assert_eq!(opts.command[2], "export PATH=/proj/venv/bin:$PATH && python3 run.py");
    }

    #[test]
    fn test_existing_container_is_a_conflict() {
        let engine = FakeEngine::new();
        engine.existing.borrow_mut().push("proj".into());
        let ctx = ctx();
        let runner = ContainerRunner::new(&engine, &ctx);

        let err = runner.start(&image(), &spec("ubuntu"), &paths(), &["ls".to_string()]).unwrap_err();
        assert!(matches!(err, DockiError::NameConflict(name) if name == "proj"));
        assert_eq!(engine.count("run"), 0);
    }

    #[test]
    fn test_emit_writes_interactive_run_script() {
        let dir = tempfile::tempdir().unwrap();
        let engine = FakeEngine::new();
        let ctx = ExecutionContext {
            mode: ExecutionMode::Emit { output_dir: dir.path().to_path_buf() },
            ..ctx()
        };
        let runner = ContainerRunner::new(&engine, &ctx);

        let launch = runner.start(&image(), &spec("ubuntu"), &paths(), &["ls".to_string()]).unwrap();
        let Launch::Emitted(path) = launch else {
            panic!("expected emitted script");
        };
        let script = std::fs::read_to_string(path).unwrap();
        assert!(script.contains("docker run --rm -i -t --name proj --user 1234:99"));
        assert!(script.contains("-v /mnt:/mnt:rw"));
        assert!(script.trim_end().ends_with("proj:latest bash -c 'export PATH=/proj/venv/bin:$PATH && ls'"));
        assert!(engine.calls.borrow().is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_emitted_script_passes_body_unexpanded() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let bin = dir.path().join("bin");
        std::fs::create_dir(&bin).unwrap();
        let docker = bin.join("docker");
        std::fs::write(&docker, "#!/bin/sh\nfor a in \"$@\"; do printf 'ARG[%s]\\n' \"$a\"; done\n").unwrap();
        std::fs::set_permissions(&docker, std::fs::Permissions::from_mode(0o755)).unwrap();

        let engine = FakeEngine::new();
        let ctx = ExecutionContext {
            mode: ExecutionMode::Emit { output_dir: dir.path().join("out") },
            ..ctx()
        };
        let spec = EnvironmentSpec::from_yaml(
            "base_image: ubuntu\nsystem_dep: []\ntag: proj\npython_dep: [numpy]\ninit_commands: [\"echo $HOME\", \"echo 'quoted'\"]\n",
        )
        .unwrap();
        let launch = ContainerRunner::new(&engine, &ctx)
            .start(&image(), &spec, &paths(), &["python3".to_string()])
            .unwrap();
        let Launch::Emitted(script) = launch else {
            panic!("expected emitted script");
        };

        let output = std::process::Command::new("bash")
            .arg(&script)
            .env("PATH", format!("{}:/usr/bin:/bin", bin.display()))
            .env("HOME", "/host/home")
            .output()
            .unwrap();
        assert!(output.status.success());
        let stdout = String::from_utf8(output.stdout).unwrap();
        let args: Vec<&str> = stdout.lines().collect();
        assert_eq!(&args[args.len() - 3..args.len() - 1], ["ARG[bash]", "ARG[-c]"]);
        assert_eq!(
            args[args.len() - 1],
            "ARG[export PATH=/proj/venv/bin:$PATH && echo $HOME && echo 'quoted' && python3]"
        );
    }

    #[test]
    fn test_teardown_stops_then_removes() {
        let engine = FakeEngine::new();
        let ctx = ctx();
        ContainerRunner::new(&engine, &ctx).teardown(&ContainerHandle { id: "c1".into(), name: "proj".into() });
        assert_eq!(*engine.calls.borrow(), vec!["stop c1", "remove c1 force=true"]);
    }

    #[test]
    fn test_remove_existing() {
        let engine = FakeEngine::new();
        let ctx = ctx();
        let runner = ContainerRunner::new(&engine, &ctx);
        assert!(!runner.remove_existing("proj", false).unwrap());

        engine.existing.borrow_mut().push("proj".into());
        assert!(runner.remove_existing("proj", true).unwrap());
        assert_eq!(engine.count("kill id-proj"), 1);
        assert_eq!(engine.count("remove id-proj"), 1);
    }
}
