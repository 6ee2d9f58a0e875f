//! Command executor

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::config::template::{self, InitOutcome};
use crate::config::{self, EnvironmentSpec, ProjectPaths};
use crate::container::{ContainerRunner, Launch, Tool};
use crate::context::ExecutionContext;
use crate::docker::{ContainerEngine, ContainerHandle, DockerCli};
use crate::error::{DockiError, Result};
use crate::image::ImageBuilder;
use crate::local::{HostEnvironment, HostOutcome, HostRunner, HostTool, ProcessRunner};
use crate::logs::{LogStreamer, StreamOutcome};
use crate::provision::{ProvisionOutcome, Provisioner};
use crate::remote::{BroadcastSession, LineEditor, Multiplexer, SessionNames, Tmux};

/// Operator input history for remote sessions, relative to the project root
pub const HISTORY_FILE: &str = ".docki_history";

/// A single docki invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run a tool with extra arguments in the project container
    Run { tool: Tool, args: Vec<String> },
    /// Run a tool from the project virtual environment on the host
    Env { tool: HostTool, args: Vec<String> },
    /// Broadcast operator input to the configured remote hosts
    Remote,
    /// Write the docki.yaml template
    Init { force: bool },
    /// Stop and remove the project's container
    Stop,
    /// Kill and remove the project's container
    Kill,
}

/// External collaborators of the executor
pub struct Backends<'a> {
    pub engine: &'a dyn ContainerEngine,
    pub mux: &'a dyn Multiplexer,
    pub host: &'a dyn HostRunner,
    /// Session names handed out by this process
    pub names: SessionNames,
    /// Directory the project root is searched from
    pub start_dir: PathBuf,
}

/// Result of command execution
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub data: ResultData,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultData {
    /// The run container stopped on its own
    Completed { exit_code: Option<i64> },
    /// Scripts were written instead of contacting the engine
    Emitted { output_dir: PathBuf },
    /// Host virtual environment prepared, nothing run
    EnvironmentReady { venv: PathBuf },
    Initialized(InitOutcome),
    Removed { name: String, found: bool },
    SessionClosed { session: String },
}

impl ExecutionResult {
    fn new(data: ResultData, message: Option<String>) -> Self {
        Self { data, message }
    }

    /// Process exit code: the container's own status for finished runs
    pub fn exit_code(&self) -> i32 {
        match self.data {
            ResultData::Completed { exit_code: Some(code) } => i32::try_from(code).unwrap_or(1),
            _ => 0,
        }
    }
}

/// Execute a command against docker, tmux and the host, from the current directory
pub fn execute_command(cmd: &Command, ctx: &ExecutionContext) -> Result<ExecutionResult> {
    let engine = DockerCli::new();
    let mux = Tmux::new();
    let mut backends = Backends {
        engine: &engine,
        mux: &mux,
        host: &ProcessRunner,
        names: SessionNames::new(),
        start_dir: std::env::current_dir()?,
    };
    execute_command_with_backends(cmd, ctx, &mut backends)
}

/// Execute a command with explicit collaborators
pub fn execute_command_with_backends(
    cmd: &Command,
    ctx: &ExecutionContext,
    backends: &mut Backends<'_>,
) -> Result<ExecutionResult> {
    debug!(?cmd, mode = ?ctx.mode, "executing");
    match cmd {
        Command::Run { tool, args } => execute_run(*tool, args, ctx, backends),
        Command::Env { tool, args } => execute_env(*tool, args, ctx, backends),
        Command::Remote => execute_remote(backends),
        Command::Init { force } => execute_init(&backends.start_dir, *force),
        Command::Stop => execute_remove(false, ctx, backends),
        Command::Kill => execute_remove(true, ctx, backends),
    }
}

fn load_project(start_dir: &Path) -> Result<(ProjectPaths, EnvironmentSpec)> {
    let paths = ProjectPaths::discover(start_dir)?;
    let spec = config::load_project_spec(&paths)?;
    debug!(root = %paths.host_root.display(), work_dir = %paths.work_dir, tag = %spec.tag, "project loaded");
    Ok((paths, spec))
}

/// `--clean` starts over from an empty virtual environment
fn clear_venv(paths: &ProjectPaths) -> Result<()> {
    let venv = paths.venv_dir();
    if venv.exists() {
        info!(path = %venv.display(), "removing virtual environment");
        fs::remove_dir_all(&venv)?;
    }
    Ok(())
}

fn execute_run(tool: Tool, args: &[String], ctx: &ExecutionContext, backends: &Backends<'_>) -> Result<ExecutionResult> {
    let (paths, spec) = load_project(&backends.start_dir)?;
    let engine = backends.engine;

    if ctx.clean && ctx.mode.is_direct() {
        clear_venv(&paths)?;
    }

    // Ctrl+C also reaches `docker build`, which then fails on its own
    let image = ImageBuilder::new(engine, ctx)
        .build(&spec, &paths)
        .map_err(|e| if ctx.interrupt.take() { DockiError::Interrupted } else { e })?;

    if let ProvisionOutcome::Installed = Provisioner::new(engine, ctx).provision(&image, &spec, &paths)? {
        println!("Requirements installed.");
    }

    let tokens = tool.tokens(&spec, &paths, args);
    let runner = ContainerRunner::new(engine, ctx);
    match runner.start(&image, &spec, &paths, &tokens)? {
        Launch::Emitted(run_script) => {
            let output_dir = run_script.parent().map(Path::to_path_buf).unwrap_or_default();
            let message = format!("Scripts written to {}", output_dir.display());
            Ok(ExecutionResult::new(ResultData::Emitted { output_dir }, Some(message)))
        }
        Launch::Running(handle) => supervise(&runner, &handle, engine, ctx),
    }
}

/// Stream the container's output until it stops or Ctrl+C arrives, then tear it down
fn supervise(
    runner: &ContainerRunner<'_>,
    handle: &ContainerHandle,
    engine: &dyn ContainerEngine,
    ctx: &ExecutionContext,
) -> Result<ExecutionResult> {
    let outcome = LogStreamer::stdout(engine, &ctx.interrupt).follow(handle);
    if matches!(outcome, Ok(StreamOutcome::Interrupted)) {
        println!("Shutting down the container");
    }
    runner.teardown(handle);

    match outcome? {
        StreamOutcome::Interrupted => Err(DockiError::Interrupted),
        StreamOutcome::Exited(exit_code) => {
            info!(id = %handle.id, ?exit_code, "container finished");
            Ok(ExecutionResult::new(ResultData::Completed { exit_code }, None))
        }
    }
}

fn execute_env(tool: HostTool, args: &[String], ctx: &ExecutionContext, backends: &Backends<'_>) -> Result<ExecutionResult> {
    if !ctx.mode.is_direct() {
        return Err(DockiError::Configuration(
            "`docki env` runs on the host and writes no scripts; drop --output".to_string(),
        ));
    }
    let (paths, spec) = load_project(&backends.start_dir)?;
    if ctx.clean {
        clear_venv(&paths)?;
    }

    match HostEnvironment::new(backends.host, ctx).run(tool, &spec, &paths, args)? {
        HostOutcome::Ready(venv) => {
            let message = format!("Virtual environment ready at {}", venv.display());
            Ok(ExecutionResult::new(ResultData::EnvironmentReady { venv }, Some(message)))
        }
        HostOutcome::Finished(code) => Ok(ExecutionResult::new(
            ResultData::Completed { exit_code: code.map(i64::from) },
            None,
        )),
    }
}

fn execute_remote(backends: &mut Backends<'_>) -> Result<ExecutionResult> {
    let (paths, spec) = load_project(&backends.start_dir)?;
    if spec.remote_hosts.is_empty() {
        return Err(DockiError::Configuration(format!(
            "No remote_hosts configured in {}",
            config::CONFIG_FILE
        )));
    }

    let mut session = BroadcastSession::create(backends.mux, &mut backends.names, &spec.tag, &spec.remote_hosts)?;
    if session.panes().is_empty() {
        return Err(DockiError::Multiplexer(format!(
            "No pane could be opened in session '{}'",
            session.name()
        )));
    }

    let mut input = LineEditor::new(Some(paths.host_root.join(HISTORY_FILE)))?;
    session.run(&mut input);

    let name = session.name().to_string();
    let message = format!("Closed the broadcast panes. Reattach with `tmux attach -t {}`", name);
    Ok(ExecutionResult::new(ResultData::SessionClosed { session: name }, Some(message)))
}

fn execute_init(dir: &Path, force: bool) -> Result<ExecutionResult> {
    let outcome = template::write_template(dir, force)?;
    let message = match outcome {
        InitOutcome::Created => format!("Created {}", config::CONFIG_FILE),
        InitOutcome::Overwritten => format!("Overwrote {}", config::CONFIG_FILE),
        InitOutcome::AlreadyExists => format!(
            "{} already exists, use --force to overwrite it",
            config::CONFIG_FILE
        ),
    };
    Ok(ExecutionResult::new(ResultData::Initialized(outcome), Some(message)))
}

fn execute_remove(kill: bool, ctx: &ExecutionContext, backends: &Backends<'_>) -> Result<ExecutionResult> {
    let (_, spec) = load_project(&backends.start_dir)?;
    let runner = ContainerRunner::new(backends.engine, ctx);
    let found = runner.remove_existing(&spec.tag, kill)?;
    // An install container survives only when its invocation died mid-install
    runner.remove_existing(&Provisioner::container_name(&spec), true)?;
    let message = (!found).then(|| format!("No container named {} found.", spec.tag));
    Ok(ExecutionResult::new(
        ResultData::Removed { name: spec.tag, found },
        message,
    ))
}
