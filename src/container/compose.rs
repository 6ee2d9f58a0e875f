//! Startup command composition

use crate::config::{EnvironmentSpec, ProjectPaths};

/// What the run container executes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    /// `python3` from the project virtual environment
    Python,
    /// The user's tokens as given
    Shell,
    /// A Jupyter notebook server
    Notebook,
}

impl Tool {
    /// Command tokens for this tool with the user's arguments appended
    pub fn tokens(&self, spec: &EnvironmentSpec, paths: &ProjectPaths, args: &[String]) -> Vec<String> {
        let venv_bin = format!("{}/bin", paths.container_venv());
        let mut tokens = match self {
            Tool::Python => vec![format!("{}/python3", venv_bin)],
            Tool::Shell => Vec::new(),
            Tool::Notebook => {
                let mut t = vec![
                    format!("{}/jupyter", venv_bin),
                    "notebook".to_string(),
                    "--no-browser".to_string(),
                ];
                if !spec.notebook_args.trim().is_empty() {
                    t.push(spec.notebook_args.trim().to_string());
                }
                t.push("--ServerApp.allow_origin='*'".to_string());
                t.push(format!("--ServerApp.token='{}'", spec.notebook_token));
                t.push(format!("--ServerApp.password='{}'", spec.notebook_password));
                t.push(format!("--ServerApp.root_dir='{}/'", paths.work_dir));
                t
            }
        };
        tokens.extend(args.iter().cloned());
        tokens
    }
}

/// One opaque `bash -c` body.
///
/// Tokens are joined with spaces and nothing is escaped. Callers must quote
/// untrusted input themselves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedCommand {
    body: String,
}

impl ComposedCommand {
    /// PATH prefix (when dependencies are declared), init commands, then the user command, `&&`-chained
    pub fn compose(tokens: &[String], spec: &EnvironmentSpec, paths: &ProjectPaths) -> Self {
        let mut segments = Vec::with_capacity(spec.init_commands.len() + 2);
        if spec.dependencies.is_declared() {
            segments.push(format!("export PATH={}/bin:$PATH", paths.container_venv()));
        }
        segments.extend(spec.init_commands.iter().cloned());
        segments.push(tokens.join(" "));

        Self {
            body: segments.join(" && "),
        }
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    /// argv for the engine
    pub fn argv(&self) -> Vec<String> {
        vec!["bash".to_string(), "-c".to_string(), self.body.clone()]
    }
}
