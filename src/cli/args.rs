//! CLI argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::container::Tool;
use crate::engine::Command;
use crate::local::HostTool;

#[derive(Parser)]
#[command(name = "docki")]
#[command(author, version, about = "Run project commands in reproducible Docker environments", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: SubCommand,

    /// Rebuild the image without cache and reinstall the requirements
    #[arg(long, global = true)]
    pub clean: bool,

    /// Write Dockerfile and shell scripts to DIR instead of running docker
    #[arg(long, global = true, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum SubCommand {
    /// Run python3 from the project virtual environment
    Py {
        /// Arguments passed to python3
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Run a shell command in the container
    Shell {
        /// The command and its arguments
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
        command: Vec<String>,
    },

    /// Start a Jupyter notebook server
    Book {
        /// Extra arguments for jupyter notebook
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Use the project virtual environment on the host, without Docker
    Env {
        #[command(subcommand)]
        tool: EnvCommand,
    },

    /// Type into a shell on every remote host at once
    Remote,

    /// Create a docki.yaml template in the current directory
    Init {
        /// Overwrite an existing docki.yaml
        #[arg(long)]
        force: bool,
    },

    /// Stop and remove the project container
    Stop,

    /// Kill and remove the project container
    Kill,
}

#[derive(Subcommand)]
pub enum EnvCommand {
    /// Run python from the host virtual environment
    Py {
        /// Arguments passed to python; none only prepares the environment
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Start a Jupyter notebook server from the host virtual environment
    Book {
        /// Extra arguments for jupyter notebook
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
}

impl SubCommand {
    /// The executor command this subcommand stands for
    pub fn to_command(&self) -> Command {
        match self {
            SubCommand::Py { args } => Command::Run { tool: Tool::Python, args: args.clone() },
            SubCommand::Shell { command } => Command::Run { tool: Tool::Shell, args: command.clone() },
            SubCommand::Book { args } => Command::Run { tool: Tool::Notebook, args: args.clone() },
            SubCommand::Env { tool: EnvCommand::Py { args } } => {
                Command::Env { tool: HostTool::Python, args: args.clone() }
            }
            SubCommand::Env { tool: EnvCommand::Book { args } } => {
                Command::Env { tool: HostTool::Notebook, args: args.clone() }
            }
            SubCommand::Remote => Command::Remote,
            SubCommand::Init { force } => Command::Init { force: *force },
            SubCommand::Stop => Command::Stop,
            SubCommand::Kill => Command::Kill,
        }
    }
}
