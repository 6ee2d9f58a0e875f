//! Execution engine for Docki commands

pub mod executor;

pub use executor::{
    execute_command, execute_command_with_backends, Backends, Command, ExecutionResult, ResultData, HISTORY_FILE,
};
