//! Run containers
//!
//! Composition of the startup command and the host mappings (mounts,
//! identity, runtime), plus the runner that starts and tears down the
//! project's long-lived container.

mod compose;
mod mapping;
mod runner;

pub use compose::{ComposedCommand, Tool};
pub use mapping::{mounts, select_runtime, ACCELERATOR_RUNTIMES};
pub use runner::{ContainerRunner, Launch};
