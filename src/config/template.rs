//! Template docki.yaml written by `docki init`

use std::fs;
use std::path::Path;

use super::CONFIG_FILE;
use crate::error::Result;

const EXAMPLE_LIST: &str = "\
base_image: ubuntu:latest
shm_size: 16G # shared memory size
tag: docki_image
system_dep:
    - python3
    - python3-pip
    - python3-dev
    - python3-venv
python_dep:
    - jupyter
notebook_token: docki
notebook_password: docki
";

const EXAMPLE_MANIFEST: &str = "\
base_image: nvidia/cuda:11.8.0-devel-ubuntu22.04
shm_size: 16G # shared memory size
tag: docki_image
system_dep:
    - python3
    - python3-pip
    - python3-dev
    - python3-venv
python_dep:
    file: ./requirements.txt
notebook_token: docki
notebook_password: docki
";

/// What `write_template` did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitOutcome {
    Created,
    Overwritten,
    AlreadyExists,
}

/// Render the template; the active example depends on whether a requirements file exists
pub fn render(requirements_exists: bool) -> String {
    let mut out = String::new();
    out.push_str("# docki.yaml\n");
    out.push_str("# Base image, system dependencies and python dependencies for the Docker container.\n");
    out.push_str("#\n");
    out.push_str("# base_image:    The base image for the container, see Docker Hub.\n");
    out.push_str("# system_dep:    System packages installed with apt-get.\n");
    out.push_str("# python_dep:    A list of python packages, or `file:` pointing to a requirements.txt.\n");
    out.push_str("# init_commands: Shell commands run before every command, chained with &&.\n");
    out.push_str("# remote_hosts:  Hosts for `docki remote`, each with `address` and optional `workspace`.\n");

    for (title, example) in [("example 1", EXAMPLE_LIST), ("example 2", EXAMPLE_MANIFEST)] {
        out.push_str(&format!("\n# {}:\n", title));
        for line in example.lines() {
            out.push_str("# ");
            out.push_str(line);
            out.push('\n');
        }
    }

    out.push('\n');
    out.push_str(if requirements_exists { EXAMPLE_MANIFEST } else { EXAMPLE_LIST });
    out
}

/// Write docki.yaml into `project_root`
pub fn write_template(project_root: &Path, force: bool) -> Result<InitOutcome> {
    let target = project_root.join(CONFIG_FILE);
    let requirements_exists = project_root.join("requirements.txt").exists();

    let outcome = match (target.exists(), force) {
        (false, _) => InitOutcome::Created,
        (true, true) => InitOutcome::Overwritten,
        (true, false) => return Ok(InitOutcome::AlreadyExists),
    };

    fs::write(&target, render(requirements_exists))?;
    tracing::info!(path = %target.display(), ?outcome, "wrote template");
    Ok(outcome)
}
