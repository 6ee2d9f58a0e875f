//! Configuration for Docki
//!
//! The `docki.yaml` file in the project root describes the image to build,
//! the system packages to install and the Python dependencies to provision.
//! It is read once per invocation into an immutable [`EnvironmentSpec`].

mod project;
pub mod template;

pub use project::{ProjectPaths, PROJECT_MARKERS};

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;

use serde::{Deserialize, Serialize};

use crate::error::{DockiError, Result};

/// Name of the configuration file in the project root
pub const CONFIG_FILE: &str = "docki.yaml";

/// Default image and container name
pub const DEFAULT_TAG: &str = "docki_image";

/// Default shared memory size for run containers
pub const DEFAULT_SHM_SIZE: &str = "16G";

/// Default notebook token and password
pub const DEFAULT_NOTEBOOK_SECRET: &str = "docki";

/// Python dependency declaration, resolved once at load time
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Dependencies {
    /// No `python_dep` key, or an empty list
    #[default]
    None,
    /// Packages listed inline in docki.yaml
    Explicit(Vec<String>),
    /// A requirements file, relative to the project root
    Manifest(PathBuf),
}

impl Dependencies {
    /// Whether a virtual environment is part of this project
    pub fn is_declared(&self) -> bool {
        !matches!(self, Dependencies::None)
    }
}

/// A remote machine used by the broadcast session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteHost {
    /// Anything `ssh` accepts as a destination, e.g. `user@10.0.0.4`
    pub address: String,
    /// Directory to enter after login
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace: Option<String>,
}

/// Validated contents of docki.yaml
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnvironmentSpec {
    pub base_image: String,
    #[serde(rename = "system_dep")]
    pub system_dependencies: Vec<String>,
    #[serde(skip)]
    pub dependencies: Dependencies,
    pub tag: String,
    #[serde(rename = "shm_size")]
    pub shared_memory_size: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub init_commands: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub remote_hosts: Vec<RemoteHost>,
    pub notebook_token: String,
    pub notebook_password: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub notebook_args: String,
}

#[derive(Debug, Default, Deserialize)]
struct RawSpec {
    base_image: Option<String>,
    system_dep: Option<Vec<String>>,
    python_dep: Option<RawDependencies>,
    tag: Option<String>,
    shm_size: Option<RawSize>,
    #[serde(default)]
    init_commands: Vec<String>,
    #[serde(default)]
    remote_hosts: Vec<RemoteHost>,
    notebook_token: Option<String>,
    notebook_password: Option<String>,
    notebook_args: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawDependencies {
    Explicit(Vec<String>),
    Manifest { file: PathBuf },
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawSize {
    Bytes(u64),
    Text(String),
}

impl EnvironmentSpec {
    /// Parse and validate docki.yaml content
    pub fn from_yaml(content: &str) -> Result<Self> {
        let raw: RawSpec = if content.trim().is_empty() {
            RawSpec::default()
        } else {
            serde_yaml::from_str(content)?
        };

        let mut missing = Vec::new();
        if raw.base_image.is_none() {
            missing.push("base_image".to_string());
        }
        if raw.system_dep.is_none() {
            missing.push("system_dep".to_string());
        }
        let (Some(base_image), Some(system_dependencies)) = (raw.base_image, raw.system_dep) else {
            return Err(DockiError::MissingFields(missing));
        };

        let shared_memory_size = match raw.shm_size {
            Some(RawSize::Bytes(n)) => n.to_string(),
            Some(RawSize::Text(s)) => s.trim().to_string(),
            None => DEFAULT_SHM_SIZE.to_string(),
        };
        if !is_valid_size(&shared_memory_size) {
            return Err(DockiError::Configuration(format!(
                "Invalid shm_size '{}', expected a number with an optional b/k/m/g unit",
                shared_memory_size
            )));
        }

        let dependencies = match raw.python_dep {
            None => Dependencies::None,
            Some(RawDependencies::Explicit(list)) if list.is_empty() => Dependencies::None,
            Some(RawDependencies::Explicit(list)) => Dependencies::Explicit(list),
            Some(RawDependencies::Manifest { file }) => Dependencies::Manifest(file),
        };

        let tag = raw
            .tag
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| DEFAULT_TAG.to_string());

        Ok(Self {
            base_image,
            system_dependencies,
            dependencies,
            tag,
            shared_memory_size,
            init_commands: raw.init_commands,
            remote_hosts: raw.remote_hosts,
            notebook_token: raw
                .notebook_token
                .unwrap_or_else(|| DEFAULT_NOTEBOOK_SECRET.to_string()),
            notebook_password: raw
                .notebook_password
                .unwrap_or_else(|| DEFAULT_NOTEBOOK_SECRET.to_string()),
            notebook_args: raw.notebook_args.unwrap_or_default(),
        })
    }

    /// Load docki.yaml from a file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }
}

/// Load the environment spec of a project root, writing a template first if none exists
pub fn load_project_spec(paths: &ProjectPaths) -> Result<EnvironmentSpec> {
    let config_file = paths.host_root.join(CONFIG_FILE);
    if !config_file.exists() {
        template::write_template(&paths.host_root, false)?;
        return Err(DockiError::Configuration(format!(
            "No {} found in {}. A template was created, please verify it and run again",
            CONFIG_FILE,
            paths.host_root.display()
        )));
    }
    tracing::debug!(path = %config_file.display(), "loading environment spec");
    EnvironmentSpec::load(&config_file)
}

/// `shm_size`: a byte count with an optional b/k/m/g unit
static SIZE_RE: OnceLock<Regex> = OnceLock::new();

fn is_valid_size(size: &str) -> bool {
    SIZE_RE
        .get_or_init(|| Regex::new(r"^\d+[bkmgBKMG]?$").expect("size regex"))
        .is_match(size)
}
