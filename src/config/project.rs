//! Project root discovery

use std::path::{Path, PathBuf};

use crate::error::{DockiError, Result};

/// Files whose presence marks a directory as the project root
pub const PROJECT_MARKERS: [&str; 4] = ["docki.yaml", "requirements.txt", "pyproject.toml", ".git"];

/// Where the project lives on the host and inside the container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectPaths {
    /// Current directory, as seen from inside the container
    pub work_dir: String,
    /// Project root on the host
    pub host_root: PathBuf,
    /// Mount point of the project root inside the container (`/<root name>`)
    pub container_root: String,
}

impl ProjectPaths {
    /// Walk up from `start` until a directory containing a project marker is found
    pub fn discover(start: &Path) -> Result<Self> {
        let start = start.canonicalize()?;

        for dir in start.ancestors() {
            // The filesystem root is never a project root
            let Some(name) = dir.file_name() else {
                break;
            };

            if PROJECT_MARKERS.iter().any(|m| dir.join(m).exists()) {
                let container_root = format!("/{}", name.to_string_lossy());
                let relative = start.strip_prefix(dir).unwrap_or(Path::new(""));
                let mut work_dir = container_root.clone();
                for part in relative.components() {
                    work_dir.push('/');
                    work_dir.push_str(&part.as_os_str().to_string_lossy());
                }

                return Ok(Self {
                    work_dir,
                    host_root: dir.to_path_buf(),
                    container_root,
                });
            }
        }

        Err(DockiError::Configuration(
            "No project root found. Run 'docki init' in your project root to create a docki.yaml file"
                .to_string(),
        ))
    }

    /// Virtual environment directory on the host
    pub fn venv_dir(&self) -> PathBuf {
        self.host_root.join("venv")
    }

    /// Virtual environment directory inside the container
    pub fn container_venv(&self) -> String {
        format!("{}/venv", self.container_root)
    }
}
