//! Image builder
//!
//! Renders a Dockerfile from the environment spec and builds it. The image
//! always contains a `docki` user with the host's uid/gid so files written to
//! the mounted project are not owned by root.

use std::fmt;

use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::config::{EnvironmentSpec, ProjectPaths};
use crate::context::{ExecutionContext, ExecutionMode, Identity};
use crate::docker::{BuildRequest, ContainerEngine};
use crate::error::Result;
use crate::script;

/// Image label carrying the build fingerprint
pub const FINGERPRINT_LABEL: &str = "docki.fingerprint";

/// Content hash of everything that goes into the Dockerfile's package layers
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BuildFingerprint(String);

impl BuildFingerprint {
    pub fn compute(base_image: &str, system_dependencies: &[String], identity: Identity) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(base_image.as_bytes());
        hasher.update([0u8]);
        for dep in system_dependencies {
            hasher.update(dep.as_bytes());
            hasher.update([0u8]);
        }
        hasher.update(identity.as_user_spec().as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BuildFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.0[..12.min(self.0.len())])
    }
}

/// Add `:latest` when the last path segment has no version qualifier
pub fn normalize_tag(tag: &str) -> String {
    let last_segment = tag.rsplit('/').next().unwrap_or(tag);
    if last_segment.contains(':') {
        tag.to_string()
    } else {
        format!("{}:latest", tag)
    }
}

/// The Dockerfile for a spec
pub fn render_dockerfile(
    spec: &EnvironmentSpec,
    container_root: &str,
    identity: Identity,
    fingerprint: &BuildFingerprint,
) -> String {
    let packages = spec.system_dependencies.join(" ");
    format!(
        r#"FROM {base_image}

SHELL ["/bin/bash", "-c"]
LABEL {label}="{fingerprint}"

ENV LANG=C.UTF-8
ENV LC_ALL=C.UTF-8
ENV DEBIAN_FRONTEND=noninteractive
RUN apt-get update && \
    apt-get install -y --no-install-recommends software-properties-common && \
    add-apt-repository universe && \
    apt-get update
RUN apt-get install -y --no-install-recommends sudo {packages} && \
    rm -rf /var/lib/apt/lists/*

# Non-root user mirroring the host identity
RUN groupadd -g {gid} docki && \
    adduser --disabled-password --gecos "" --uid {uid} --gid {gid} docki

RUN mkdir -p /.local; chmod -R 777 /.local
ENV HOME={root}/tmp
ENV XDG_CACHE_HOME={root}/tmp
"#,
        base_image = spec.base_image,
        label = FINGERPRINT_LABEL,
        fingerprint = fingerprint.as_str(),
        packages = packages,
        uid = identity.uid,
        gid = identity.gid,
        root = container_root,
    )
}

/// A built (or scripted) image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    /// Normalized tag, usable as `docker run` image argument
    pub tag: String,
    /// Engine image id; `None` in emit mode
    pub id: Option<String>,
    pub fingerprint: BuildFingerprint,
}

/// Builds the project image
pub struct ImageBuilder<'a> {
    engine: &'a dyn ContainerEngine,
    ctx: &'a ExecutionContext,
}

impl<'a> ImageBuilder<'a> {
    pub fn new(engine: &'a dyn ContainerEngine, ctx: &'a ExecutionContext) -> Self {
        Self { engine, ctx }
    }

    /// Build the image, or write `Dockerfile` and `build.sh` in emit mode
    pub fn build(&self, spec: &EnvironmentSpec, paths: &ProjectPaths) -> Result<ImageRef> {
        let tag = normalize_tag(&spec.tag);
        let fingerprint =
            BuildFingerprint::compute(&spec.base_image, &spec.system_dependencies, self.ctx.identity);
        let request = BuildRequest {
            dockerfile: render_dockerfile(spec, &paths.container_root, self.ctx.identity, &fingerprint),
            tag: tag.clone(),
            no_cache: self.ctx.clean,
        };
        debug!(%tag, %fingerprint, no_cache = request.no_cache, "build request");

        match &self.ctx.mode {
            ExecutionMode::Emit { output_dir } => {
                script::emit(output_dir, script::DOCKERFILE, &request.dockerfile, false)?;
                let body = script::docker_script(
                    &request.docker_args(),
                    &format!("< \"$(dirname \"$0\")/{}\"", script::DOCKERFILE),
                );
                script::emit(output_dir, script::BUILD_SCRIPT, &body, true)?;
                Ok(ImageRef { tag, id: None, fingerprint })
            }
            ExecutionMode::Direct => {
                println!("Building the Docker image based on {}...", spec.base_image);
                let id = self.engine.build_image(&request)?;
                info!(%tag, %id, "image built");
                Ok(ImageRef { tag, id: Some(id), fingerprint })
            }
        }
    }
}
