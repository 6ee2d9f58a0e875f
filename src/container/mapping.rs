//! Host to container mapping tables

use crate::config::ProjectPaths;
use crate::context::HostPlatform;
use crate::docker::Mount;

/// Mounts added on Linux next to the project root
const LINUX_EXTRA_MOUNTS: &[(&str, &str)] = &[("/mnt", "/mnt")];

/// Mounts added elsewhere
const OTHER_EXTRA_MOUNTS: &[(&str, &str)] = &[];

/// Base image markers and the runtime they select, checked in order
pub const ACCELERATOR_RUNTIMES: &[(&str, &str)] = &[("cuda", "nvidia"), ("nvidia", "nvidia")];

fn extra_mounts(platform: HostPlatform) -> &'static [(&'static str, &'static str)] {
    match platform {
        HostPlatform::Linux => LINUX_EXTRA_MOUNTS,
        HostPlatform::Other => OTHER_EXTRA_MOUNTS,
    }
}

/// Project root bind mount followed by the platform's extra mounts
pub fn mounts(platform: HostPlatform, paths: &ProjectPaths) -> Vec<Mount> {
    let mut mounts = vec![Mount::bind(
        paths.host_root.to_string_lossy(),
        paths.container_root.clone(),
    )];
    mounts.extend(
        extra_mounts(platform)
            .iter()
            .map(|(host, container)| Mount::bind(*host, *container)),
    );
    mounts
}

/// Runtime for a base image; `None` keeps the engine default
pub fn select_runtime(base_image: &str) -> Option<&'static str> {
    ACCELERATOR_RUNTIMES
        .iter()
        .find(|(marker, _)| base_image.contains(marker))
        .map(|(_, runtime)| *runtime)
}
