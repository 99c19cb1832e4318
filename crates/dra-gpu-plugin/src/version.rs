/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Git commit SHA
pub const GIT_SHA: &str = env!("VERGEN_GIT_SHA");

/// Git commit timestamp
pub const GIT_COMMIT_TIMESTAMP: &str = env!("VERGEN_GIT_COMMIT_TIMESTAMP");

/// Whether the working tree had uncommitted changes
pub const GIT_DIRTY: &str = env!("VERGEN_GIT_DIRTY");

/// Rust compiler version used to build
pub const RUSTC_VERSION: &str = env!("VERGEN_RUSTC_SEMVER");

/// Build timestamp
pub const BUILD_TIMESTAMP: &str = env!("VERGEN_BUILD_TIMESTAMP");

/// Target triple
pub const TARGET: &str = env!("VERGEN_CARGO_TARGET_TRIPLE");

/// DRA driver name the plugin registers under.
pub const DRIVER_NAME: &str = "gpu.resource.example.com";

/// Returns full version string with git metadata.
/// Format: <version> (<git_sha>) [dirty]
pub fn full_version() -> String {
    let dirty = if GIT_DIRTY == "true" { " dirty" } else { "" };
    format!("{VERSION} ({GIT_SHA}{dirty})")
}

/// Returns detailed build information for diagnostics.
pub fn build_info() -> String {
    format!(
        "dra-gpu-plugin {}\n\
         driver: {}\n\
         commit: {} ({})\n\
         built:  {}\n\
         rustc:  {}\n\
         target: {}",
        full_version(),
        DRIVER_NAME,
        GIT_SHA,
        GIT_COMMIT_TIMESTAMP,
        BUILD_TIMESTAMP,
        RUSTC_VERSION,
        TARGET
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_info_names_driver() {
        let info = build_info();
        assert!(info.starts_with("dra-gpu-plugin "));
        assert!(info.contains(DRIVER_NAME));
        assert!(full_version().starts_with(VERSION));
    }

    #[test]
    fn test_git_fallbacks_are_all_read() {
        let build = include_str!("../build.rs");
        let version = include_str!("version.rs");
        for key in build.split('"').filter(|s| s.starts_with("VERGEN_GIT_")) {
            assert!(
                version.contains(&format!("env!(\"{key}\")")),
                "{key} is emitted but never read"
            );
        }
    }
}
