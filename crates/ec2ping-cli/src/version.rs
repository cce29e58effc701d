/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Git commit SHA
pub const GIT_SHA: &str = env!("VERGEN_GIT_SHA");

pub const GIT_COMMIT_TIMESTAMP: &str = env!("VERGEN_GIT_COMMIT_TIMESTAMP");

pub const GIT_BRANCH: &str = env!("VERGEN_GIT_BRANCH");

/// "true" when built from a dirty working tree
pub const GIT_DIRTY: &str = env!("VERGEN_GIT_DIRTY");

pub const RUSTC_VERSION: &str = env!("VERGEN_RUSTC_SEMVER");

pub const BUILD_TIMESTAMP: &str = env!("VERGEN_BUILD_TIMESTAMP");

pub const TARGET: &str = env!("VERGEN_CARGO_TARGET_TRIPLE");

/// `<version> (<git_sha>[ dirty])`
pub fn full_version() -> String {
    let dirty = if GIT_DIRTY == "true" { " dirty" } else { "" };
    format!("{VERSION} ({GIT_SHA}{dirty})")
}

/// Multi-line build report printed by `ec2ping version`.
pub fn build_info() -> String {
    format!(
        "ec2ping {}\n\
         commit: {} ({})\n\
         branch: {}\n\
         built:  {}\n\
         rustc:  {}\n\
         target: {}",
        full_version(),
        GIT_SHA,
        GIT_COMMIT_TIMESTAMP,
        GIT_BRANCH,
        BUILD_TIMESTAMP,
        RUSTC_VERSION,
        TARGET
    )
}

/// Build metadata as JSON, for `ec2ping version --json`.
pub fn build_info_json() -> serde_json::Value {
    serde_json::json!({
        "version": VERSION,
        "gitSha": GIT_SHA,
        "gitBranch": GIT_BRANCH,
        "gitCommitTimestamp": GIT_COMMIT_TIMESTAMP,
        "gitDirty": GIT_DIRTY == "true",
        "buildTimestamp": BUILD_TIMESTAMP,
        "rustc": RUSTC_VERSION,
        "target": TARGET,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_version_starts_with_crate_version() {
        assert!(full_version().starts_with(VERSION));
        assert!(build_info().starts_with("ec2ping "));
        assert_eq!(build_info_json()["version"], VERSION);
    }
}
