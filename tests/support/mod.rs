//! Shared helpers for the integration tests.

use std::path::PathBuf;

/// Locate the `stevelock-testbox` binary built alongside this crate in the
/// workspace's shared target directory. Not available via
/// `CARGO_BIN_EXE_*` since that variable only covers binaries of the
/// current package, not other workspace members.
pub fn testbox_path() -> PathBuf {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    for profile in ["debug", "release"] {
        let candidate = PathBuf::from(manifest_dir)
            .join("target")
            .join(profile)
            .join("stevelock-testbox");
        if candidate.exists() {
            return candidate;
        }
    }
    panic!(
        "stevelock-testbox binary not found under {manifest_dir}/target/{{debug,release}}; \
         build the workspace before running integration tests"
    );
}
