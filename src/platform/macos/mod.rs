//! macOS sandbox backend using Seatbelt (`sandbox_init_with_parameters`).

mod ffi;
mod profile;

pub(crate) use ffi::SandboxProfile;

use crate::error::Result;
use crate::policy::Policy;

/// macOS backend: resolves the private Seatbelt symbols and compiles the
/// policy's SBPL profile once, at [`Sandbox::create`] time, and holds onto
/// the result for the lifetime of the sandbox — the same policy spawns at
/// most once, so there is nothing to recompile at spawn time.
///
/// [`Sandbox::create`]: crate::Sandbox::create
pub struct MacOSBackend {
    profile: SandboxProfile,
}

impl MacOSBackend {
    /// Resolve the Seatbelt entry points, failing fast if the dylib or its
    /// symbols are unavailable, then compile `policy` into its SBPL
    /// profile eagerly.
    pub fn new(policy: &Policy) -> Result<Self> {
        ffi::resolve()?;
        let sbpl = profile::build_profile(policy);
        tracing::debug!(profile = %sbpl, "seatbelt: compiled profile");
        let profile = SandboxProfile::new(&sbpl)?;
        Ok(Self { profile })
    }

    /// The profile compiled at construction time, ready to be applied in
    /// the forked child.
    pub(crate) fn profile(&self) -> &SandboxProfile {
        &self.profile
    }
}

/// Apply `profile` to the current process. Called in the forked child,
/// between `fork` and `execve`.
pub(crate) fn apply_in_child(profile: &SandboxProfile) -> std::result::Result<(), String> {
    profile.apply()
}
