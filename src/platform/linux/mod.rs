//! Linux sandbox backend using Landlock.

mod landlock_rules;

use landlock::{ABI, Access, AccessFs, Ruleset, RulesetCreatedAttr};

use crate::error::{Error, Result};
use crate::policy::Policy;

pub(crate) use landlock_rules::PreparedRuleset;

/// Linux backend: holds the Landlock ABI negotiated at [`Sandbox::create`]
/// time.
///
/// [`Sandbox::create`]: crate::Sandbox::create
pub struct LinuxBackend {
    abi: ABI,
}

impl LinuxBackend {
    /// Probe the running kernel's Landlock ABI and fail if Landlock is
    /// unavailable at all (ABI < 1).
    ///
    /// Mirrors `landlock_create_ruleset(NULL, 0, VERSION)`: we don't have a
    /// raw syscall wrapper available, so we determine the same thing by
    /// trying to create a ruleset handling each ABI's full filesystem
    /// access set, from newest to oldest, and keeping the first that
    /// succeeds.
    ///
    /// `_policy` is unused on Linux: unlike the macOS profile, the Landlock
    /// ruleset is rebuilt fresh on every spawn (see [`compile`](Self::compile))
    /// rather than cached at construction time, so only the ABI negotiation
    /// happens here. The parameter exists so both backends share the same
    /// `NativeBackend::new(&policy)` call site in [`Sandbox::create`].
    ///
    /// [`Sandbox::create`]: crate::Sandbox::create
    pub fn new(_policy: &Policy) -> Result<Self> {
        let abi = Self::detect_abi()?;
        tracing::debug!(abi = abi_number(abi), "landlock: abi negotiated");
        Ok(Self { abi })
    }

    fn detect_abi() -> Result<ABI> {
        const CANDIDATES: [ABI; 5] = [ABI::V5, ABI::V4, ABI::V3, ABI::V2, ABI::V1];
        for abi in CANDIDATES {
            let probe = Ruleset::default()
                .handle_access(AccessFs::from_all(abi))
                .and_then(|r| r.create());
            if probe.is_ok() {
                return Ok(abi);
            }
        }
        Err(Error::UnsupportedKernel(
            "Landlock is not available on this kernel".to_string(),
        ))
    }

    /// Compile `policy` into an installable ruleset, ready to be restricted
    /// onto the current process in a forked child.
    pub(crate) fn compile(&self, policy: &Policy) -> Result<PreparedRuleset> {
        landlock_rules::build_ruleset(self.abi, policy)
    }
}

pub(crate) fn abi_number(abi: ABI) -> i32 {
    match abi {
        ABI::V1 => 1,
        ABI::V2 => 2,
        ABI::V3 => 3,
        ABI::V4 => 4,
        ABI::V5 => 5,
        _ => 0,
    }
}

/// Restrict the current process to `ruleset`. Called in the forked child,
/// between `fork` and `execve`: `prctl(PR_SET_NO_NEW_PRIVS)` first (required
/// to call `landlock_restrict_self` without `CAP_SYS_ADMIN`), then
/// `landlock_restrict_self`. Both steps must succeed for the sandbox to be
/// considered installed.
pub(crate) fn restrict_self_in_child(ruleset: PreparedRuleset) -> std::result::Result<(), String> {
    if unsafe { libc::prctl(libc::PR_SET_NO_NEW_PRIVS, 1, 0, 0, 0) } != 0 {
        return Err(format!(
            "prctl(PR_SET_NO_NEW_PRIVS): {}",
            std::io::Error::last_os_error()
        ));
    }
    ruleset.restrict_self()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abi_number_is_monotonic() {
        assert!(abi_number(ABI::V1) < abi_number(ABI::V2));
        assert!(abi_number(ABI::V4) < abi_number(ABI::V5));
    }
}
