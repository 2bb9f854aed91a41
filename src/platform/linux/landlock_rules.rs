//! Landlock ruleset construction.
//!
//! Builds one [`PreparedRuleset`] per [`spawn`](crate::Sandbox::spawn) call
//! from the ABI negotiated at [`create`](crate::Sandbox::create) time and
//! the policy in effect for this sandbox.

use landlock::{
    ABI, Access, AccessFs, AccessNet, NetPort, PathBeneath, PathFd, Ruleset, RulesetAttr,
    RulesetCreated, RulesetCreatedAttr,
};

use crate::error::{Error, Result};
use crate::policy::Policy;

use super::abi_number;

/// A compiled Landlock ruleset, ready to be installed onto the current
/// process with [`restrict_self`](PreparedRuleset::restrict_self).
pub struct PreparedRuleset {
    inner: RulesetCreated,
}

impl PreparedRuleset {
    /// Apply the ruleset to the current process. Must be called only in the
    /// forked child, before `execve`.
    pub(crate) fn restrict_self(self) -> std::result::Result<(), String> {
        self.inner
            .restrict_self()
            .map(|_status| ())
            .map_err(|e| format!("landlock_restrict_self: {e}"))
    }
}

/// Build a ruleset from `policy`, negotiated against `abi`.
///
/// Order matches the distilled specification exactly:
/// 1. handle the FS mask (and, if network is denied and the ABI supports
///    it, the TCP handled-net bits);
/// 2. baseline `/` rule with the read subset of the FS mask;
/// 3. full access on every `write` directory;
/// 4. full access on `/dev`;
/// 5. read access on every additional `read` directory.
pub(crate) fn build_ruleset(abi: ABI, policy: &Policy) -> Result<PreparedRuleset> {
    let fs_access = AccessFs::from_all(abi);

    let mut ruleset = Ruleset::default()
        .handle_access(fs_access)
        .map_err(|e| Error::RulesetCreate(e.to_string()))?;

    // Handling a right without allowing it is what causes denial; omitting
    // it is what grants unrestricted access. We only handle the TCP rights
    // when network access must be denied.
    if !policy.network && abi_number(abi) >= 4 {
        ruleset = ruleset
            .handle_access(AccessNet::from_all(abi))
            .map_err(|e| Error::RulesetCreate(e.to_string()))?;
    }

    let mut ruleset = ruleset.create().map_err(|e| Error::RulesetCreate(e.to_string()))?;

    // Baseline "read the world" rule. Unconditional and intentional: the
    // `read` scope only ever adds to this, since Landlock's read mask is
    // never narrower than this baseline.
    add_path_rule(&mut ruleset, "/", AccessFs::from_read(abi))?;

    for dir in &policy.write {
        add_path_rule(&mut ruleset, dir, AccessFs::from_all(abi))?;
    }

    add_path_rule(&mut ruleset, "/dev", AccessFs::from_all(abi))?;

    for dir in &policy.read {
        add_path_rule(&mut ruleset, dir, AccessFs::from_read(abi))?;
    }

    Ok(PreparedRuleset { inner: ruleset })
}

fn add_path_rule(
    ruleset: &mut RulesetCreated,
    path: impl AsRef<std::path::Path>,
    access: impl Into<landlock::BitFlags<AccessFs>>,
) -> Result<()> {
    let path = path.as_ref();
    let path_fd = PathFd::new(path).map_err(|e| {
        Error::RulesetAdd(format!("open({}) for path-beneath rule: {e}", path.display()))
    })?;
    ruleset
        .add_rule(PathBeneath::new(path_fd, access))
        .map_err(|e| Error::RulesetAdd(format!("add_rule({}): {e}", path.display())))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_ruleset_with_no_directories() {
        let policy = Policy::default();
        let result = build_ruleset(ABI::V1, &policy);
        assert!(result.is_ok());
    }

    #[test]
    fn rejects_nonexistent_write_dir_at_ruleset_stage() {
        // By the time build_ruleset runs, the path validator should
        // already have rejected nonexistent directories; this exercises
        // the defensive behavior if it is ever called directly.
        let policy = Policy {
            write: vec!["/nonexistent/stevelock/ruleset/path".into()],
            ..Default::default()
        };
        assert!(build_ruleset(ABI::V1, &policy).is_err());
    }
}
