//! SBPL profile text generation.
//!
//! Built with a plain string buffer, matching the reference
//! implementation's `snprintf`-based approach rather than a compiled
//! template: the profile shape is fixed by the specification and gains
//! nothing from a template engine.

use std::fmt::Write as _;
use std::path::Path;

use crate::policy::Policy;

/// Render the SBPL profile for `policy`.
///
/// Each `read`/`write` path is additionally resolved with `realpath`; if
/// the resolved form differs from the literal path, a second rule is
/// emitted for it. This defends against `/var` vs `/private/var` and
/// symlinked directories resolving outside the literal rule.
pub(crate) fn build_profile(policy: &Policy) -> String {
    let mut profile = String::with_capacity(512);

    profile.push_str(
        "(version 1)\
         (deny default (with no-log))\
         (allow process*)\
         (allow sysctl-read)\
         (allow mach*)\
         (allow ipc*)\
         (allow signal)\
         (allow file-read*)",
    );

    for dir in &policy.read {
        emit_subpath_rule(&mut profile, "file-read*", dir);
    }

    for dir in &policy.write {
        emit_subpath_rule(&mut profile, "file-write*", dir);
    }

    emit_subpath_rule(&mut profile, "file-write*", Path::new("/dev"));

    if policy.network {
        profile.push_str("(allow network*)");
    }

    profile
}

fn emit_subpath_rule(profile: &mut String, action: &str, path: &Path) {
    let escaped = escape_path(path);
    let _ = write!(profile, "(allow {action} (subpath \"{escaped}\"))");

    if let Ok(resolved) = std::fs::canonicalize(path) {
        if resolved != path {
            let escaped_resolved = escape_path(&resolved);
            if escaped_resolved != escaped {
                let _ = write!(profile, "(allow {action} (subpath \"{escaped_resolved}\"))");
            }
        }
    }
}

fn escape_path(path: &Path) -> String {
    path.to_string_lossy()
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
}
