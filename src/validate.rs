use std::fs;
use std::path::Path;

use crate::error::{Error, ScopeKind};
use crate::policy::{Policy, Scope};

/// Verify every path in `scope` exists and is a directory, naming failures
/// by `kind` and index within the scope.
///
/// Runs in the parent, before fork, so a bad path is reportable through the
/// ordinary `Error` channel rather than through the child's exit code.
fn validate_scope(kind: ScopeKind, scope: &Scope) -> Result<(), Error> {
    for (index, path) in scope.iter().enumerate() {
        validate_one(kind, index, path)?;
    }
    Ok(())
}

fn validate_one(kind: ScopeKind, index: usize, path: &Path) -> Result<(), Error> {
    if path.as_os_str().is_empty() {
        return Err(Error::InvalidScope {
            kind,
            index,
            path: path.to_path_buf(),
            detail: "empty path".to_string(),
        });
    }

    let meta = fs::metadata(path).map_err(|e| Error::InvalidScope {
        kind,
        index,
        path: path.to_path_buf(),
        detail: e.to_string(),
    })?;

    if !meta.is_dir() {
        return Err(Error::InvalidScope {
            kind,
            index,
            path: path.to_path_buf(),
            detail: "not a directory".to_string(),
        });
    }

    Ok(())
}

/// Validate both scopes of a policy. Called at the start of every spawn.
pub fn validate_policy(policy: &Policy) -> Result<(), Error> {
    validate_scope(ScopeKind::Read, &policy.read)?;
    validate_scope(ScopeKind::Write, &policy.write)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn rejects_nonexistent_path() {
        let policy = Policy {
            write: vec![PathBuf::from("/nonexistent/stevelock/test/path")],
            ..Default::default()
        };
        let err = validate_policy(&policy).unwrap_err();
        assert_eq!(err.kind_name(), "INVALID_SCOPE");
    }

    #[test]
    fn rejects_file_as_directory() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let policy = Policy {
            read: vec![file.path().to_path_buf()],
            ..Default::default()
        };
        assert!(validate_policy(&policy).is_err());
    }

    #[test]
    fn accepts_existing_directories() {
        let dir = tempfile::tempdir().unwrap();
        let policy = Policy {
            write: vec![dir.path().to_path_buf()],
            ..Default::default()
        };
        assert!(validate_policy(&policy).is_ok());
    }

    #[test]
    fn accepts_empty_scopes() {
        assert!(validate_policy(&Policy::default()).is_ok());
    }
}
