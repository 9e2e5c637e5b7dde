use crate::error::{CrewtrackError, Result};
use crate::types::Collection;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const CREWTRACK_DIR: &str = ".crewtrack";
pub const DATA_DIR: &str = ".crewtrack/data";
pub const CONFIG_FILE: &str = ".crewtrack/config.yaml";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn crewtrack_dir(root: &Path) -> PathBuf {
    root.join(CREWTRACK_DIR)
}

pub fn data_dir(root: &Path) -> PathBuf {
    root.join(DATA_DIR)
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

/// One YAML file per collection, e.g. `.crewtrack/data/auditLog.yaml`.
pub fn collection_path(root: &Path, collection: Collection) -> PathBuf {
    data_dir(root).join(format!("{}.yaml", collection.as_str()))
}

// ---------------------------------------------------------------------------
// Username validation
// ---------------------------------------------------------------------------

static USERNAME_RE: OnceLock<Regex> = OnceLock::new();

fn username_re() -> &'static Regex {
    USERNAME_RE.get_or_init(|| Regex::new(r"^[a-z0-9][a-z0-9_.\-]*$").unwrap())
}

pub fn validate_username(username: &str) -> Result<()> {
    if username.is_empty() || username.len() > 64 || !username_re().is_match(username) {
        return Err(CrewtrackError::Validation(format!(
            "invalid username '{username}': use lowercase letters, digits, '.', '_' or '-'"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_usernames() {
        for name in ["alice", "bob.smith", "x", "dev_2", "a-b"] {
            validate_username(name).unwrap_or_else(|_| panic!("expected valid: {name}"));
        }
    }

    #[test]
    fn invalid_usernames() {
        for name in ["", ".hidden", "has space", "UPPER", "-dash"] {
            assert!(validate_username(name).is_err(), "expected invalid: {name}");
        }
    }

    #[test]
    fn path_helpers() {
        let root = Path::new("/tmp/proj");
        assert_eq!(
            config_path(root),
            PathBuf::from("/tmp/proj/.crewtrack/config.yaml")
        );
        assert_eq!(
            collection_path(root, Collection::AuditLog),
            PathBuf::from("/tmp/proj/.crewtrack/data/auditLog.yaml")
        );
    }
}
