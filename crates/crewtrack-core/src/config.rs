use crate::error::Result;
use crate::{io, paths};
use serde::{Deserialize, Serialize};
use std::path::Path;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// AuthConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Consecutive failed re-authentications before the account is
    /// rate-limited.
    #[serde(default = "default_max_reauth_attempts")]
    pub max_reauth_attempts: u32,
    /// Minutes a rate-limited account waits before it may try again.
    #[serde(default = "default_lockout_minutes")]
    pub lockout_minutes: u32,
}

fn default_max_reauth_attempts() -> u32 {
    5
}

fn default_lockout_minutes() -> u32 {
    15
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            max_reauth_attempts: default_max_reauth_attempts(),
            lockout_minutes: default_lockout_minutes(),
        }
    }
}

// ---------------------------------------------------------------------------
// HistoryConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    #[serde(default = "default_history_limit")]
    pub default_limit: usize,
}

fn default_history_limit() -> usize {
    50
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            default_limit: default_history_limit(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    pub workspace: String,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub history: HistoryConfig,
}

fn default_version() -> u32 {
    1
}

impl Config {
    pub fn new(workspace: impl Into<String>) -> Self {
        Self {
            version: default_version(),
            workspace: workspace.into(),
            auth: AuthConfig::default(),
            history: HistoryConfig::default(),
        }
    }

    /// Load `.crewtrack/config.yaml`, falling back to defaults when the file
    /// does not exist yet.
    pub fn load(root: &Path) -> Result<Self> {
        if let Some(config) = io::read_yaml(&paths::config_path(root))? {
            return Ok(config);
        }
        let name = root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "crewtrack".to_string());
        Ok(Self::new(name))
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        io::write_yaml(&paths::config_path(root), self)
    }

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();
        if self.auth.max_reauth_attempts == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "auth.max_reauth_attempts is 0: a single wrong password locks the account"
                    .to_string(),
            });
        }
        if self.auth.lockout_minutes == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "auth.lockout_minutes is 0: failed re-authentication is never rate-limited"
                    .to_string(),
            });
        }
        if self.history.default_limit == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "history.default_limit is 0: history listings will be empty".to_string(),
            });
        }
        if self.workspace.trim().is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "workspace name is empty".to_string(),
            });
        }
        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn config_roundtrip() {
        let dir = TempDir::new().unwrap();
        let mut cfg = Config::new("acme");
        cfg.auth.max_reauth_attempts = 3;
        cfg.save(dir.path()).unwrap();

        let loaded = Config::load(dir.path()).unwrap();
        assert_eq!(loaded.workspace, "acme");
        assert_eq!(loaded.auth.max_reauth_attempts, 3);
        assert_eq!(loaded.history.default_limit, 50);
    }

    #[test]
    fn missing_sections_use_defaults() {
        let cfg: Config = serde_yaml::from_str("workspace: acme\n").unwrap();
        assert_eq!(cfg.version, 1);
        assert_eq!(cfg.auth.max_reauth_attempts, 5);
        assert_eq!(cfg.auth.lockout_minutes, 15);
        assert_eq!(cfg.history.default_limit, 50);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        let cfg = Config::load(dir.path()).unwrap();
        assert_eq!(cfg.auth.max_reauth_attempts, 5);
        assert!(!cfg.workspace.is_empty());
    }

    #[test]
    fn zero_attempts_warns() {
        let mut cfg = Config::new("acme");
        cfg.auth.max_reauth_attempts = 0;
        let warnings = cfg.validate();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].level, WarnLevel::Warning);
        assert!(warnings[0].message.contains("max_reauth_attempts"));
    }

    #[test]
    fn zero_lockout_warns() {
        let mut cfg = Config::new("acme");
        cfg.auth.lockout_minutes = 0;
        let warnings = cfg.validate();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].message.contains("lockout_minutes"));
    }
}
