//! Configuration management for workflow-tools
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables (WORKFLOW_TOOLS_*)
//! 3. Config file (~/.config/workflow-tools/config.toml)
//! 4. Default values

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};

use crate::{Error, Result};

/// Directory name used under the platform config and cache dirs
pub const APP_DIR: &str = "workflow-tools";

/// Repository discovery and cache configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReposConfig {
    /// Roots scanned for git repositories, in priority order
    #[serde(deserialize_with = "home_relative_paths")]
    pub scan_paths: Vec<PathBuf>,

    /// How long a discovery cache stays valid
    #[serde(with = "humantime_serde")]
    pub cache_ttl: Duration,

    /// Wall-clock limit for scanning a single root
    #[serde(with = "humantime_serde")]
    pub scan_timeout: Duration,

    /// Override for the cache directory
    #[serde(deserialize_with = "home_relative_path")]
    pub cache_dir: Option<PathBuf>,
}

impl Default for ReposConfig {
    fn default() -> Self {
        Self {
            scan_paths: default_scan_paths(),
            cache_ttl: Duration::from_secs(3600),
            scan_timeout: Duration::from_secs(30),
            cache_dir: None,
        }
    }
}

impl ReposConfig {
    /// Resolved cache directory (`~/.cache/workflow-tools` by default)
    pub fn cache_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.cache_dir {
            return Ok(dir.clone());
        }
        default_cache_dir()
    }
}

/// Worktree command configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WorktreeConfig {
    /// Path to the claude executable launched by `wt claude`
    pub claude_path: String,
}

impl Default for WorktreeConfig {
    fn default() -> Self {
        Self {
            claude_path: "claude".to_string(),
        }
    }
}

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Repository discovery configuration
    pub repos: ReposConfig,

    /// Worktree configuration
    pub worktree: WorktreeConfig,
}

/// Expand a leading `~` to the home directory
pub fn expand_home(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match dirs::home_dir() {
        Some(home) if rest.as_os_str().is_empty() => home,
        Some(home) => home.join(rest),
        None => path.to_path_buf(),
    }
}

fn home_relative_paths<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Vec<PathBuf>, D::Error> {
    let paths = Vec::<PathBuf>::deserialize(deserializer)?;
    Ok(paths.iter().map(|p| expand_home(p)).collect())
}

fn home_relative_path<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Option<PathBuf>, D::Error> {
    let path = Option::<PathBuf>::deserialize(deserializer)?;
    Ok(path.map(|p| expand_home(&p)))
}

fn default_scan_paths() -> Vec<PathBuf> {
    dirs::home_dir()
        .map(|home| vec![home.join("Documents")])
        .unwrap_or_default()
}

/// Get the default cache directory
///
/// Returns `~/.cache/workflow-tools` on Linux
pub fn default_cache_dir() -> Result<PathBuf> {
    let cache_dir = dirs::cache_dir()
        .ok_or_else(|| Error::Config("Could not determine cache directory".to_string()))?;

    Ok(cache_dir.join(APP_DIR))
}

impl Config {
    /// Load configuration from the default config file location
    ///
    /// Returns default config if file doesn't exist
    pub fn load() -> Result<Self> {
        if let Some(path) = Self::default_config_path() {
            if path.exists() {
                return Self::load_from_file(&path);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))
    }

    /// Get the default config file path
    ///
    /// Returns `~/.config/workflow-tools/config.toml` on Unix
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join(APP_DIR).join("config.toml"))
    }

    /// Apply environment variable overrides
    ///
    /// Supported variables:
    /// - WORKFLOW_TOOLS_SCAN_PATHS: colon-separated scan roots
    /// - WORKFLOW_TOOLS_CACHE_TTL: cache TTL in seconds
    /// - WORKFLOW_TOOLS_CLAUDE_PATH: path to claude executable
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(paths) = std::env::var_os("WORKFLOW_TOOLS_SCAN_PATHS") {
            let parsed: Vec<PathBuf> = std::env::split_paths(&paths)
                .filter(|p| !p.as_os_str().is_empty())
                .map(|p| expand_home(&p))
                .collect();
            if !parsed.is_empty() {
                self.repos.scan_paths = parsed;
            }
        }

        if let Ok(ttl) = std::env::var("WORKFLOW_TOOLS_CACHE_TTL") {
            match ttl.trim().parse::<u64>() {
                Ok(secs) => self.repos.cache_ttl = Duration::from_secs(secs),
                Err(_) => tracing::warn!(value = %ttl, "Ignoring invalid WORKFLOW_TOOLS_CACHE_TTL"),
            }
        }

        if let Ok(claude_path) = std::env::var("WORKFLOW_TOOLS_CLAUDE_PATH") {
            self.worktree.claude_path = claude_path;
        }

        self
    }

    /// Apply CLI flag overrides
    pub fn with_cli_overrides(mut self, scan_paths: Vec<PathBuf>) -> Self {
        if !scan_paths.is_empty() {
            self.repos.scan_paths = scan_paths.iter().map(|p| expand_home(p)).collect();
        }
        self
    }

    /// Load configuration with all overrides applied
    ///
    /// Priority: CLI > env > config file > defaults
    pub fn load_with_overrides(scan_paths: Vec<PathBuf>) -> Result<Self> {
        Ok(Self::load()?
            .with_env_overrides()
            .with_cli_overrides(scan_paths))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.repos.cache_ttl, Duration::from_secs(3600));
        assert_eq!(config.repos.scan_timeout, Duration::from_secs(30));
        assert_eq!(config.worktree.claude_path, "claude");
        assert!(config.repos.cache_dir.is_none());
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
[repos]
scan_paths = ["/src", "/work"]
cache_ttl = "10m"
scan_timeout = "15s"

[worktree]
claude_path = "/usr/local/bin/claude"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(
            config.repos.scan_paths,
            vec![PathBuf::from("/src"), PathBuf::from("/work")]
        );
        assert_eq!(config.repos.cache_ttl, Duration::from_secs(600));
        assert_eq!(config.repos.scan_timeout, Duration::from_secs(15));
        assert_eq!(config.worktree.claude_path, "/usr/local/bin/claude");
    }

    #[test]
    fn test_partial_toml() {
        let toml = r#"
[repos]
cache_ttl = "2h"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.repos.cache_ttl, Duration::from_secs(7200));
        // Untouched fields keep their defaults
        assert_eq!(config.repos.scan_timeout, Duration::from_secs(30));
        assert_eq!(config.worktree.claude_path, "claude");
    }

    #[test]
    fn test_tilde_paths_expand() {
        let toml = r#"
[repos]
scan_paths = ["~/code", "/abs", "~other/x"]
cache_dir = "~/.cache/wf"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        if let Some(home) = dirs::home_dir() {
            assert_eq!(
                config.repos.scan_paths,
                vec![home.join("code"), PathBuf::from("/abs"), PathBuf::from("~other/x")]
            );
            assert_eq!(config.repos.cache_dir, Some(home.join(".cache/wf")));
            assert_eq!(expand_home(Path::new("~")), home);
        }
    }

    #[test]
    fn test_load_from_file_reports_bad_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[repos\nbroken").unwrap();
        assert!(matches!(Config::load_from_file(&path), Err(Error::Config(_))));
    }

    #[test]
    fn test_cache_dir_override() {
        let mut config = Config::default();
        config.repos.cache_dir = Some(PathBuf::from("/tmp/wf-cache"));
        assert_eq!(config.repos.cache_dir().unwrap(), PathBuf::from("/tmp/wf-cache"));
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        std::env::set_var("WORKFLOW_TOOLS_SCAN_PATHS", "/a:/b");
        std::env::set_var("WORKFLOW_TOOLS_CACHE_TTL", "42");
        let config = Config::default().with_env_overrides();
        std::env::remove_var("WORKFLOW_TOOLS_SCAN_PATHS");
        std::env::remove_var("WORKFLOW_TOOLS_CACHE_TTL");

        assert_eq!(
            config.repos.scan_paths,
            vec![PathBuf::from("/a"), PathBuf::from("/b")]
        );
        assert_eq!(config.repos.cache_ttl, Duration::from_secs(42));
    }

    #[test]
    fn test_cli_overrides_win() {
        let config = Config::default().with_cli_overrides(vec![PathBuf::from("/cli")]);
        assert_eq!(config.repos.scan_paths, vec![PathBuf::from("/cli")]);

        let untouched = Config::default().with_cli_overrides(Vec::new());
        assert_eq!(untouched.repos.scan_paths, default_scan_paths());
    }
}
