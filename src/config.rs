//! Configuration for lifelog-sync.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (LIMITLESS_API_KEY, GITHUB_TOKEN, GITHUB_USERNAME,
//!    TIMEZONE, LIFELOG_REPO_PATH)
//! 2. Config file (.lifelog-sync/config.yaml)
//! 3. Defaults
//!
//! Config file discovery:
//! - Searches current directory and parents for .lifelog-sync/config.yaml
//! - Paths in config file are relative to the config file's parent directory
//!
//! The resolved [`Config`] is built once at startup and passed by reference
//! into every component; nothing reads the environment after load.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::NaiveTime;
use serde::Deserialize;
use tracing::warn;

/// Placeholder values shipped as defaults; real deployments must override.
pub const PLACEHOLDER_API_KEY: &str = "your-api-key-here";
pub const PLACEHOLDER_GITHUB_TOKEN: &str = "your-github-token-here";

const DEFAULT_BASE_URL: &str = "https://api.limitless.ai/v1";
const DEFAULT_REPO_NAME: &str = "limitless-notes";
const DEFAULT_DAILY_AT: &str = "23:00";

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub repo: RepoConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub import: ImportConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProviderConfig {
    pub base_url: Option<String>,
    pub auth: Option<AuthScheme>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RepoConfig {
    pub name: Option<String>,
    /// Working copy location (relative to the config file's parent)
    pub path: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScheduleConfig {
    /// Daily sync time, "HH:MM" local
    pub daily_at: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImportConfig {
    pub workers: Option<usize>,
}

/// How the provider expects the API key to be presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthScheme {
    /// `X-API-Key: <key>` header
    ApiKey,
    /// `Authorization: Bearer <key>` header
    Bearer,
}

/// Resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Limitless API key
    pub api_key: String,
    /// GitHub access token (embedded in the clone URL)
    pub github_token: String,
    /// GitHub account owning the notes repository
    pub github_username: String,
    /// Timezone label carried for note metadata (dates use the local clock)
    pub timezone: String,
    /// Notes repository name
    pub repo_name: String,
    /// Absolute path to the local working copy
    pub repo_path: PathBuf,
    /// Provider API base URL
    pub base_url: String,
    /// Auth header variant
    pub auth: AuthScheme,
    /// Local time of the scheduled daily sync
    pub daily_at: NaiveTime,
    /// Worker pool size for parallel imports
    pub workers: usize,
    /// Per-request timeout
    pub request_timeout: Duration,
    /// Cooldown before retrying a rate-limited request
    pub rate_limit_cooldown: Duration,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
}

impl Config {
    /// Load configuration from all sources.
    pub fn load() -> Result<Self> {
        let config_file = find_config_file();
        let file = match &config_file {
            Some(path) => load_config_file(path)?,
            None => ConfigFile::default(),
        };

        let api_key = env_or("LIMITLESS_API_KEY", PLACEHOLDER_API_KEY);
        let github_token = env_or("GITHUB_TOKEN", PLACEHOLDER_GITHUB_TOKEN);
        let github_username = env_or("GITHUB_USERNAME", "HR-AR");
        let timezone = env_or("TIMEZONE", "America/Los_Angeles");

        if api_key == PLACEHOLDER_API_KEY {
            warn!("LIMITLESS_API_KEY not set, using placeholder (API calls will fail)");
        }
        if github_token == PLACEHOLDER_GITHUB_TOKEN {
            warn!("GITHUB_TOKEN not set, using placeholder (push will fail)");
        }

        let repo_name = file
            .repo
            .name
            .clone()
            .unwrap_or_else(|| DEFAULT_REPO_NAME.to_string());

        let repo_path = if let Ok(env_path) = std::env::var("LIFELOG_REPO_PATH") {
            PathBuf::from(env_path)
        } else if let Some(ref path_str) = file.repo.path {
            let base = config_file
                .as_deref()
                .and_then(Path::parent)
                .and_then(Path::parent)
                .unwrap_or(Path::new("."));
            resolve_path(base, path_str)
        } else {
            dirs::home_dir()
                .context("Failed to determine home directory")?
                .join("Documents")
                .join(&repo_name)
        };

        let daily_at_str = file
            .schedule
            .daily_at
            .as_deref()
            .unwrap_or(DEFAULT_DAILY_AT);
        let daily_at = NaiveTime::parse_from_str(daily_at_str, "%H:%M")
            .with_context(|| format!("Invalid schedule.daily_at value: {}", daily_at_str))?;

        Ok(Self {
            api_key,
            github_token,
            github_username,
            timezone,
            repo_name,
            repo_path,
            base_url: file
                .provider
                .base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            auth: file.provider.auth.unwrap_or(AuthScheme::ApiKey),
            daily_at,
            workers: file.import.workers.unwrap_or(3),
            request_timeout: Duration::from_secs(30),
            rate_limit_cooldown: Duration::from_secs(60),
            config_file,
        })
    }

    /// Token-authenticated HTTPS clone URL for the notes repository.
    pub fn clone_url(&self) -> String {
        format!(
            "https://{}@github.com/{}/{}.git",
            self.github_token, self.github_username, self.repo_name
        )
    }

    /// Location of the persisted failure list, inside the working copy.
    pub fn failed_imports_path(&self) -> PathBuf {
        self.repo_path.join("failed_imports.txt")
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(".lifelog-sync").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to the config file's parent
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
            .canonicalize()
            .unwrap_or_else(|_| base.join(path_str))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn test_config(repo_path: PathBuf) -> Config {
        Config {
            api_key: "test-key".into(),
            github_token: "tok123".into(),
            github_username: "someone".into(),
            timezone: "UTC".into(),
            repo_name: "limitless-notes".into(),
            repo_path,
            base_url: DEFAULT_BASE_URL.into(),
            auth: AuthScheme::ApiKey,
            daily_at: NaiveTime::from_hms_opt(23, 0, 0).unwrap(),
            workers: 3,
            request_timeout: Duration::from_secs(30),
            rate_limit_cooldown: Duration::from_millis(1),
            config_file: None,
        }
    }

    #[test]
    fn test_config_file_parsing() {
        let temp = TempDir::new().unwrap();
        let cfg_dir = temp.path().join(".lifelog-sync");
        std::fs::create_dir_all(&cfg_dir).unwrap();

        let config_path = cfg_dir.join("config.yaml");
        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(
            file,
            r#"
provider:
  base_url: https://api.example.com/v1
  auth: bearer
repo:
  name: my-notes
  path: ../notes
schedule:
  daily_at: "22:30"
import:
  workers: 5
"#
        )
        .unwrap();

        let config = load_config_file(&config_path).unwrap();
        assert_eq!(
            config.provider.base_url.as_deref(),
            Some("https://api.example.com/v1")
        );
        assert_eq!(config.provider.auth, Some(AuthScheme::Bearer));
        assert_eq!(config.repo.name.as_deref(), Some("my-notes"));
        assert_eq!(config.schedule.daily_at.as_deref(), Some("22:30"));
        assert_eq!(config.import.workers, Some(5));
    }

    #[test]
    fn test_clone_url_embeds_token() {
        let config = test_config(PathBuf::from("/tmp/notes"));

        assert_eq!(
            config.clone_url(),
            "https://tok123@github.com/someone/limitless-notes.git"
        );
        assert_eq!(
            config.failed_imports_path(),
            PathBuf::from("/tmp/notes/failed_imports.txt")
        );
    }

    #[test]
    fn test_resolve_relative_path() {
        let base = PathBuf::from("/home/user/project");

        assert_eq!(
            resolve_path(&base, "/absolute/path"),
            PathBuf::from("/absolute/path")
        );
        assert_eq!(
            resolve_path(&base, "../notes"),
            PathBuf::from("/home/user/project/../notes")
        );
    }
}
