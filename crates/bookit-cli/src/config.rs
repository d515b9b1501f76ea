//! Runtime configuration.
//!
//! Read from `config/default.toml`, then overridden by `BOOKIT_*`
//! environment variables. A missing file means built-in defaults; a file
//! that does not parse is an error.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use bookit_session::{CacheWritePolicy, SessionConfig};
use serde::Deserialize;
use tracing::{debug, info};

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BookitConfig {
    pub data_dir: PathBuf,
    /// Tracing filter used when `RUST_LOG` is unset.
    pub log_level: String,
    pub catalogue_path: Option<PathBuf>,
    pub remote: RemoteConfig,
    pub session: SessionConfig,
}

impl Default for BookitConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            log_level: "warn".to_string(),
            catalogue_path: None,
            remote: RemoteConfig::default(),
            session: SessionConfig::default(),
        }
    }
}

/// Which record store backs the accounts.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum RemoteConfig {
    /// SQLite file, `data_dir/records.db` unless `path` is set.
    Sqlite { path: Option<PathBuf> },
    Firestore {
        project_id: String,
        api_key: Option<String>,
        base_url: Option<String>,
    },
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self::Sqlite { path: None }
    }
}

impl BookitConfig {
    /// Load `path` (if present) and apply environment overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let mut config = Self::from_file(path.as_ref())?;
        config.apply_overrides(|name| std::env::var(name).ok().filter(|v| !v.is_empty()))?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config = Self::from_toml(&content)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        info!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Apply `BOOKIT_*` overrides. `lookup` returns a variable's value, or
    /// `None` when it is unset or empty.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(dir) = lookup("BOOKIT_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(level) = lookup("BOOKIT_LOG_LEVEL") {
            self.log_level = level;
        }
        if let Some(path) = lookup("BOOKIT_CATALOGUE") {
            self.catalogue_path = Some(PathBuf::from(path));
        }

        // A project id selects the Firestore backend.
        if let Some(project_id) = lookup("BOOKIT_FIRESTORE_PROJECT") {
            let (api_key, base_url) = match &self.remote {
                RemoteConfig::Firestore {
                    api_key, base_url, ..
                } => (api_key.clone(), base_url.clone()),
                RemoteConfig::Sqlite { .. } => (None, None),
            };
            self.remote = RemoteConfig::Firestore {
                project_id,
                api_key,
                base_url,
            };
        }
        if let RemoteConfig::Firestore {
            api_key, base_url, ..
        } = &mut self.remote
        {
            if let Some(key) = lookup("BOOKIT_FIRESTORE_API_KEY") {
                *api_key = Some(key);
            }
            if let Some(url) = lookup("BOOKIT_FIRESTORE_URL") {
                *base_url = Some(url);
            }
        }

        if let Some(policy) = lookup("BOOKIT_CACHE_WRITE_POLICY") {
            self.session.cache_write_policy = match policy.as_str() {
                "strict" => CacheWritePolicy::Strict,
                "best_effort" => CacheWritePolicy::BestEffort,
                other => bail!("BOOKIT_CACHE_WRITE_POLICY: unknown policy {other:?}"),
            };
        }
        if let Some(iterations) = lookup("BOOKIT_PASSWORD_ITERATIONS") {
            self.session.password_iterations = iterations
                .parse()
                .with_context(|| format!("BOOKIT_PASSWORD_ITERATIONS: not a number: {iterations:?}"))?;
        }

        Ok(())
    }

    /// Device cache database path.
    pub fn device_db_path(&self) -> PathBuf {
        self.data_dir.join("device.db")
    }

    /// Records database path for the SQLite backend.
    pub fn records_db_path(&self) -> PathBuf {
        match &self.remote {
            RemoteConfig::Sqlite { path: Some(path) } => path.clone(),
            _ => self.data_dir.join("records.db"),
        }
    }
}

// ── tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn empty_file_gives_defaults() {
        let config = BookitConfig::from_toml("").unwrap();
        assert_eq!(config.data_dir, PathBuf::from("data"));
        assert_eq!(config.remote, RemoteConfig::Sqlite { path: None });
        assert_eq!(config.session.cache_key, "user");
        assert_eq!(config.records_db_path(), PathBuf::from("data/records.db"));
    }

    #[test]
    fn shipped_default_toml_parses() {
        let config = BookitConfig::from_toml(include_str!("../config/default.toml")).unwrap();
        assert_eq!(config.log_level, "warn");
        assert_eq!(config.session.cache_write_policy, CacheWritePolicy::Strict);
        assert_eq!(config.session.password_iterations, 600_000);
    }

    #[test]
    fn firestore_section() {
        let config = BookitConfig::from_toml(
            r#"
            [remote]
            backend = "firestore"
            project_id = "bookit-app"
            "#,
        )
        .unwrap();
        assert_eq!(
            config.remote,
            RemoteConfig::Firestore {
                project_id: "bookit-app".into(),
                api_key: None,
                base_url: None,
            }
        );
    }

    #[test]
    fn unknown_backend_rejected() {
        assert!(BookitConfig::from_toml("[remote]\nbackend = \"mongo\"\n").is_err());
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = BookitConfig::from_file(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.log_level, "warn");
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = BookitConfig::default();
        config
            .apply_overrides(env(&[
                ("BOOKIT_DATA_DIR", "/tmp/bookit"),
                ("BOOKIT_FIRESTORE_PROJECT", "proj"),
                ("BOOKIT_FIRESTORE_API_KEY", "k"),
                ("BOOKIT_CACHE_WRITE_POLICY", "best_effort"),
                ("BOOKIT_PASSWORD_ITERATIONS", "1000"),
            ]))
            .unwrap();

        assert_eq!(config.device_db_path(), PathBuf::from("/tmp/bookit/device.db"));
        assert_eq!(
            config.remote,
            RemoteConfig::Firestore {
                project_id: "proj".into(),
                api_key: Some("k".into()),
                base_url: None,
            }
        );
        assert_eq!(config.session.cache_write_policy, CacheWritePolicy::BestEffort);
        assert_eq!(config.session.password_iterations, 1000);
    }

    #[test]
    fn bad_override_values_rejected() {
        let mut config = BookitConfig::default();
        assert!(
            config
                .apply_overrides(env(&[("BOOKIT_CACHE_WRITE_POLICY", "sometimes")]))
                .is_err()
        );
        assert!(
            config
                .apply_overrides(env(&[("BOOKIT_PASSWORD_ITERATIONS", "many")]))
                .is_err()
        );
    }
}
