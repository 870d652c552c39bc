use crate::error::PersistError;
use crate::registry::Webhook;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::time::Duration;

const DEFAULT_INTERVAL: Duration = Duration::from_secs(5); // Provider listing refresh, 5 seconds

/// Top-level keys written to and read from the config file.
const KEYS: [&str; 6] = ["interval", "api_key", "content", "provider", "delivery", "webhooks"];

/// Per-key load or save failures, keyed by config key.
pub type KeyErrors = BTreeMap<String, String>;

// Parses a duration string (e.g., "5s", "1m") into a `tokio::time::Duration`.
// Used for deserializing duration values from the config file.
fn parse_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    humantime::parse_duration(&s).map_err(serde::de::Error::custom)
}

// Writes a duration back out in the same humantime form it is read in.
fn format_duration<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(&humantime::format_duration(*duration).to_string())
}

fn parse_interval(s: &str) -> Result<Duration, String> {
    let interval = humantime::parse_duration(s).map_err(|e| e.to_string())?;
    if interval.is_zero() {
        return Err("interval must be greater than zero".to_string());
    }
    Ok(interval)
}

/// Attack provider client settings.
/// Corresponds to the [provider] section in the TOML config file.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ProviderConfig {
    #[serde(default = "ProviderConfig::default_base_url")]
    pub base_url: String,

    #[serde(
        default = "ProviderConfig::default_timeout",
        deserialize_with = "parse_duration",
        serialize_with = "format_duration"
    )]
    pub timeout: Duration,
}

impl ProviderConfig {
    fn default_base_url() -> String {
        "https://api.royalehosting.net/v1".to_string()
    }

    fn default_timeout() -> Duration {
        Duration::from_secs(10)
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: Self::default_base_url(),
            timeout: Self::default_timeout(),
        }
    }
}

/// Webhook delivery settings.
/// Corresponds to the [delivery] section in the TOML config file.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct DeliveryConfig {
    #[serde(default = "DeliveryConfig::default_base_url")]
    pub base_url: String,

    #[serde(
        default = "DeliveryConfig::default_timeout",
        deserialize_with = "parse_duration",
        serialize_with = "format_duration"
    )]
    pub timeout: Duration,

    // Attempts per webhook per message, 1 disables retries.
    #[serde(default = "DeliveryConfig::default_max_attempts")]
    pub max_attempts: u32,

    #[serde(
        default = "DeliveryConfig::default_retry_delay",
        deserialize_with = "parse_duration",
        serialize_with = "format_duration"
    )]
    pub retry_delay: Duration,

    // Number of notification workers.
    #[serde(default = "DeliveryConfig::default_workers")]
    pub workers: usize,
}

impl DeliveryConfig {
    fn default_base_url() -> String {
        "https://discord.com/api".to_string()
    }

    fn default_timeout() -> Duration {
        Duration::from_secs(10)
    }

    fn default_max_attempts() -> u32 {
        1
    }

    fn default_retry_delay() -> Duration {
        Duration::from_secs(1)
    }

    fn default_workers() -> usize {
        4
    }
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            base_url: Self::default_base_url(),
            timeout: Self::default_timeout(),
            max_attempts: Self::default_max_attempts(),
            retry_delay: Self::default_retry_delay(),
            workers: Self::default_workers(),
        }
    }
}

/// Represents the overall application configuration, loaded from a TOML file.
///
/// Every top-level key is bound on its own: a key holding an invalid value is
/// reported and falls back to its default instead of failing the whole file.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub interval: Duration,
    pub api_key: String,
    // Text sent alongside every notification embed, if any.
    pub content: Option<String>,
    pub provider: ProviderConfig,
    pub delivery: DeliveryConfig,
    pub webhooks: Vec<Webhook>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            api_key: String::new(),
            content: None,
            provider: ProviderConfig::default(),
            delivery: DeliveryConfig::default(),
            webhooks: Vec::new(),
        }
    }
}

impl Config {
    // Loads configuration from a TOML file.
    fn load_from_file(config_path: &Path) -> Result<(Self, KeyErrors)> {
        let content = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;
        let table = toml::from_str::<toml::Table>(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;
        Ok(Self::bind(table))
    }

    fn bind(mut table: toml::Table) -> (Self, KeyErrors) {
        let mut errors = KeyErrors::new();
        let defaults = Config::default();

        let interval = bind_value::<String>(&mut table, "interval", &mut errors)
            .and_then(|s| match parse_interval(&s) {
                Ok(interval) => Some(interval),
                Err(e) => {
                    errors.insert("interval".to_string(), e);
                    None
                }
            })
            .unwrap_or(defaults.interval);
        let api_key =
            bind_value::<String>(&mut table, "api_key", &mut errors).unwrap_or(defaults.api_key);
        let content = bind_value::<String>(&mut table, "content", &mut errors)
            .filter(|s| !s.trim().is_empty());
        let provider = bind_value(&mut table, "provider", &mut errors).unwrap_or(defaults.provider);
        let delivery = bind_value(&mut table, "delivery", &mut errors).unwrap_or(defaults.delivery);
        let webhooks =
            bind_value(&mut table, "webhooks", &mut errors).unwrap_or(defaults.webhooks);

        for key in table.keys() {
            tracing::debug!("ignoring unknown config key: {}", key);
        }

        let config = Self {
            interval,
            api_key,
            content,
            provider,
            delivery,
            webhooks,
        };
        (config, errors)
    }

    fn to_table(&self) -> (toml::Table, KeyErrors) {
        let mut table = toml::Table::new();
        let mut errors = KeyErrors::new();

        put_value(
            &mut table,
            "interval",
            &humantime::format_duration(self.interval).to_string(),
            &mut errors,
        );
        put_value(&mut table, "api_key", &self.api_key, &mut errors);
        put_value(
            &mut table,
            "content",
            &self.content.clone().unwrap_or_default(),
            &mut errors,
        );
        put_value(&mut table, "provider", &self.provider, &mut errors);
        put_value(&mut table, "delivery", &self.delivery, &mut errors);
        put_value(&mut table, "webhooks", &self.webhooks, &mut errors);

        (table, errors)
    }

    // Writes every key that serializes; keys that don't are reported.
    fn save_to_file(&self, config_path: &Path) -> Result<(), PersistError> {
        let (table, mut failures) = self.to_table();

        let write_result = toml::to_string(&table)
            .map_err(|e| e.to_string())
            .and_then(|text| std::fs::write(config_path, text).map_err(|e| e.to_string()));
        if let Err(e) = write_result {
            for key in KEYS {
                failures.entry(key.to_string()).or_insert_with(|| e.clone());
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(PersistError { failures })
        }
    }
}

fn bind_value<T: DeserializeOwned>(
    table: &mut toml::Table,
    key: &str,
    errors: &mut KeyErrors,
) -> Option<T> {
    let value = table.remove(key)?;
    match value.try_into::<T>() {
        Ok(v) => Some(v),
        Err(e) => {
            errors.insert(key.to_string(), e.to_string());
            None
        }
    }
}

fn put_value<T: Serialize>(table: &mut toml::Table, key: &str, value: &T, errors: &mut KeyErrors) {
    match toml::Value::try_from(value) {
        Ok(v) => {
            table.insert(key.to_string(), v);
        }
        Err(e) => {
            errors.insert(key.to_string(), e.to_string());
        }
    }
}

/// File-backed config persistence.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the config file, writing a default one first if it does not exist.
    pub fn load_or_create(&self) -> Result<(Config, KeyErrors)> {
        if !self.path.exists() {
            tracing::warn!(
                "Config file {} not found, writing defaults",
                self.path.display()
            );
            let config = Config::default();
            if let Err(e) = self.save(&config) {
                log_key_errors("save", &e.failures);
            }
            return Ok((config, KeyErrors::new()));
        }
        Config::load_from_file(&self.path)
    }

    pub fn save(&self, config: &Config) -> Result<(), PersistError> {
        config.save_to_file(&self.path)
    }
}

/// Logs every key that failed to load or save, one warning per key.
pub fn log_key_errors(action: &str, errors: &KeyErrors) {
    if errors.is_empty() {
        return;
    }

    tracing::warn!("Config file failed to {} {} keys.", action, errors.len());
    for (key, error) in errors {
        tracing::warn!("{}: {}", key, error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;
    use tempfile::NamedTempFile;

    // Helper function to create a temporary config file with given content.
    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("Failed to create temp file");
        file.write_all(content.as_bytes())
            .expect("Failed to write to temp file");
        file
    }

    #[test]
    fn test_load_valid_config() {
        let config_content = r#"
interval = "10s"
api_key = "secret"
content = "@here"

[provider]
base_url = "http://provider.local"
timeout = "3s"

[delivery]
max_attempts = 3
workers = 2

[[webhooks]]
token = "tok1"
id = 5
"#;
        let temp_file = create_temp_config(config_content);

        let (config, errors) = Config::load_from_file(temp_file.path()).unwrap();

        assert!(errors.is_empty());
        assert_eq!(config.interval, Duration::from_secs(10));
        assert_eq!(config.api_key, "secret");
        assert_eq!(config.content.as_deref(), Some("@here"));
        assert_eq!(config.provider.base_url, "http://provider.local");
        assert_eq!(config.provider.timeout, Duration::from_secs(3));
        assert_eq!(config.delivery.max_attempts, 3);
        assert_eq!(config.delivery.workers, 2);
        assert_eq!(config.delivery.timeout, DeliveryConfig::default_timeout());
        assert_eq!(
            config.webhooks,
            vec![Webhook {
                token: "tok1".to_string(),
                id: 5
            }]
        );
    }

    #[test]
    fn test_load_empty_config_uses_defaults() {
        let temp_file = create_temp_config("");

        let (config, errors) = Config::load_from_file(temp_file.path()).unwrap();

        assert!(errors.is_empty());
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_blank_content_is_none() {
        let temp_file = create_temp_config("content = \"   \"\n");

        let (config, _) = Config::load_from_file(temp_file.path()).unwrap();

        assert_eq!(config.content, None);
    }

    #[test]
    fn test_load_invalid_toml() {
        let config_content = r#"
[provider
timeout = "10s" # Missing closing bracket
"#;
        let temp_file = create_temp_config(config_content);

        let err = Config::load_from_file(temp_file.path()).unwrap_err();

        // Check that the error is caused by toml parse error
        let found = err.chain().any(|e| e.is::<toml::de::Error>());
        assert!(found, "Error should be toml::de::Error");
    }

    #[test]
    fn test_load_non_existent_file() {
        let config_path = PathBuf::from("non_existent_config_file.toml");

        let err = Config::load_from_file(&config_path).unwrap_err();

        let io_err = err
            .downcast_ref::<std::io::Error>()
            .expect("Error should be std::io::Error");
        assert_eq!(io_err.kind(), std::io::ErrorKind::NotFound);
    }

    #[test]
    fn test_invalid_interval_falls_back_to_default() {
        let config_content = r#"
interval = "5xyz" # Invalid duration format
api_key = "kept"
"#;
        let temp_file = create_temp_config(config_content);

        let (config, errors) = Config::load_from_file(temp_file.path()).unwrap();

        assert_eq!(config.interval, DEFAULT_INTERVAL);
        assert_eq!(config.api_key, "kept");
        assert_eq!(errors.keys().collect::<Vec<_>>(), vec!["interval"]);
    }

    #[test]
    fn test_zero_interval_is_rejected() {
        let temp_file = create_temp_config("interval = \"0s\"\n");

        let (config, errors) = Config::load_from_file(temp_file.path()).unwrap();

        assert_eq!(config.interval, DEFAULT_INTERVAL);
        assert!(errors["interval"].contains("greater than zero"));
    }

    #[test]
    fn test_load_config_with_wrong_type() {
        let config_content = r#"
[delivery]
workers = "not a number"

[[webhooks]]
token = "tok1"
id = 1
"#;
        let temp_file = create_temp_config(config_content);

        let (config, errors) = Config::load_from_file(temp_file.path()).unwrap();

        assert!(errors.contains_key("delivery"));
        assert_eq!(config.delivery, DeliveryConfig::default());
        assert_eq!(config.webhooks.len(), 1);
    }

    #[test]
    fn test_save_then_load_preserves_values() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("shieldwatch.toml"));
        let config = Config {
            interval: Duration::from_millis(2500),
            api_key: "secret".to_string(),
            content: Some("@everyone".to_string()),
            webhooks: vec![
                Webhook {
                    token: "tok1".to_string(),
                    id: 5,
                },
                Webhook {
                    token: "tok2".to_string(),
                    id: 6,
                },
            ],
            ..Config::default()
        };

        store.save(&config).unwrap();
        let (loaded, errors) = store.load_or_create().unwrap();

        assert!(errors.is_empty());
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_save_failure_reports_every_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("missing").join("shieldwatch.toml"));

        let err = store.save(&Config::default()).unwrap_err();

        assert_eq!(err.failures.len(), KEYS.len());
        assert!(err.failures.contains_key("webhooks"));
    }

    #[test]
    fn test_load_or_create_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shieldwatch.toml");
        let store = ConfigStore::new(&path);

        let (config, errors) = store.load_or_create().unwrap();

        assert!(errors.is_empty());
        assert_eq!(config, Config::default());
        assert!(path.exists());
    }
}
