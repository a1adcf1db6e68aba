use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Clone, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    Local,
    Memory,
}

fn default_storage_kind() -> StorageKind {
    StorageKind::Local
}

#[derive(Clone, Deserialize, Debug)]
pub struct AppConfig {
    pub openai_api_key: String,
    #[serde(default = "default_base_url")]
    pub openai_base_url: String,
    #[serde(default = "default_primary_model")]
    pub primary_model: String,
    #[serde(default = "default_backup_model")]
    pub backup_model: String,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_storage_kind")]
    pub storage: StorageKind,
    pub http_port: u16,
    /// Shared key checked by the API auth middleware. `None` leaves the
    /// chat endpoint open, which is only sensible for local development.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_max_concurrent_fetches")]
    pub max_concurrent_fetches: usize,
    #[serde(default = "default_index_ttl_secs")]
    pub index_ttl_secs: u64,
    #[serde(default = "default_fetch_cache_ttl_secs")]
    pub fetch_cache_ttl_secs: u64,
    /// Directory that mirrors downloaded documents between fetch batches.
    /// Cleared at the start of every batch; disabled when unset.
    #[serde(default)]
    pub scratch_dir: Option<String>,
}

fn default_data_dir() -> String {
    "./data".to_string()
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_primary_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_backup_model() -> String {
    "gpt-4.1-mini".to_string()
}

fn default_max_concurrent_fetches() -> usize {
    10
}

fn default_index_ttl_secs() -> u64 {
    3600
}

fn default_fetch_cache_ttl_secs() -> u64 {
    3600
}

pub fn get_config() -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::with_name("config").required(false))
        .add_source(Environment::default())
        .build()?;

    config.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_optional_fields() {
        let config = Config::builder()
            .set_override("openai_api_key", "test")
            .expect("override api key")
            .set_override("http_port", 3000)
            .expect("override port")
            .build()
            .expect("build config");

        let app_config: AppConfig = config.try_deserialize().expect("deserialize config");

        assert_eq!(app_config.storage, StorageKind::Local);
        assert_eq!(app_config.max_concurrent_fetches, 10);
        assert_eq!(app_config.index_ttl_secs, 3600);
        assert!(app_config.api_key.is_none());
        assert!(app_config.scratch_dir.is_none());
        assert_eq!(app_config.primary_model, "gpt-4o-mini");
    }
}
