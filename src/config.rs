use crate::error::{Result, StorageError};
use serde::{Deserialize, Serialize};

pub const DEFAULT_STORAGE_NAME: &str = "alioss";
pub const DEFAULT_REGION: &str = "oss-cn-hangzhou";
/// Chunk size in KiB
pub const DEFAULT_CHUNK_SIZE: usize = 5120;
pub const DEFAULT_UPLOAD_CONCURRENCY: usize = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub storage: StorageSettings,
}

impl Config {
    /// Reads the file named by the `CONFIG` env var (default `config.toml`)
    pub fn load() -> Result<Self> {
        dotenvy::from_filename(".env").ok();
        let config_file = dotenvy::var("CONFIG").unwrap_or("config.toml".to_string());
        let content = std::fs::read_to_string(&config_file).map_err(|e| {
            tracing::error!(error = ?e, msg = e.to_string(), config_file);
            StorageError::ConfigError(format!("Unable to read {}: {}", config_file, e))
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let mut config: Config = toml::from_str(content).map_err(|e| {
            tracing::error!(error = ?e, msg = e.to_string());
            StorageError::ConfigError(e.to_string())
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&mut self) -> Result<()> {
        self.storage.validate()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageSettings {
    #[serde(default = "default_name")]
    pub name: String,
    pub bucket: String,
    pub endpoint_url: Option<String>,
    #[serde(default = "default_region")]
    pub region: String,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_upload_concurrency")]
    pub upload_concurrency: usize,
    pub force_path_style: Option<bool>,
}

fn default_name() -> String {
    DEFAULT_STORAGE_NAME.to_string()
}

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_upload_concurrency() -> usize {
    DEFAULT_UPLOAD_CONCURRENCY
}

impl StorageSettings {
    pub fn new(bucket: impl Into<String>) -> Self {
        StorageSettings {
            name: default_name(),
            bucket: bucket.into(),
            endpoint_url: None,
            region: default_region(),
            access_key: None,
            secret_key: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
            upload_concurrency: DEFAULT_UPLOAD_CONCURRENCY,
            force_path_style: None,
        }
    }

    pub fn validate(&mut self) -> Result<()> {
        let StorageSettings {
            bucket,
            endpoint_url,
            access_key,
            secret_key,
            chunk_size,
            upload_concurrency,
            ..
        } = self;

        if bucket.is_empty() {
            return Err(StorageError::ConfigError(
                "bucket cannot be empty".to_string(),
            ));
        }

        if *chunk_size < 1 {
            return Err(StorageError::ConfigError(
                "chunk_size must be at least 1".to_string(),
            ));
        }

        if chunk_size.checked_mul(1024).is_none() {
            return Err(StorageError::ConfigError(format!(
                "chunk_size of {} KiB does not fit into a byte count",
                chunk_size
            )));
        }

        if *upload_concurrency < 1 {
            return Err(StorageError::ConfigError(
                "upload_concurrency must be at least 1".to_string(),
            ));
        }

        if endpoint_url.is_none() {
            *endpoint_url = dotenvy::var("OSS_ENDPOINT").ok();
        }

        if access_key.is_none() {
            let env_var = dotenvy::var("OSS_ACCESS_KEY_ID").map_err(|e| {
                tracing::error!(error = ?e, msg = e.to_string(), "OSS_ACCESS_KEY_ID");
                StorageError::ConfigError(format!("OSS_ACCESS_KEY_ID: {}", e))
            })?;
            *access_key = Some(env_var);
        }

        if secret_key.is_none() {
            let env_var = dotenvy::var("OSS_SECRET_ACCESS_KEY").map_err(|e| {
                tracing::error!(error = ?e, msg = e.to_string(), "OSS_SECRET_ACCESS_KEY");
                StorageError::ConfigError(format!("OSS_SECRET_ACCESS_KEY: {}", e))
            })?;
            *secret_key = Some(env_var);
        }

        Ok(())
    }

    /// Chunk size in bytes, saturates for settings that never went through `validate`
    pub fn chunk_size_bytes(&self) -> usize {
        self.chunk_size.saturating_mul(1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_defaults() {
        let config = Config::from_toml(
            r#"
            [storage]
            bucket = "files"
            access_key = "ak"
            secret_key = "sk"
            endpoint_url = "https://oss-cn-hangzhou.aliyuncs.com"
            "#,
        )
        .unwrap();

        assert_eq!(config.storage.name, DEFAULT_STORAGE_NAME);
        assert_eq!(config.storage.region, DEFAULT_REGION);
        assert_eq!(config.storage.chunk_size_bytes(), 5120 * 1024);
        assert_eq!(config.storage.upload_concurrency, 5);
        assert_eq!(config.storage.force_path_style, None);
    }

    #[test]
    fn test_rejects_invalid_values() {
        let err = Config::from_toml(
            r#"
            [storage]
            bucket = ""
            access_key = "ak"
            secret_key = "sk"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, StorageError::ConfigError(_)));

        let err = Config::from_toml(
            r#"
            [storage]
            bucket = "files"
            chunk_size = 0
            access_key = "ak"
            secret_key = "sk"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, StorageError::ConfigError(_)));

        let err = Config::from_toml(
            r#"
            [storage]
            bucket = "files"
            upload_concurrency = 0
            access_key = "ak"
            secret_key = "sk"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, StorageError::ConfigError(_)));
    }

    #[test]
    fn test_rejects_overflowing_chunk_size() {
        let mut settings = StorageSettings::new("files");
        settings.access_key = Some("ak".to_string());
        settings.secret_key = Some("sk".to_string());
        settings.endpoint_url = Some("http://127.0.0.1:9000".to_string());

        settings.chunk_size = usize::MAX / 1024 + 1;
        let err = settings.validate().unwrap_err();
        assert!(matches!(err, StorageError::ConfigError(_)));
        assert_eq!(settings.chunk_size_bytes(), usize::MAX);

        settings.chunk_size = usize::MAX / 1024;
        settings.validate().unwrap();
        assert_eq!(settings.chunk_size_bytes(), usize::MAX / 1024 * 1024);
    }
}
