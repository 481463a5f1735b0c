use std::path::Path;

use anyhow::Context as _;

use crate::error::ConfigError;

/// Loads `KEY=value` pairs from an env file, if it exists. Variables already
/// set in the process environment win.
pub fn load_env_file(path: &Path) -> anyhow::Result<bool> {
    if !path.is_file() {
        tracing::debug!(path = %path.display(), "env file not present; using process env");
        return Ok(false);
    }
    dotenvy::from_path(path).with_context(|| format!("load env file: {}", path.display()))?;
    Ok(true)
}

#[derive(Clone, PartialEq)]
pub struct WarehouseConfig {
    pub dbname: String,
    pub user: String,
    pub password: String,
    pub host: String,
    pub port: u16,
}

impl std::fmt::Debug for WarehouseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WarehouseConfig")
            .field("dbname", &self.dbname)
            .field("user", &self.user)
            .field("host", &self.host)
            .field("port", &self.port)
            .finish_non_exhaustive()
    }
}

#[derive(Clone, PartialEq)]
pub struct ObjectStoreConfig {
    pub endpoint: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
    pub bucket: String,
}

impl std::fmt::Debug for ObjectStoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStoreConfig")
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .field("bucket", &self.bucket)
            .finish_non_exhaustive()
    }
}

#[derive(Clone, PartialEq)]
pub struct EnvConfig {
    pub warehouse: WarehouseConfig,
    pub object_store: ObjectStoreConfig,
    pub pii_salt: String,
}

impl std::fmt::Debug for EnvConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvConfig")
            .field("warehouse", &self.warehouse)
            .field("object_store", &self.object_store)
            .finish_non_exhaustive()
    }
}

impl EnvConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str, default: &str| {
            lookup(name)
                .map(|v| v.trim().to_owned())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_owned())
        };

        let port_raw = get("DB_PORT", "5432");
        let port = port_raw.parse::<u16>().map_err(|err| ConfigError::Invalid {
            name: "DB_PORT",
            value: port_raw.clone(),
            reason: err.to_string(),
        })?;

        Ok(Self {
            warehouse: WarehouseConfig {
                dbname: get("DB_NAME", "db_ecf1"),
                user: get("DB_USER", "admin"),
                password: get("DB_PASSWORD", "admin"),
                host: get("DB_HOST", "db"),
                port,
            },
            object_store: ObjectStoreConfig {
                endpoint: get("S3_ENDPOINT", "http://minio:9000"),
                access_key: get("S3_ACCESS_KEY", "minioadmin"),
                secret_key: get("S3_SECRET_KEY", "minioadmin"),
                region: get("S3_REGION", "us-east-1"),
                bucket: get("S3_BUCKET", "images"),
            },
            pii_salt: get("PII_SALT", "change_me"),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = EnvConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.warehouse.dbname, "db_ecf1");
        assert_eq!(config.warehouse.host, "db");
        assert_eq!(config.warehouse.port, 5432);
        assert_eq!(config.object_store.endpoint, "http://minio:9000");
        assert_eq!(config.object_store.bucket, "images");
        assert_eq!(config.pii_salt, "change_me");
    }

    #[test]
    fn env_values_override_defaults() {
        let config = EnvConfig::from_lookup(lookup_from(&[
            ("DB_HOST", " localhost "),
            ("DB_PORT", "6543"),
            ("S3_BUCKET", "covers"),
            ("PII_SALT", "pepper"),
        ]))
        .unwrap();
        assert_eq!(config.warehouse.host, "localhost");
        assert_eq!(config.warehouse.port, 6543);
        assert_eq!(config.object_store.bucket, "covers");
        assert_eq!(config.pii_salt, "pepper");
    }

    #[test]
    fn invalid_port_is_rejected() {
        let err = EnvConfig::from_lookup(lookup_from(&[("DB_PORT", "postgres")]))
            .unwrap_err()
            .to_string();
        assert!(err.contains("DB_PORT"));
    }

    #[test]
    fn debug_output_hides_secrets() {
        let config = EnvConfig::from_lookup(lookup_from(&[
            ("DB_PASSWORD", "hunter2"),
            ("S3_SECRET_KEY", "s3cr3t"),
        ]))
        .unwrap();
        let debug = format!("{:?}", config.warehouse) + &format!("{:?}", config.object_store);
        assert!(!debug.contains("hunter2"));
        assert!(!debug.contains("s3cr3t"));
    }
}
