// backuptool/src/config/mod.rs
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::artifact;
use crate::errors::ConfigError;
use crate::retention::RetentionPolicy;

const DEFAULT_DB_HOST: &str = "localhost";
const DEFAULT_DB_PORT: u16 = 3306;
const DEFAULT_BACKUP_DIR: &str = "./backups";
const DEFAULT_MAX_BACKUPS: usize = 7;
const DEFAULT_RETENTION_DAYS: u32 = 30;
const DEFAULT_DUMP_TIMEOUT_SECS: u64 = 900;
const DEFAULT_UPLOAD_TIMEOUT_SECS: u64 = 600;

/// Connection parameters for the database under backup.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub name: String,
}

/// Addressing and credentials for the S3-compatible remote store.
///
/// Credentials are carried opaquely to the store constructor; nothing
/// else in the pipeline inspects them.
#[derive(Debug, Clone)]
pub struct RemoteStoreConfig {
    pub bucket: String,
    pub region: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    /// Custom endpoint for S3-compatible services (DigitalOcean Spaces,
    /// MinIO). None means stock AWS.
    pub endpoint_url: Option<String>,
    /// Folder-like prefix inside the bucket. Empty means bucket root.
    pub location: String,
}

/// Everything one backup run needs, resolved before any stage starts.
///
/// Constructed once per run and passed by reference into each
/// component; there are no process-wide singletons.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub backup_dir: PathBuf,
    pub remote: RemoteStoreConfig,
    pub retention: RetentionPolicy,
    pub dump_timeout: Duration,
    pub upload_timeout: Duration,
}

impl AppConfig {
    /// Loads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Loads configuration through an arbitrary lookup so tests never
    /// have to mutate the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let name = require(&lookup, "DB_NAME")?;
        artifact::validate_database_name(&name).map_err(|reason| ConfigError::Invalid {
            name: "DB_NAME",
            reason,
        })?;

        let database = DatabaseConfig {
            host: lookup("DB_HOST")
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| DEFAULT_DB_HOST.to_string()),
            port: parse_or(&lookup, "DB_PORT", DEFAULT_DB_PORT)?,
            user: require(&lookup, "DB_USER")?,
            password: require(&lookup, "DB_PASS")?,
            name,
        };

        let remote = RemoteStoreConfig {
            bucket: require(&lookup, "S3_BUCKET")?,
            region: require(&lookup, "S3_REGION")?,
            access_key_id: require(&lookup, "S3_ACCESS_KEY_ID")?,
            secret_access_key: require(&lookup, "S3_SECRET_ACCESS_KEY")?,
            endpoint_url: lookup("S3_ENDPOINT_URL").filter(|v| !v.is_empty()),
            location: lookup("S3_FOLDER_PREFIX").unwrap_or_default(),
        };

        let max_count = parse_or(&lookup, "MAX_BACKUPS_TO_KEEP", DEFAULT_MAX_BACKUPS)?;
        if max_count == 0 {
            return Err(ConfigError::Invalid {
                name: "MAX_BACKUPS_TO_KEEP",
                reason: "keeping zero backups would evict every artifact; set at least 1"
                    .to_string(),
            });
        }
        let retention = RetentionPolicy {
            max_count,
            max_age_days: parse_or(&lookup, "BACKUP_RETENTION_DAYS", DEFAULT_RETENTION_DAYS)?,
        };

        Ok(AppConfig {
            database,
            backup_dir: PathBuf::from(
                lookup("BACKUP_LOCAL_DIR")
                    .filter(|v| !v.is_empty())
                    .unwrap_or_else(|| DEFAULT_BACKUP_DIR.to_string()),
            ),
            remote,
            retention,
            dump_timeout: Duration::from_secs(parse_or(
                &lookup,
                "DUMP_TIMEOUT_SECS",
                DEFAULT_DUMP_TIMEOUT_SECS,
            )?),
            upload_timeout: Duration::from_secs(parse_or(
                &lookup,
                "UPLOAD_TIMEOUT_SECS",
                DEFAULT_UPLOAD_TIMEOUT_SECS,
            )?),
        })
    }
}

fn require<F>(lookup: &F, key: &'static str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::Missing(key))
}

fn parse_or<T, F>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => {
            raw.trim().parse().map_err(|e| ConfigError::Invalid {
                name: key,
                reason: format!("{raw:?} could not be parsed: {e}"),
            })
        }
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn base_vars() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("DB_USER", "backup"),
            ("DB_PASS", "secret"),
            ("DB_NAME", "shop"),
            ("S3_BUCKET", "backups"),
            ("S3_REGION", "us-east-1"),
            ("S3_ACCESS_KEY_ID", "key"),
            ("S3_SECRET_ACCESS_KEY", "secret"),
        ])
    }

    fn load(vars: &HashMap<&'static str, &'static str>) -> Result<AppConfig, ConfigError> {
        AppConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string()))
    }

    #[test]
    fn applies_documented_defaults() {
        let config = load(&base_vars()).unwrap();
        assert_eq!(config.database.host, "localhost");
        assert_eq!(config.database.port, 3306);
        assert_eq!(config.backup_dir, PathBuf::from("./backups"));
        assert_eq!(config.retention.max_count, 7);
        assert_eq!(config.retention.max_age_days, 30);
        assert_eq!(config.dump_timeout, Duration::from_secs(900));
        assert_eq!(config.upload_timeout, Duration::from_secs(600));
        assert!(config.remote.endpoint_url.is_none());
        assert_eq!(config.remote.location, "");
    }

    #[test]
    fn missing_database_name_fails_before_any_stage() {
        let mut vars = base_vars();
        vars.remove("DB_NAME");
        match load(&vars) {
            Err(ConfigError::Missing(name)) => assert_eq!(name, "DB_NAME"),
            other => panic!("expected missing DB_NAME, got {other:?}"),
        }
    }

    #[test]
    fn missing_credentials_fail_fast() {
        for key in ["DB_USER", "DB_PASS", "S3_BUCKET", "S3_SECRET_ACCESS_KEY"] {
            let mut vars = base_vars();
            vars.remove(key);
            assert!(
                matches!(load(&vars), Err(ConfigError::Missing(missing)) if missing == key),
                "expected {key} to be required"
            );
        }
    }

    #[test]
    fn rejects_ambiguous_database_names() {
        let mut vars = base_vars();
        vars.insert("DB_NAME", "shop_backup_old");
        assert!(matches!(
            load(&vars),
            Err(ConfigError::Invalid {
                name: "DB_NAME",
                ..
            })
        ));
    }

    #[test]
    fn keeping_zero_backups_is_a_misconfiguration() {
        let mut vars = base_vars();
        vars.insert("MAX_BACKUPS_TO_KEEP", "0");
        assert!(matches!(
            load(&vars),
            Err(ConfigError::Invalid {
                name: "MAX_BACKUPS_TO_KEEP",
                ..
            })
        ));
    }

    #[test]
    fn zero_retention_days_disables_age_eviction() {
        let mut vars = base_vars();
        vars.insert("BACKUP_RETENTION_DAYS", "0");
        assert_eq!(load(&vars).unwrap().retention.max_age_days, 0);
    }

    #[test]
    fn rejects_unparseable_numbers() {
        let mut vars = base_vars();
        vars.insert("DB_PORT", "not-a-port");
        assert!(matches!(
            load(&vars),
            Err(ConfigError::Invalid {
                name: "DB_PORT",
                ..
            })
        ));
    }

    #[test]
    fn reads_explicit_overrides() {
        let mut vars = base_vars();
        vars.extend([
            ("DB_HOST", "db.internal"),
            ("DB_PORT", "3307"),
            ("BACKUP_LOCAL_DIR", "/var/backups/shop"),
            ("S3_ENDPOINT_URL", "https://nyc3.digitaloceanspaces.com"),
            ("S3_FOLDER_PREFIX", "prod/backups"),
            ("MAX_BACKUPS_TO_KEEP", "14"),
        ]);
        let config = load(&vars).unwrap();
        assert_eq!(config.database.host, "db.internal");
        assert_eq!(config.database.port, 3307);
        assert_eq!(config.backup_dir, PathBuf::from("/var/backups/shop"));
        assert_eq!(
            config.remote.endpoint_url.as_deref(),
            Some("https://nyc3.digitaloceanspaces.com")
        );
        assert_eq!(config.remote.location, "prod/backups");
        assert_eq!(config.retention.max_count, 14);
    }
}
