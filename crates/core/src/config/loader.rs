use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use std::path::Path;

use super::{types::Config, ConfigError};

/// Load configuration from file with environment variable overrides.
///
/// Nested keys use a double underscore, e.g. `NEWSSTAND_LOCK__TTL_SECS=7200`.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    let config: Config = Figment::new()
        .merge(Toml::file(path))
        .merge(Env::prefixed("NEWSSTAND_").split("__"))
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))?;

    Ok(config)
}

/// Load configuration from TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SourceKind, StoreBackend};
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config_from_str_valid() {
        let toml = r#"
[lock]
ttl_secs = 900

[[sources]]
id = "etemad"
kind = "http_document"
url = "https://example.com/{date}.pdf"
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.lock.ttl_secs, 900);
        assert_eq!(config.sources.len(), 1);
    }

    #[test]
    fn test_load_config_from_str_missing_sources() {
        let toml = r#"
[lock]
ttl_secs = 900
"#;
        let result = load_config_from_str(toml);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config(Path::new("/nonexistent/config.toml"));
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }

    #[test]
    fn test_load_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[store]
backend = "sqlite"
path = "/var/lib/newsstand/store.db"

[dedup]
retention_days = 5

[[sources]]
id = "pishkhan"
kind = "manifest"
manifest_url = "https://example.com/today.json"
"#
        )
        .unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(config.store.backend, StoreBackend::Sqlite);
        assert_eq!(config.dedup.retention_days, 5);
        assert!(matches!(config.sources[0].kind, SourceKind::Manifest(_)));
    }
}
