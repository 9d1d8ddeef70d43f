use std::collections::HashSet;

use super::{
    types::{Config, SourceKind, StoreBackend},
    ConfigError,
};

/// Validate configuration
/// Currently validates:
/// - At least one source, with unique non-empty ids
/// - Source URLs are set, and `issue_url`/`issue_pattern` come as a pair
/// - Lock TTL and dedup retention are non-zero
/// - Redis backend has a URL, remote store has endpoint and bucket when enabled
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.sources.is_empty() {
        return Err(ConfigError::ValidationError(
            "at least one [[sources]] entry is required".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for source in &config.sources {
        if source.id.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "source id cannot be empty".to_string(),
            ));
        }
        if !seen.insert(source.id.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "duplicate source id: {}",
                source.id
            )));
        }

        match &source.kind {
            SourceKind::HttpDocument(doc) => {
                if doc.url.trim().is_empty() {
                    return Err(ConfigError::ValidationError(format!(
                        "source {}: url cannot be empty",
                        source.id
                    )));
                }
                if doc.issue_url.is_some() != doc.issue_pattern.is_some() {
                    return Err(ConfigError::ValidationError(format!(
                        "source {}: issue_url and issue_pattern must be set together",
                        source.id
                    )));
                }
                if let Some(pattern) = &doc.issue_pattern {
                    regex_lite::Regex::new(pattern).map_err(|e| {
                        ConfigError::ValidationError(format!(
                            "source {}: invalid issue_pattern: {}",
                            source.id, e
                        ))
                    })?;
                }
            }
            SourceKind::Manifest(manifest) => {
                if manifest.manifest_url.trim().is_empty() {
                    return Err(ConfigError::ValidationError(format!(
                        "source {}: manifest_url cannot be empty",
                        source.id
                    )));
                }
            }
        }
    }

    if config.lock.ttl_secs == 0 {
        return Err(ConfigError::ValidationError(
            "lock.ttl_secs cannot be 0".to_string(),
        ));
    }

    if config.dedup.retention_days == 0 {
        return Err(ConfigError::ValidationError(
            "dedup.retention_days cannot be 0".to_string(),
        ));
    }

    if config.store.backend == StoreBackend::Redis
        && config.store.url.as_deref().is_none_or(|u| u.trim().is_empty())
    {
        return Err(ConfigError::ValidationError(
            "store.url is required for the redis backend".to_string(),
        ));
    }

    if config.remote.enabled {
        if config
            .remote
            .endpoint
            .as_deref()
            .is_none_or(|e| e.trim().is_empty())
        {
            return Err(ConfigError::ValidationError(
                "remote.endpoint is required when remote.enabled = true".to_string(),
            ));
        }
        if config.remote.bucket.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "remote.bucket cannot be empty".to_string(),
            ));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_config_from_str;

    fn base_config() -> Config {
        load_config_from_str(
            r#"
[[sources]]
id = "etemad"
kind = "http_document"
url = "https://example.com/{date}.pdf"

[[sources]]
id = "pishkhan"
kind = "manifest"
manifest_url = "https://example.com/manifest.json"
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(validate_config(&base_config()).is_ok());
    }

    #[test]
    fn test_validate_no_sources_fails() {
        let mut config = base_config();
        config.sources.clear();
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_validate_duplicate_source_ids_fail() {
        let mut config = base_config();
        let first = config.sources[0].clone();
        config.sources.push(first);
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("duplicate source id: etemad"));
    }

    #[test]
    fn test_validate_zero_ttl_fails() {
        let mut config = base_config();
        config.lock.ttl_secs = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_zero_retention_fails() {
        let mut config = base_config();
        config.dedup.retention_days = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_remote_without_endpoint_fails() {
        let mut config = base_config();
        config.remote.enabled = true;
        config.remote.endpoint = None;
        assert!(validate_config(&config).is_err());

        config.remote.endpoint = Some("http://minio:9000".to_string());
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_redis_without_url_fails() {
        let mut config = base_config();
        config.store.url = None;
        assert!(validate_config(&config).is_err());

        config.store.backend = StoreBackend::Memory;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_issue_pattern_requires_url() {
        let mut config = base_config();
        if let SourceKind::HttpDocument(doc) = &mut config.sources[0].kind {
            doc.issue_pattern = Some(r"(\d+)".to_string());
        }
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_invalid_issue_pattern_fails() {
        let mut config = base_config();
        if let SourceKind::HttpDocument(doc) = &mut config.sources[0].kind {
            doc.issue_url = Some("https://example.com/".to_string());
            doc.issue_pattern = Some("(unclosed".to_string());
        }
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("invalid issue_pattern"));
    }
}
