use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub lock: LockConfig,
    #[serde(default)]
    pub dedup: DedupConfig,
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub preview: PreviewConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub runner: RunnerConfig,
    pub sources: Vec<SourceConfig>,
}

/// Filesystem layout
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PathsConfig {
    /// Root holding `tmp/` (scratch) and `data/` (durable artifacts).
    #[serde(default = "default_output_root")]
    pub output_root: PathBuf,
}

impl PathsConfig {
    /// Per-invocation scratch directories live under here.
    pub fn scratch_root(&self) -> PathBuf {
        self.output_root.join("tmp")
    }

    /// Durable local artifact tier.
    pub fn data_root(&self) -> PathBuf {
        self.output_root.join("data")
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            output_root: default_output_root(),
        }
    }
}

fn default_output_root() -> PathBuf {
    PathBuf::from("output")
}

/// Key-value store configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    /// Redis URL (required when backend = "redis").
    #[serde(default = "default_redis_url")]
    pub url: Option<String>,
    /// Database file (used when backend = "sqlite").
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            url: default_redis_url(),
            path: default_store_path(),
        }
    }
}

fn default_redis_url() -> Option<String> {
    Some("redis://127.0.0.1:6379".to_string())
}

fn default_store_path() -> PathBuf {
    PathBuf::from("newsstand.db")
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    #[default]
    Redis,
    Sqlite,
    Memory,
}

/// Lock configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LockConfig {
    /// Lock lifetime. Must exceed the worst-case time to process one issue,
    /// there is no renewal.
    #[serde(default = "default_lock_ttl")]
    pub ttl_secs: u64,
}

impl LockConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_lock_ttl(),
        }
    }
}

fn default_lock_ttl() -> u64 {
    60 * 60
}

/// Dedup retention configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DedupConfig {
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

impl DedupConfig {
    pub fn retention(&self) -> Duration {
        Duration::from_secs(u64::from(self.retention_days) * 86_400)
    }
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            retention_days: default_retention_days(),
        }
    }
}

fn default_retention_days() -> u32 {
    2
}

/// Remote object store (S3-compatible) configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RemoteConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Endpoint URL, e.g. "http://minio:9000".
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_bucket")]
    pub bucket: String,
    #[serde(default)]
    pub access_key: Option<String>,
    #[serde(default)]
    pub secret_key: Option<String>,
    #[serde(default = "default_remote_timeout")]
    pub timeout_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: None,
            bucket: default_bucket(),
            access_key: None,
            secret_key: None,
            timeout_secs: default_remote_timeout(),
        }
    }
}

fn default_bucket() -> String {
    "newspapers".to_string()
}

fn default_remote_timeout() -> u64 {
    120
}

/// Preview (cover image) configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PreviewConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Renderer executable.
    #[serde(default = "default_preview_program")]
    pub program: String,
    #[serde(default = "default_dpi")]
    pub dpi: u32,
    #[serde(default = "default_preview_timeout")]
    pub timeout_secs: u64,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            program: default_preview_program(),
            dpi: default_dpi(),
            timeout_secs: default_preview_timeout(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_preview_program() -> String {
    "pdftoppm".to_string()
}

fn default_dpi() -> u32 {
    200
}

fn default_preview_timeout() -> u64 {
    60
}

/// HTTP client settings shared by the bundled sources
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpConfig {
    /// Timeout for page and manifest requests.
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,
    /// Timeout for document downloads.
    #[serde(default = "default_download_timeout")]
    pub download_timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_http_timeout(),
            download_timeout_secs: default_download_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_http_timeout() -> u64 {
    30
}

fn default_download_timeout() -> u64 {
    120
}

fn default_user_agent() -> String {
    "Mozilla/5.0".to_string()
}

/// Metrics export
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MetricsConfig {
    /// Write the Prometheus text exposition here at the end of a run
    /// (node-exporter textfile collector).
    #[serde(default)]
    pub textfile_path: Option<PathBuf>,
}

/// Run-level behaviour switches
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RunnerConfig {
    /// Report a fan-out source whose collaborator raised as failed instead of
    /// completed-degraded.
    #[serde(default)]
    pub fan_out_errors_are_failures: bool,
    /// Exit with a non-zero status when any source failed.
    #[serde(default)]
    pub fail_exit_on_failed_source: bool,
}

/// One configured newspaper source
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceConfig {
    pub id: String,
    #[serde(flatten)]
    pub kind: SourceKind,
}

/// Acquisition strategy of a source
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceKind {
    /// One document per day, fetched from a URL template.
    HttpDocument(HttpDocumentConfig),
    /// Many documents per run, listed in a JSON manifest.
    Manifest(ManifestConfig),
}

impl SourceKind {
    pub fn is_fan_out(&self) -> bool {
        matches!(self, SourceKind::Manifest(_))
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpDocumentConfig {
    /// Document URL; `{date}` becomes YYYYMMDD and `{iso_date}` YYYY-MM-DD (UTC).
    pub url: String,
    /// Page carrying the publication number.
    #[serde(default)]
    pub issue_url: Option<String>,
    /// Regex whose first capture group is the publication number.
    #[serde(default)]
    pub issue_pattern: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ManifestConfig {
    /// JSON list of `{ "paper", "date", "url" }` entries.
    pub manifest_url: String,
}

/// Sanitized config for logging (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub paths: PathsConfig,
    pub store: SanitizedStoreConfig,
    pub lock: LockConfig,
    pub dedup: DedupConfig,
    pub remote: SanitizedRemoteConfig,
    pub preview: PreviewConfig,
    pub runner: RunnerConfig,
    pub sources: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedStoreConfig {
    pub backend: StoreBackend,
    pub url_configured: bool,
    pub path: PathBuf,
}

/// Sanitized remote config (secret key hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedRemoteConfig {
    pub enabled: bool,
    pub endpoint: Option<String>,
    pub bucket: String,
    pub credentials_configured: bool,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            paths: config.paths.clone(),
            store: SanitizedStoreConfig {
                backend: config.store.backend,
                url_configured: config.store.url.is_some(),
                path: config.store.path.clone(),
            },
            lock: config.lock.clone(),
            dedup: config.dedup.clone(),
            remote: SanitizedRemoteConfig {
                enabled: config.remote.enabled,
                endpoint: config.remote.endpoint.clone(),
                bucket: config.remote.bucket.clone(),
                credentials_configured: config.remote.access_key.is_some()
                    && config.remote.secret_key.is_some(),
            },
            preview: config.preview.clone(),
            runner: config.runner.clone(),
            sources: config.sources.iter().map(|s| s.id.clone()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_minimal_config_uses_defaults() {
        let toml = r#"
[[sources]]
id = "iran"
kind = "http_document"
url = "https://example.com/{iso_date}/paper.pdf"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.store.backend, StoreBackend::Redis);
        assert_eq!(
            config.store.url.as_deref(),
            Some("redis://127.0.0.1:6379")
        );
        assert_eq!(config.lock.ttl(), Duration::from_secs(3600));
        assert_eq!(config.dedup.retention(), Duration::from_secs(2 * 86_400));
        assert!(!config.remote.enabled);
        assert_eq!(config.preview.dpi, 200);
        assert_eq!(config.paths.scratch_root(), PathBuf::from("output/tmp"));
        assert_eq!(config.paths.data_root(), PathBuf::from("output/data"));
    }

    #[test]
    fn test_deserialize_missing_sources_fails() {
        let toml = r#"
[lock]
ttl_secs = 60
"#;
        let result: Result<Config, _> = toml::from_str(toml);
        assert!(result.is_err());
    }

    #[test]
    fn test_deserialize_source_kinds() {
        let toml = r#"
[[sources]]
id = "etemad"
kind = "http_document"
url = "https://example.com/{date}.pdf"
issue_url = "https://example.com/"
issue_pattern = "No\\.\\s*(\\d+)"

[[sources]]
id = "pishkhan"
kind = "manifest"
manifest_url = "https://example.com/manifest.json"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.sources.len(), 2);

        match &config.sources[0].kind {
            SourceKind::HttpDocument(doc) => {
                assert_eq!(doc.url, "https://example.com/{date}.pdf");
                assert_eq!(doc.issue_pattern.as_deref(), Some("No\\.\\s*(\\d+)"));
            }
            other => panic!("unexpected kind: {:?}", other),
        }
        assert!(!config.sources[0].kind.is_fan_out());
        assert!(config.sources[1].kind.is_fan_out());
    }

    #[test]
    fn test_deserialize_unknown_kind_fails() {
        let toml = r#"
[[sources]]
id = "x"
kind = "carrier_pigeon"
"#;
        let result: Result<Config, _> = toml::from_str(toml);
        assert!(result.is_err());
    }

    #[test]
    fn test_sanitized_config_hides_secret() {
        let toml = r#"
[remote]
enabled = true
endpoint = "http://minio:9000"
access_key = "minio"
secret_key = "super-secret"

[[sources]]
id = "iran"
kind = "http_document"
url = "https://example.com/{date}.pdf"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        let sanitized = SanitizedConfig::from(&config);

        assert!(sanitized.remote.credentials_configured);
        assert_eq!(sanitized.sources, vec!["iran".to_string()]);

        let json = serde_json::to_string(&sanitized).unwrap();
        assert!(!json.contains("super-secret"));
    }
}
