use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub processor: ProcessorConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
    /// Deadline applied to the fetch and process steps of every request
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// `max-age` (seconds) advertised in the Cache-Control header
    #[serde(default = "default_cache_time")]
    pub cache_time: u64,
    /// Enables the `/debug/pprof/` routes
    #[serde(default)]
    pub debug: bool,
}

impl ServerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            request_timeout_ms: default_request_timeout_ms(),
            cache_time: default_cache_time(),
            debug: false,
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 3000))
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_cache_time() -> u64 {
    31_536_000 // one year
}

/// Kind of backend the images are read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    S3,
    Cloudfront,
    Webfolder,
    #[default]
    Local,
}

impl StorageKind {
    /// Remote object stores are the only kinds whose catch-all route may be
    /// scoped to a path prefix.
    pub fn is_remote_object_store(&self) -> bool {
        matches!(self, StorageKind::S3 | StorageKind::Cloudfront)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StorageKind::S3 => "s3",
            StorageKind::Cloudfront => "cloudfront",
            StorageKind::Webfolder => "webfolder",
            StorageKind::Local => "local",
        }
    }
}

/// Image source configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SourceConfig {
    #[serde(default)]
    pub kind: StorageKind,
    /// Path prefix the catch-all route is scoped to (s3/cloudfront only)
    #[serde(default)]
    pub path_prefix: String,
    pub bucket: Option<String>,
    pub region: Option<String>,
    /// Custom S3-compatible endpoint (e.g. MinIO)
    pub endpoint: Option<String>,
    /// Base URL for `webfolder` and `cloudfront` kinds
    pub base_url: Option<String>,
    /// Root directory for the `local` kind
    pub root: Option<PathBuf>,
    /// S3 access key (loaded from environment, not from config file)
    #[serde(skip)]
    pub access_key: Option<String>,
    /// S3 secret key (loaded from environment, not from config file)
    #[serde(skip)]
    pub secret_key: Option<String>,
}

impl SourceConfig {
    /// Path prefix without trailing slashes; `None` when it would match
    /// every path anyway.
    pub fn normalized_prefix(&self) -> Option<&str> {
        let prefix = self.path_prefix.trim().trim_end_matches('/');
        if prefix.is_empty() { None } else { Some(prefix) }
    }
}

/// Image processor configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProcessorConfig {
    /// Encoder quality used when the request does not carry `q`
    #[serde(default = "default_quality")]
    pub default_quality: u8,
    /// Upper bound for requested width/height
    #[serde(default = "default_max_dimension")]
    pub max_dimension: u32,
    /// Extra query keys mapped onto recognized ones, e.g. `width = "w"`
    #[serde(default)]
    pub aliases: BTreeMap<String, String>,
    /// Recognized keys to switch off
    #[serde(default)]
    pub disabled: Vec<String>,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            default_quality: default_quality(),
            max_dimension: default_max_dimension(),
            aliases: BTreeMap::new(),
            disabled: Vec::new(),
        }
    }
}

fn default_quality() -> u8 {
    80
}

fn default_max_dimension() -> u32 {
    4096
}
