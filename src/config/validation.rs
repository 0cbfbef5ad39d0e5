use super::models::{Config, StorageKind};
use crate::processor::ParamKey;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Storage kind is s3 but no bucket is configured")]
    MissingBucket,

    #[error("Storage kind is s3 but missing credentials (access_key or secret_key)")]
    MissingS3Credentials,

    #[error("Storage kind '{kind}' requires source.base_url")]
    MissingBaseUrl { kind: &'static str },

    #[error("Storage kind 'local' requires source.root")]
    MissingRoot,

    #[error("Invalid path prefix '{0}': must start with '/' and contain no route parameters")]
    InvalidPathPrefix(String),

    #[error("Request timeout must be positive")]
    ZeroRequestTimeout,

    #[error("Default quality must be within 1..=100, got {0}")]
    InvalidQuality(u8),

    #[error("Max dimension must be positive")]
    ZeroMaxDimension,

    #[error("Processor key '{0}' is not a recognized parameter")]
    UnknownParamKey(String),
}

/// Validate the entire configuration
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_server(config)?;
    validate_source(config)?;
    validate_processor(config)?;
    Ok(())
}

fn validate_server(config: &Config) -> Result<(), ValidationError> {
    if config.server.request_timeout_ms == 0 {
        return Err(ValidationError::ZeroRequestTimeout);
    }
    Ok(())
}

/// Each storage kind needs its own connection settings
fn validate_source(config: &Config) -> Result<(), ValidationError> {
    let source = &config.source;

    match source.kind {
        StorageKind::S3 => {
            if source.bucket.as_deref().is_none_or(str::is_empty) {
                return Err(ValidationError::MissingBucket);
            }
            if source.access_key.is_none() || source.secret_key.is_none() {
                return Err(ValidationError::MissingS3Credentials);
            }
        }
        StorageKind::Cloudfront | StorageKind::Webfolder => {
            if source.base_url.as_deref().is_none_or(str::is_empty) {
                return Err(ValidationError::MissingBaseUrl {
                    kind: source.kind.as_str(),
                });
            }
        }
        StorageKind::Local => {
            if source.root.is_none() {
                return Err(ValidationError::MissingRoot);
            }
        }
    }

    let prefix = source.path_prefix.trim();
    if !prefix.is_empty() && !is_route_prefix(prefix) {
        return Err(ValidationError::InvalidPathPrefix(prefix.to_string()));
    }

    Ok(())
}

/// A literal route path: rooted, no wildcard or capture syntax in any segment
fn is_route_prefix(prefix: &str) -> bool {
    prefix.starts_with('/')
        && !prefix.contains(['{', '}', '*'])
        && !prefix.split('/').any(|segment| segment.starts_with(':'))
}

/// Quality bounds and key references of the processor section
fn validate_processor(config: &Config) -> Result<(), ValidationError> {
    let processor = &config.processor;

    if !(1..=100).contains(&processor.default_quality) {
        return Err(ValidationError::InvalidQuality(processor.default_quality));
    }

    if processor.max_dimension == 0 {
        return Err(ValidationError::ZeroMaxDimension);
    }

    for key in processor.aliases.values().chain(processor.disabled.iter()) {
        if key.parse::<ParamKey>().is_err() {
            return Err(ValidationError::UnknownParamKey(key.clone()));
        }
    }

    Ok(())
}
