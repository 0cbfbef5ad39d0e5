//! Where a [`Config`] comes from
//!
//! Layers, lowest priority first: struct defaults, the TOML file, `.env`,
//! then `LUMEN__<SECTION>__<KEY>` variables. S3 credentials bypass the
//! layers and are read straight from the environment.

use super::models::{Config, SourceConfig};
use config::{ConfigError, Environment, File, FileFormat};
use std::env;
use std::path::PathBuf;

const CONFIG_ENV_VAR: &str = "LUMEN_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/lumen.toml";
const ENV_PREFIX: &str = "LUMEN";
const ENV_SEPARATOR: &str = "__";

/// Keys whose environment value is a comma separated list
const LIST_KEYS: [&str; 1] = ["processor.disabled"];

/// Variables checked for each credential, in order
const ACCESS_KEY_VARS: [&str; 2] = ["S3_ACCESS_KEY", "AWS_ACCESS_KEY_ID"];
const SECRET_KEY_VARS: [&str; 2] = ["S3_SECRET_KEY", "AWS_SECRET_ACCESS_KEY"];

/// Load from `$LUMEN_CONFIG`, falling back to `config/lumen.toml`
pub fn load() -> Result<Config, ConfigError> {
    let config_path = env::var_os(CONFIG_ENV_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

    load_with_secrets(config_path)
}

/// Same as [`load`] with an explicit file (`lumen server --config`)
pub fn load_with_secrets(config_path: PathBuf) -> Result<Config, ConfigError> {
    // Missing .env is fine
    let _ = dotenvy::dotenv();

    let mut config = load_from_sources(config_path)?;
    apply_credentials(&mut config.source, |name| env::var(name).ok());

    Ok(config)
}

/// Fill the S3 credentials from the first variable that is set
fn apply_credentials(source: &mut SourceConfig, lookup: impl Fn(&str) -> Option<String>) {
    let first = |names: &[&str]| names.iter().find_map(|name| lookup(name));

    if let Some(access_key) = first(&ACCESS_KEY_VARS) {
        source.access_key = Some(access_key);
    }
    if let Some(secret_key) = first(&SECRET_KEY_VARS) {
        source.secret_key = Some(secret_key);
    }
}

/// Build the `[server]`, `[source]` and `[processor]` sections from the file
/// at `config_path` (always parsed as TOML, whatever its extension) and the
/// `LUMEN__*` environment, without credentials.
pub fn load_from_sources(config_path: PathBuf) -> Result<Config, ConfigError> {
    let mut builder = config::Config::builder();

    if config_path.is_file() {
        tracing::info!(path = %config_path.display(), "Loading configuration file");
        builder = builder.add_source(File::from(config_path).format(FileFormat::Toml));
    } else {
        tracing::warn!(
            path = %config_path.display(),
            "Configuration file not found, using defaults and environment overrides"
        );
    }

    // LUMEN__SOURCE__PATH_PREFIX=/images -> source.path_prefix
    // LUMEN__PROCESSOR__DISABLED=blur,mono -> processor.disabled
    let mut environment = Environment::with_prefix(ENV_PREFIX)
        .separator(ENV_SEPARATOR)
        .list_separator(",")
        .try_parsing(true);
    for key in LIST_KEYS {
        environment = environment.with_list_parse_key(key);
    }

    builder.add_source(environment).build()?.try_deserialize()
}
