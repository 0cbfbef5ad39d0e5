//! Diagnostic routes, mounted only when `server.debug` is enabled

use std::sync::Arc;

use axum::{Json, Router, extract::State, response::IntoResponse, routing::get};
use serde::Serialize;

use super::state::Services;
use crate::config::Config;

const INDEX: &str = "\
/debug/pprof/

cmdline  process command line, NUL separated
config   effective routing and processing settings
";

/// Effective settings exposed at `/debug/pprof/config`; never holds secrets
#[derive(Debug, Clone, Serialize)]
pub struct DebugSnapshot {
    pub version: &'static str,
    pub source_kind: &'static str,
    pub catch_all: String,
    pub request_timeout_ms: u64,
    pub cache_time: u64,
    pub recognized_keys: Vec<String>,
}

impl DebugSnapshot {
    pub fn new(config: &Config, services: &Services, catch_all: String) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION"),
            source_kind: config.source.kind.as_str(),
            catch_all,
            request_timeout_ms: config.server.request_timeout_ms,
            cache_time: config.server.cache_time,
            recognized_keys: services.parser.recognized_keys(),
        }
    }
}

pub fn routes(snapshot: DebugSnapshot) -> Router {
    Router::new()
        .route("/debug/pprof/", get(index))
        .route("/debug/pprof/cmdline", get(cmdline))
        .route("/debug/pprof/config", get(effective_config))
        .with_state(Arc::new(snapshot))
}

async fn index() -> impl IntoResponse {
    INDEX
}

async fn cmdline() -> impl IntoResponse {
    std::env::args().collect::<Vec<_>>().join("\0")
}

async fn effective_config(State(snapshot): State<Arc<DebugSnapshot>>) -> impl IntoResponse {
    Json(snapshot.as_ref().clone())
}
