use std::sync::Arc;

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;
use tracing::info;

use super::{
    debug::{self, DebugSnapshot},
    error::RouterError,
    handler::{ping, serve_image},
    state::{Dependencies, Services},
};
use crate::config::{Config, SourceConfig};

/// Which paths the image handler answers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatchAll {
    /// `<prefix>` and everything below it
    Prefix(String),
    /// Every path not claimed by another route
    Everything,
}

impl CatchAll {
    /// Scoped to the path prefix only for remote object stores that have one
    pub fn for_source(source: &SourceConfig) -> Self {
        match source.normalized_prefix() {
            Some(prefix) if source.kind.is_remote_object_store() => {
                CatchAll::Prefix(prefix.to_string())
            }
            _ => CatchAll::Everything,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            CatchAll::Prefix(prefix) => format!("{prefix}/*"),
            CatchAll::Everything => "/*".to_string(),
        }
    }
}

/// Build the route table
///
/// Fails before any route exists when either capability is missing.
/// Routes:
/// - `GET /ping`
/// - `GET /debug/pprof/*` when `server.debug` is set
/// - one catch-all `GET` bound to the image handler (see [`CatchAll`])
pub fn build(deps: &Dependencies, config: &Config) -> Result<Router, RouterError> {
    let services = Services::new(deps, config)?;
    let catch_all = CatchAll::for_source(&config.source);

    let mut router = Router::new().route("/ping", get(ping));

    if config.server.debug {
        info!("Debug routes enabled");
        let snapshot = DebugSnapshot::new(config, &services, catch_all.describe());
        router = router.merge(debug::routes(snapshot));
    }

    let image = get(serve_image).with_state(Arc::new(services));
    router = match &catch_all {
        CatchAll::Prefix(prefix) => router
            .route(prefix, image.clone())
            .route(&format!("{prefix}/{{*path}}"), image),
        CatchAll::Everything => router.route("/", image.clone()).route("/{*path}", image),
    };

    info!(
        source = config.source.kind.as_str(),
        catch_all = %catch_all.describe(),
        "Router built"
    );

    Ok(router.layer(TraceLayer::new_for_http()))
}
