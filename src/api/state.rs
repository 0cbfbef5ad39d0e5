use std::sync::Arc;
use std::time::Duration;

use super::error::RouterError;
use crate::config::Config;
use crate::processor::{Manipulator, SpecParser};
use crate::storage::Storage;

/// Capabilities handed to the router at startup
///
/// Both fields are optional here so that a missing capability is reported by
/// [`super::router::build`] instead of being impossible to express.
#[derive(Clone, Default, bon::Builder)]
pub struct Dependencies {
    pub storage: Option<Arc<dyn Storage>>,
    pub manipulator: Option<Arc<dyn Manipulator>>,
}

/// Validated, read-only state shared by every image request
#[derive(Clone)]
pub struct Services {
    pub storage: Arc<dyn Storage>,
    pub manipulator: Arc<dyn Manipulator>,
    pub parser: SpecParser,
    pub request_timeout: Duration,
    pub cache_time: u64,
}

impl Services {
    pub fn new(deps: &Dependencies, config: &Config) -> Result<Self, RouterError> {
        let storage = deps.storage.clone().ok_or(RouterError::MissingStorage)?;
        let manipulator = deps
            .manipulator
            .clone()
            .ok_or(RouterError::MissingManipulator)?;

        Ok(Self {
            storage,
            manipulator,
            parser: SpecParser::from_config(&config.processor)?,
            request_timeout: config.server.request_timeout(),
            cache_time: config.server.cache_time,
        })
    }

    pub fn cache_control(&self) -> String {
        format!("public,max-age={}", self.cache_time)
    }
}
