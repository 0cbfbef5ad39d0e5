//! Manipulator capability and the process-spec parser
//!
//! ## Key Components
//!
//! - [`Manipulator`] - capability that transforms fetched bytes
//! - [`ImageManipulator`] - built-in implementation on top of the `image` crate
//! - [`SpecParser`] - turns query pairs into a [`ProcessSpec`]

mod spec;
mod transform;

pub use spec::{
    Anchor, FitMode, Flip, Horizontal, Mono, OutputFormat, Param, ParamKey, ProcessSpec,
    Rotation, SpecParser, UnknownParamKey, Vertical,
};
pub use transform::ImageManipulator;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ManipulatorError {
    #[error("empty process spec")]
    EmptySpec,
    #[error("decode failed: {0}")]
    Decode(String),
    #[error("encode failed: {0}")]
    Encode(String),
    #[error("processing task failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

/// Byte-transforming capability consumed by the image handler
///
/// Callers never pass [`ProcessSpec::EMPTY`]; implementations reject it with
/// [`ManipulatorError::EmptySpec`].
#[async_trait]
pub trait Manipulator: Send + Sync {
    async fn process(&self, image: Bytes, spec: &ProcessSpec) -> Result<Bytes, ManipulatorError>;
}
