mod debug;
mod error;
pub mod handler;
pub mod router;
pub mod state;

pub use error::RouterError;
pub use router::{CatchAll, build};
pub use state::{Dependencies, Services};
