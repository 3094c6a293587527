pub mod config;
pub mod error;
pub mod line;

pub use error::{BackendError, SealgateError, SealgateResult};
