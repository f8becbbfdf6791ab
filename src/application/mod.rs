// Application layer: use cases on top of the domain and storage layers.
// The transfer path is split in two: a lock-free validator that fails fast and
// an executor that owns the atomic section.

pub mod error;
mod executor;
mod service;
mod validator;

pub use error::*;
pub use executor::*;
pub use service::*;
pub use validator::*;
