// Application layer: use cases shared by the HTTP API and the operator CLI.

pub mod error;
pub mod service;

pub use error::*;
pub use service::*;
