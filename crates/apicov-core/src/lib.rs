//! Core types for ApiCov: the data model shared by the spec catalog, the
//! call interceptor and the analysis engines, plus error taxonomy,
//! collaborator traits and configuration.

pub mod config_manager;
pub mod error;
pub mod telemetry;
pub mod traits;
pub mod types;

pub use config_manager::*;
pub use error::*;
pub use telemetry::init_tracing;
pub use traits::*;
pub use types::*;
