//! ApiCov spec handling: turns an OpenAPI/Swagger document into an ordered
//! catalog of declared operations and matches concrete request paths against
//! the catalog's path templates.

pub mod catalog;
pub mod loader;
pub mod matcher;

pub use catalog::SpecCatalog;
pub use loader::{parse_document, source_for, FileSpecSource, SpecLoader, UrlSpecSource};
pub use matcher::{PathMatcher, PathTemplate};
