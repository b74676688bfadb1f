//! Shared utilities

pub mod config;
pub mod diagnostic;
pub mod fs;
pub mod suggest;

pub use config::Config;
pub use diagnostic::{CollectingSink, Diagnostic, ObservabilitySink, Severity, TracingSink};
pub use fs::{FileSystem, InMemoryFileSystem, LocalFileSystem};
pub use suggest::{LevenshteinMatcher, SimilarityMatcher};
