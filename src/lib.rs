// kicad-outputs - build KiCad output artifacts from the command line
//
// This is the library crate containing the export pipeline and its building blocks.
// The binary crate (main.rs) provides the command-line entry point.

pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod services;

// Re-export commonly used types for convenience
pub use config::ConfigManager;
pub use error::{BuildError, DocumentKind};
pub use metrics::RunMetrics;
pub use models::{OutputSettings, ProductionMode, ProjectIdentity, RunConfig, VendorRequest};
pub use services::{Pipeline, ProcessRunner, RunSummary, ToolLocator};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
