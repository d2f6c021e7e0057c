//! Data models for kicad-outputs.
//!
//! - [`OutputSettings`]: house-style choices loaded from `kicad-outputs.yaml`
//! - [`ProjectIdentity`]: base name plus schematic/board paths of one design
//! - [`RunConfig`]: the outputs a single invocation asked for
//!
//! All of these are built once at startup and only read afterwards.

pub mod config;
pub mod project;
pub mod run_config;

pub use config::{BomSettings, IsoCamera, OutputSettings};
pub use project::ProjectIdentity;
pub use run_config::{ProductionMode, RunConfig, VendorRequest};
