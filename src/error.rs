//! Error taxonomy for the export pipeline.
//!
//! Every condition here is fatal for the run. Best-effort cleanup failures are
//! deliberately absent: they are recorded in a
//! [`ClearReport`](crate::services::staging::ClearReport) and logged instead.

use camino::Utf8PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Which companion document of a project is missing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Schematic,
    Board,
}

impl std::fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DocumentKind::Schematic => write!(f, "Schematic"),
            DocumentKind::Board => write!(f, "Board"),
        }
    }
}

/// Errors that abort an export run
#[derive(Error, Debug)]
pub enum BuildError {
    #[error("{kind} not found: {path}")]
    DocumentNotFound {
        kind: DocumentKind,
        path: Utf8PathBuf,
    },

    #[error(
        "kicad-cli not found (tried: {tried}).\n\
         Add KiCad to PATH, set the KICAD_CLI environment variable, \
         or set `kicad_cli` in the settings file."
    )]
    ToolNotFound { tried: String },

    #[error("Could not locate a Python interpreter to run KiKit (tried: {tried})")]
    InterpreterNotFound { tried: String },

    #[error("Command `{program}` failed with code {code}")]
    CommandFailed { program: String, code: i32 },

    #[error("Command `{program}` timed out after {after:?}")]
    CommandTimeout { program: String, after: Duration },

    #[error("{step} export did not produce a file: {path}")]
    MissingOutput {
        step: &'static str,
        path: Utf8PathBuf,
    },

    #[error("Refusing to clear very shallow path: {path}")]
    ShallowPath { path: Utf8PathBuf },

    #[error("Invalid settings: {0}")]
    InvalidSettings(String),
}
