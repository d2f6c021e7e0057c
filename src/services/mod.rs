//! Services module - the export pipeline and its building blocks.
//!
//! Everything that touches kicad-cli, KiKit, or the output folders lives
//! here. None of it depends on the command line, so the whole pipeline can be
//! driven from tests with a fake [`CommandRunner`].
//!
//! # Components
//!
//! - [`locator`]: finds kicad-cli (override, PATH, install fallback) and the
//!   Python that ships next to it
//! - [`process`]: [`ToolCommand`], the [`CommandRunner`] seam, the tokio-backed
//!   [`ProcessRunner`], and [`run_checked`] which applies accepted exit codes
//! - [`staging`]: `ensure_dir`, best-effort `clear_dir` with its shallow-path
//!   guard, and timestamped vs. fixed production folders
//! - [`exports`]: the fixed kicad-cli argument templates for each artifact
//! - [`vendor`]: KiKit vendor packages
//! - [`summary`]: one-time README generation from a template
//! - [`pipeline`]: runs all of the above in order
//!
//! # Usage Example
//!
//! ```ignore
//! use kicad_outputs::services::{Pipeline, ProcessRunner, ToolLocator};
//!
//! let runner = ProcessRunner::new(settings.command_timeout());
//! let locator = ToolLocator::from_env().with_explicit(settings.kicad_cli.clone());
//! let summary = Pipeline::new(&runner, &locator, &settings).run(&run_config).await?;
//! ```

pub mod exports;
pub mod locator;
pub mod pipeline;
pub mod process;
pub mod staging;
pub mod summary;
pub mod vendor;

pub use exports::Exporter;
pub use locator::ToolLocator;
pub use pipeline::{Pipeline, RunSummary};
pub use process::{CommandOutput, CommandRunner, ProcessRunner, ToolCommand, run_checked};
pub use staging::{ClearReport, clear_dir, ensure_dir};
pub use summary::{ReadmeOutcome, render_readme_if_missing};
