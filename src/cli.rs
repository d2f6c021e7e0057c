//! Command-line interface.

use crate::config::{ConfigManager, SETTINGS_FILE_NAME};
use crate::models::run_config::DEFAULT_PROD_DIR;
use crate::models::{ProductionMode, RunConfig, VendorRequest};
use anyhow::{Context, Result};
use camino::Utf8PathBuf;
use clap::Parser;

/// Build KiCad output artifacts (3D models, renders, documentation, fabrication files)
#[derive(Parser, Debug)]
#[command(name = "kicad-outputs")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the .kicad_pro file, or the project path without extension
    #[arg(long, required_unless_present = "write_config")]
    pub project: Option<Utf8PathBuf>,

    /// Root folder for output folders
    #[arg(long, default_value = ".")]
    pub root: Utf8PathBuf,

    /// Production folder, relative to the root
    #[arg(long, default_value = DEFAULT_PROD_DIR)]
    pub prod_dir: Utf8PathBuf,

    /// Also render an isometric view
    #[arg(long)]
    pub iso: bool,

    /// Also export a GLB model
    #[arg(long)]
    pub glb: bool,

    /// Zip the gerbers folder
    #[arg(long)]
    pub zip: bool,

    /// Skip the DRC report
    #[arg(long)]
    pub skip_drc: bool,

    /// Write to <prod-dir>/<project>/ and clear it first instead of a timestamped folder
    #[arg(long)]
    pub no_timestamp: bool,

    /// Generate a vendor package with KiKit (e.g. jlcpcb)
    #[arg(long, value_name = "VENDOR")]
    pub kikit: Option<String>,

    /// Ordering-reference field for KiKit (default: LCSC for jlcpcb, MPN otherwise)
    #[arg(long, value_name = "FIELD", requires = "kikit")]
    pub kikit_field: Option<String>,

    /// Settings file [default: <root>/kicad-outputs.yaml]
    #[arg(long, value_name = "PATH")]
    pub config: Option<Utf8PathBuf>,

    /// Write the default settings file if it does not exist, then exit
    #[arg(long)]
    pub write_config: bool,

    /// Also write daily-rotated log files to this folder
    #[arg(long, value_name = "DIR")]
    pub log_dir: Option<Utf8PathBuf>,

    /// Verbose logging
    #[arg(long)]
    pub debug: bool,
}

impl Cli {
    /// Settings manager for `--config`, or the default file under `--root`
    pub fn config_manager(&self) -> ConfigManager {
        match &self.config {
            Some(path) => ConfigManager::with_path(path),
            None => ConfigManager::with_path(self.root.join(SETTINGS_FILE_NAME)),
        }
    }

    pub fn into_run_config(self) -> Result<RunConfig> {
        let project = self
            .project
            .context("--project is required unless --write-config is given")?;

        let vendor = self
            .kikit
            .filter(|v| !v.trim().is_empty())
            .map(|vendor| VendorRequest {
                vendor,
                order_field: self.kikit_field.filter(|f| !f.trim().is_empty()),
            });

        Ok(RunConfig {
            project,
            root: self.root,
            prod_dir: self.prod_dir,
            iso: self.iso,
            glb: self.glb,
            zip: self.zip,
            include_drc: !self.skip_drc,
            production_mode: if self.no_timestamp {
                ProductionMode::Fixed
            } else {
                ProductionMode::Timestamped
            },
            vendor,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::parse_from(["kicad-outputs", "--project", "boards/demo.kicad_pro"]);
        assert_eq!(
            cli.config_manager().settings_path().as_str(),
            Utf8PathBuf::from(".").join(SETTINGS_FILE_NAME).as_str()
        );

        let run = cli.into_run_config().unwrap();
        assert_eq!(run.project, Utf8PathBuf::from("boards/demo.kicad_pro"));
        assert_eq!(run.root, Utf8PathBuf::from("."));
        assert_eq!(run.prod_dir, Utf8PathBuf::from("PRODUCTION"));
        assert!(!run.iso && !run.glb && !run.zip);
        assert!(run.include_drc);
        assert_eq!(run.production_mode, ProductionMode::Timestamped);
        assert!(run.vendor.is_none());
    }

    #[test]
    fn test_all_flags() {
        let cli = Cli::parse_from([
            "kicad-outputs",
            "--project",
            "demo",
            "--root",
            "out",
            "--prod-dir",
            "FAB",
            "--iso",
            "--glb",
            "--zip",
            "--skip-drc",
            "--no-timestamp",
            "--kikit",
            "jlcpcb",
            "--kikit-field",
            "JLC PN",
            "--config",
            "house.yaml",
        ]);
        assert_eq!(cli.config_manager().settings_path().as_str(), "house.yaml");

        let run = cli.into_run_config().unwrap();
        assert_eq!(run.root, Utf8PathBuf::from("out"));
        assert_eq!(run.prod_dir, Utf8PathBuf::from("FAB"));
        assert!(run.iso && run.glb && run.zip);
        assert!(!run.include_drc);
        assert_eq!(run.production_mode, ProductionMode::Fixed);
        assert_eq!(
            run.vendor,
            Some(VendorRequest {
                vendor: "jlcpcb".to_string(),
                order_field: Some("JLC PN".to_string()),
            })
        );
    }

    #[test]
    fn test_project_required_for_a_run() {
        assert!(Cli::try_parse_from(["kicad-outputs"]).is_err());
        let cli = Cli::try_parse_from(["kicad-outputs", "--write-config"]).unwrap();
        assert!(cli.write_config);
        assert!(cli.into_run_config().is_err());
    }

    #[test]
    fn test_kikit_field_needs_vendor() {
        assert!(
            Cli::try_parse_from(["kicad-outputs", "--project", "demo", "--kikit-field", "MPN"])
                .is_err()
        );
    }
}
