use crate::models::OutputSettings;
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;

/// Default settings file name, looked up in the project root
pub const SETTINGS_FILE_NAME: &str = "kicad-outputs.yaml";

/// Environment variable that overrides `kicad_cli` from the settings file
pub const KICAD_CLI_ENV: &str = "KICAD_CLI";

/// Configuration manager for loading and saving the YAML settings file.
///
/// The settings file is optional. When it is absent every house-style choice
/// falls back to [`OutputSettings::default`].
#[derive(Debug, Clone)]
pub struct ConfigManager {
    settings_path: Utf8PathBuf,
}

impl ConfigManager {
    /// Create a manager for `<root>/kicad-outputs.yaml`
    pub fn new<P: AsRef<Utf8Path>>(root: P) -> Self {
        Self {
            settings_path: root.as_ref().join(SETTINGS_FILE_NAME),
        }
    }

    /// Create a manager for an explicit settings file
    pub fn with_path<P: AsRef<Utf8Path>>(settings_path: P) -> Self {
        Self {
            settings_path: settings_path.as_ref().to_path_buf(),
        }
    }

    /// Load the settings file.
    ///
    /// # Returns
    /// The loaded settings, or defaults if the file doesn't exist
    pub fn load_settings(&self) -> Result<OutputSettings> {
        if !self.settings_path.exists() {
            tracing::debug!(
                "Settings file not found at {}, using defaults",
                self.settings_path
            );
            return Ok(OutputSettings::default());
        }

        let file_contents = fs::read_to_string(&self.settings_path)
            .with_context(|| format!("Failed to read settings: {}", self.settings_path))?;

        let settings: OutputSettings = serde_yaml_ng::from_str(&file_contents)
            .with_context(|| format!("Failed to parse settings: {}", self.settings_path))?;

        settings.validate()?;

        tracing::info!("Loaded settings from {}", self.settings_path);
        Ok(settings)
    }

    /// Load the settings file, then apply environment overrides.
    pub fn load_with_env(&self) -> Result<OutputSettings> {
        let mut settings = self.load_settings()?;
        apply_env_overrides(&mut settings, std::env::var(KICAD_CLI_ENV).ok());
        Ok(settings)
    }

    /// Save the settings file.
    ///
    /// # Arguments
    /// * `settings` - The settings to save
    pub fn save_settings(&self, settings: &OutputSettings) -> Result<()> {
        let yaml_string =
            serde_yaml_ng::to_string(settings).context("Failed to serialize settings to YAML")?;

        if let Some(parent) = self.settings_path.parent() {
            if !parent.as_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create settings directory: {}", parent))?;
            }
        }

        fs::write(&self.settings_path, yaml_string)
            .with_context(|| format!("Failed to write settings: {}", self.settings_path))?;

        tracing::info!("Saved settings to {}", self.settings_path);
        Ok(())
    }

    /// Get the settings file path.
    pub fn settings_path(&self) -> &Utf8Path {
        &self.settings_path
    }
}

/// Apply `KICAD_CLI` on top of whatever the file said. Empty values are ignored.
pub fn apply_env_overrides(settings: &mut OutputSettings, kicad_cli: Option<String>) {
    if let Some(value) = kicad_cli.filter(|v| !v.trim().is_empty()) {
        tracing::debug!("{} overrides kicad_cli: {}", KICAD_CLI_ENV, value);
        settings.kicad_cli = Some(Utf8PathBuf::from(value.trim()));
    }
}
