use crate::error::BuildError;
use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// House-style settings from `kicad-outputs.yaml`
///
/// Every key is optional; a missing file or missing key falls back to the
/// conventional defaults below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    /// Explicit kicad-cli path, tried before PATH and the fallback location
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kicad_cli: Option<Utf8PathBuf>,

    /// Layers printed into the multi-page board PDF
    pub board_layers: Vec<String>,

    /// Side used for the edge-on render
    pub side_view: String,

    pub iso_camera: IsoCamera,

    pub bom: BomSettings,

    /// Summary document name, relative to the root
    pub readme_file: String,

    /// User template name, relative to the root
    pub readme_template: String,

    /// Clear the vendor subfolder before running KiKit
    pub vendor_clean: bool,

    /// Kill external commands that run longer than this; absent means wait forever
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command_timeout_secs: Option<u64>,
}

/// Camera used for the optional perspective render
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IsoCamera {
    pub rotate: String,
    pub zoom: String,
}

/// Column and grouping choices for the parts listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BomSettings {
    pub fields: String,
    pub labels: String,
    pub group_by: String,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            kicad_cli: None,
            board_layers: DEFAULT_BOARD_LAYERS.iter().map(|l| l.to_string()).collect(),
            side_view: "left".to_string(),
            iso_camera: IsoCamera::default(),
            bom: BomSettings::default(),
            readme_file: "README.md".to_string(),
            readme_template: "README.template.md".to_string(),
            vendor_clean: true,
            command_timeout_secs: None,
        }
    }
}

impl Default for IsoCamera {
    fn default() -> Self {
        Self {
            rotate: "-45,0,45".to_string(),
            zoom: "1".to_string(),
        }
    }
}

impl Default for BomSettings {
    fn default() -> Self {
        Self {
            fields: "Reference,Value,Footprint,${QUANTITY},Manufacturer,MPN,Datasheet,${DNP}"
                .to_string(),
            labels: "Refs,Value,Footprint,Qty,Manufacturer,MPN,Datasheet,DNP".to_string(),
            group_by: "Value,Footprint,MPN".to_string(),
        }
    }
}

/// Conventional documentation layers for the board prints
pub const DEFAULT_BOARD_LAYERS: &[&str] = &[
    "F.Cu",
    "B.Cu",
    "F.SilkS",
    "B.SilkS",
    "F.Mask",
    "B.Mask",
    "Edge.Cuts",
    "F.Fab",
    "B.Fab",
    "User.Drawings",
];

impl OutputSettings {
    /// Reject settings that would produce broken tool invocations
    pub fn validate(&self) -> Result<(), BuildError> {
        if self.board_layers.iter().all(|l| l.trim().is_empty()) {
            return Err(BuildError::InvalidSettings(
                "board_layers must name at least one layer".to_string(),
            ));
        }
        if self.readme_file.trim().is_empty() || self.readme_template.trim().is_empty() {
            return Err(BuildError::InvalidSettings(
                "readme_file and readme_template must not be empty".to_string(),
            ));
        }
        if self.command_timeout_secs == Some(0) {
            return Err(BuildError::InvalidSettings(
                "command_timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Comma-joined layer list as kicad-cli expects it
    pub fn layers_arg(&self) -> String {
        self.board_layers
            .iter()
            .map(|l| l.trim())
            .filter(|l| !l.is_empty())
            .collect::<Vec<_>>()
            .join(",")
    }

    pub fn command_timeout(&self) -> Option<Duration> {
        self.command_timeout_secs.map(Duration::from_secs)
    }
}
