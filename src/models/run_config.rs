use camino::Utf8PathBuf;

/// Where fabrication outputs go on each run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProductionMode {
    /// `<prod-dir>/<YYYYmmdd_HHMM>_<project>/`, never cleared, accumulates history
    #[default]
    Timestamped,
    /// `<prod-dir>/<project>/`, wiped at the start of every run
    Fixed,
}

/// Vendor package request for KiKit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VendorRequest {
    pub vendor: String,
    /// Overrides the vendor's default ordering-reference field
    pub order_field: Option<String>,
}

/// Everything a single run was asked to do. Built once from the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    /// `.kicad_pro` path or bare stem
    pub project: Utf8PathBuf,
    pub root: Utf8PathBuf,
    /// Production folder, relative to `root`
    pub prod_dir: Utf8PathBuf,
    pub iso: bool,
    pub glb: bool,
    pub zip: bool,
    pub include_drc: bool,
    pub production_mode: ProductionMode,
    pub vendor: Option<VendorRequest>,
}

impl RunConfig {
    /// A run with every optional output switched off except DRC
    pub fn new(project: impl Into<Utf8PathBuf>, root: impl Into<Utf8PathBuf>) -> Self {
        Self {
            project: project.into(),
            root: root.into(),
            prod_dir: Utf8PathBuf::from(DEFAULT_PROD_DIR),
            iso: false,
            glb: false,
            zip: false,
            include_drc: true,
            production_mode: ProductionMode::Timestamped,
            vendor: None,
        }
    }
}

pub const DEFAULT_PROD_DIR: &str = "PRODUCTION";
pub const THREE_D_DIR: &str = "3D_MODEL";
pub const PICTURES_DIR: &str = "PICTURES";
pub const DOCUMENTATION_DIR: &str = "DOCUMENTATION";
