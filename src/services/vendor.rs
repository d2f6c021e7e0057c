//! Vendor-ready fabrication packages through KiKit.
//!
//! KiKit runs as `python -m kikit.ui fab <vendor>` under the interpreter found
//! next to kicad-cli, writing into `<production>/<vendor>_production/`.

use crate::metrics::RunMetrics;
use crate::models::{ProjectIdentity, VendorRequest};
use crate::services::process::{CommandRunner, ToolCommand, run_checked};
use crate::services::staging::{clear_contents, ensure_dir};
use anyhow::Result;
use camino::{Utf8Path, Utf8PathBuf};
use regex::Regex;
use std::sync::LazyLock;

/// Archive KiKit writes into the destination folder
pub const VENDOR_ARCHIVE: &str = "gerbers.zip";

static UNSAFE_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_.-]+").expect("Invalid vendor regex"));

/// Lowercase `vendor` and replace runs of anything outside `[A-Za-z0-9_.-]` with `-`
pub fn sanitize_vendor(vendor: &str) -> String {
    UNSAFE_CHARS
        .replace_all(&vendor.trim().to_lowercase(), "-")
        .into_owned()
}

/// Ordering-reference field KiKit should read part numbers from
pub fn default_order_field(vendor: &str) -> &'static str {
    if vendor.trim().eq_ignore_ascii_case("jlcpcb") {
        "LCSC"
    } else {
        "MPN"
    }
}

/// `<out_dir>/<sanitized-vendor>_production`
pub fn vendor_dir(out_dir: &Utf8Path, vendor: &str) -> Utf8PathBuf {
    out_dir.join(format!("{}_production", sanitize_vendor(vendor)))
}

/// Run KiKit for `request`, returning where its archive is expected.
///
/// The archive path follows KiKit's naming convention and is not checked.
pub async fn run_vendor_fab<R: CommandRunner>(
    runner: &R,
    python: &Utf8Path,
    project: &ProjectIdentity,
    request: &VendorRequest,
    out_dir: &Utf8Path,
    clean: bool,
    metrics: &RunMetrics,
) -> Result<Utf8PathBuf> {
    let field = request
        .order_field
        .as_deref()
        .unwrap_or_else(|| default_order_field(&request.vendor));

    let vendor_root = vendor_dir(out_dir, &request.vendor);
    if clean {
        let report = clear_contents(&vendor_root)?;
        metrics.record_clear_failures(report.failures().count());
    } else {
        ensure_dir(&vendor_root)?;
    }

    let command = ToolCommand::new(python)
        .args(["-m", "kikit.ui", "fab", request.vendor.trim(), "--assembly"])
        .args(["--schematic", project.schematic.as_str()])
        .args(["--field", field])
        .args([project.board.as_str(), vendor_root.as_str()]);

    let output = run_checked(runner, &command).await?;
    metrics.record_command(output.exit_code != 0);

    Ok(vendor_root.join(VENDOR_ARCHIVE))
}
