//! README generation for the project root.
//!
//! The README is written once. If it already exists it is never touched, so
//! hand edits survive every later run.
//!
//! Templates use `$NAME` or `${NAME}` placeholders. Substitution is lenient:
//! unknown names and stray `$` signs are copied through unchanged, and `$$`
//! produces a literal `$`.

use crate::services::exports::{View, board_prints_name, picture_name, schematic_pdf_name};
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use encoding_rs::{Encoding, UTF_16BE, UTF_16LE, WINDOWS_1252};
use indexmap::IndexMap;
use regex::{Captures, Regex};
use std::borrow::Cow;
use std::fs;
use std::sync::LazyLock;

/// Template used when the root has no `README.template.md`
pub const DEFAULT_README_TEMPLATE: &str = r#"# ${PROJECT_NAME}

![HEADER](./PICTURES/${HEADER_IMAGE}) <!-- 3D rendered pretty view -->

INFO INFO

[PCB layout](./DOCUMENTATION/${PCBLAYOUT_PDF}) <!-- PDFs of boards -->
[SCHEMATIC](./DOCUMENTATION/${SCHEMATIC_PDF}) <!-- Schematic PDFs -->

## FRONT
![Front](./PICTURES/${PICTURE_FRONT})

## BACK
![Back](./PICTURES/${PICTURE_BACK})

## SIDE
![Side](./PICTURES/${PICTURE_SIDE})

# Before major commits
Re-run kicad-outputs to update the outputs and pictures.
"#;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$(?:(\$)|([_A-Za-z][_A-Za-z0-9]*)|\{([_A-Za-z][_A-Za-z0-9]*)\})")
        .expect("Invalid placeholder regex")
});

/// Text encodings tried, in order, when reading a user template
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    Utf8,
    Utf8Sig,
    Utf16,
    Utf16Le,
    Utf16Be,
    Cp1252,
}

impl TextEncoding {
    pub const ORDER: [TextEncoding; 6] = [
        TextEncoding::Utf8,
        TextEncoding::Utf8Sig,
        TextEncoding::Utf16,
        TextEncoding::Utf16Le,
        TextEncoding::Utf16Be,
        TextEncoding::Cp1252,
    ];

    pub fn name(self) -> &'static str {
        match self {
            TextEncoding::Utf8 => "utf-8",
            TextEncoding::Utf8Sig => "utf-8-sig",
            TextEncoding::Utf16 => "utf-16",
            TextEncoding::Utf16Le => "utf-16-le",
            TextEncoding::Utf16Be => "utf-16-be",
            TextEncoding::Cp1252 => "cp1252",
        }
    }

    /// Strict decode; `None` if the bytes are not valid in this encoding.
    pub fn decode(self, data: &[u8]) -> Option<String> {
        const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";
        match self {
            // A BOM is left for utf-8-sig so it gets stripped.
            TextEncoding::Utf8 if data.starts_with(UTF8_BOM) => None,
            TextEncoding::Utf8 => std::str::from_utf8(data).ok().map(str::to_string),
            TextEncoding::Utf8Sig => std::str::from_utf8(data.strip_prefix(UTF8_BOM)?)
                .ok()
                .map(str::to_string),
            TextEncoding::Utf16 => match data {
                [0xFF, 0xFE, rest @ ..] => decode_strict(rest, UTF_16LE),
                [0xFE, 0xFF, rest @ ..] => decode_strict(rest, UTF_16BE),
                _ => None,
            },
            // Without a BOM, only accept data that actually has NUL bytes; plain
            // 8-bit text of even length would otherwise decode as garbage.
            TextEncoding::Utf16Le if data.contains(&0) => decode_strict(data, UTF_16LE),
            TextEncoding::Utf16Be if data.contains(&0) => decode_strict(data, UTF_16BE),
            TextEncoding::Utf16Le | TextEncoding::Utf16Be => None,
            TextEncoding::Cp1252 => decode_cp1252(data),
        }
    }
}

fn decode_strict(data: &[u8], encoding: &'static Encoding) -> Option<String> {
    encoding
        .decode_without_bom_handling_and_without_replacement(data)
        .map(Cow::into_owned)
}

// Bytes Windows-1252 leaves unassigned. WHATWG maps them to C1 controls, but
// a template containing them is not cp1252 text.
const CP1252_UNDEFINED: [u8; 5] = [0x81, 0x8D, 0x8F, 0x90, 0x9D];

fn decode_cp1252(data: &[u8]) -> Option<String> {
    if data.iter().any(|b| CP1252_UNDEFINED.contains(b)) {
        return None;
    }
    decode_strict(data, WINDOWS_1252)
}

/// Decode `data` with the first encoding that accepts it, or lossy UTF-8.
pub fn decode_flexible(data: &[u8]) -> (String, Option<TextEncoding>) {
    for encoding in TextEncoding::ORDER {
        if let Some(text) = encoding.decode(data) {
            return (text, Some(encoding));
        }
    }
    (String::from_utf8_lossy(data).into_owned(), None)
}

/// Read a text file trying common encodings, logging which one worked
pub fn read_text_flexible(path: &Utf8Path) -> Result<String> {
    let data = fs::read(path).with_context(|| format!("Failed to read template: {}", path))?;
    let name = path.file_name().unwrap_or(path.as_str());

    let (text, encoding) = decode_flexible(&data);
    match encoding {
        Some(encoding) => tracing::info!("Loaded {} using {}", name, encoding.name()),
        None => tracing::warn!("Loaded {} using utf-8 with replacement chars", name),
    }
    Ok(text)
}

/// Replace known placeholders, leaving everything else verbatim
pub fn substitute(template: &str, values: &IndexMap<&str, String>) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures| {
            if caps.get(1).is_some() {
                return "$".to_string();
            }
            let name = caps.get(2).or_else(|| caps.get(3)).map(|m| m.as_str());
            match name.and_then(|n| values.get(n)) {
                Some(value) => value.clone(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Placeholder values for `project`, given the pictures present right now
pub fn readme_values(project: &str, pictures_dir: &Utf8Path) -> IndexMap<&'static str, String> {
    let iso = picture_name(project, View::Iso);
    let header = if pictures_dir.join(&iso).exists() {
        iso
    } else {
        picture_name(project, View::Top)
    };

    let mut values = IndexMap::new();
    values.insert("PROJECT_NAME", project.to_string());
    values.insert("HEADER_IMAGE", header.clone());
    values.insert("PCBLAYOUT_PDF", board_prints_name(project));
    values.insert("SCHEMATIC_PDF", schematic_pdf_name(project));
    values.insert("PICTURE_FRONT", picture_name(project, View::Top));
    values.insert("PICTURE_BACK", picture_name(project, View::Bottom));
    values.insert("PICTURE_SIDE", picture_name(project, View::Side));
    values.insert("EXTRA_IMAGE", header);
    values
}

/// What [`render_readme_if_missing`] did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadmeOutcome {
    Kept(Utf8PathBuf),
    Generated {
        path: Utf8PathBuf,
        from_template: bool,
    },
}

impl ReadmeOutcome {
    pub fn path(&self) -> &Utf8Path {
        match self {
            ReadmeOutcome::Kept(path) => path,
            ReadmeOutcome::Generated { path, .. } => path,
        }
    }
}

/// Write `readme` from `template` (or the built-in default) unless it exists.
///
/// Output is UTF-8 with `\n` line endings.
pub fn render_readme_if_missing(
    readme: &Utf8Path,
    template: &Utf8Path,
    pictures_dir: &Utf8Path,
    project: &str,
) -> Result<ReadmeOutcome> {
    if readme.exists() {
        tracing::info!("{} already exists, leaving it untouched", readme);
        return Ok(ReadmeOutcome::Kept(readme.to_path_buf()));
    }
    tracing::info!("Generating {}", readme);

    let from_template = template.is_file();
    let template_text = if from_template {
        read_text_flexible(template)?
    } else {
        DEFAULT_README_TEMPLATE.to_string()
    };

    let values = readme_values(project, pictures_dir);
    let rendered = substitute(&template_text, &values).replace("\r\n", "\n");

    fs::write(readme, rendered).with_context(|| format!("Failed to write {}", readme))?;
    tracing::info!("Wrote {}", readme);

    Ok(ReadmeOutcome::Generated {
        path: readme.to_path_buf(),
        from_template,
    })
}
