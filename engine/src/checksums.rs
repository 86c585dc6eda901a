//! Checksum computation and manifest files.
//!
//! This module provides:
//! - SHA-256 file digests rendered as lowercase hex
//! - The `.sha256` manifest format: `<digest>  <relative/path>` per line

use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::{Component, Path};

use sha2::{Digest, Sha256};

use crate::error::EngineError;
use crate::model::ManifestEntry;

/// Extension appended to an item's path to name its manifest.
pub const MANIFEST_EXTENSION: &str = "sha256";

/// Separator between digest and path on a manifest line.
pub const SEPARATOR: &str = "  ";

/// Compute the SHA-256 digest of a file, streaming it once.
///
/// # Errors
/// Returns EngineError if the file can't be opened or a read fails midway.
pub fn digest(path: &Path) -> Result<String, EngineError> {
    let mut file = File::open(path).map_err(|e| EngineError::from_io(path, e))?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 65536]; // 64 KB buffer

    loop {
        match file.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => hasher.update(&buffer[..n]),
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(EngineError::from_io(path, e)),
        }
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// Render entries in manifest format, one newline-terminated line each.
pub fn render_manifest(entries: &[ManifestEntry]) -> String {
    let mut out = String::new();
    for entry in entries {
        out.push_str(&entry.digest_hex);
        out.push_str(SEPARATOR);
        out.push_str(&entry.relative_path);
        out.push('\n');
    }
    out
}

/// Write `entries` to `dest`, replacing any existing file.
pub fn write_manifest(entries: &[ManifestEntry], dest: &Path) -> Result<(), EngineError> {
    let file = File::create(dest).map_err(|e| EngineError::from_io(dest, e))?;
    let mut writer = BufWriter::new(file);
    writer
        .write_all(render_manifest(entries).as_bytes())
        .and_then(|_| writer.flush())
        .map_err(|e| EngineError::from_io(dest, e))
}

/// Parse manifest text.
///
/// Each line is split on two-space runs and must yield exactly a digest and a
/// path; anything else is `MalformedManifest` carrying the line.
pub fn parse_manifest(content: &str) -> Result<Vec<ManifestEntry>, EngineError> {
    content
        .lines()
        .map(|line| {
            let parts: Vec<&str> = line.split(SEPARATOR).collect();
            match parts.as_slice() {
                [hex, path] => Ok(ManifestEntry::new(*hex, *path)),
                _ => Err(EngineError::MalformedManifest {
                    line: line.to_string(),
                }),
            }
        })
        .collect()
}

/// Read and parse the manifest at `path`.
pub fn read_manifest(path: &Path) -> Result<Vec<ManifestEntry>, EngineError> {
    let content = std::fs::read_to_string(path).map_err(|e| EngineError::from_io(path, e))?;
    parse_manifest(&content)
}

/// Manifest path for an item: the item's path with `.sha256` appended.
pub fn manifest_path_for(item: &Path) -> std::path::PathBuf {
    let mut name = item.as_os_str().to_os_string();
    name.push(".");
    name.push(MANIFEST_EXTENSION);
    name.into()
}

/// Path of `file` relative to `base`, joined with forward slashes.
///
/// Returns `None` when `file` is not below `base`.
pub fn relative_manifest_path(base: &Path, file: &Path) -> Option<String> {
    let rel = file.strip_prefix(base).ok()?;
    let parts: Vec<String> = rel
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    Some(parts.join("/"))
}
