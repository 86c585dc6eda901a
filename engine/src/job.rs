//! Job operations module.
//!
//! The four long-running operations:
//! - Copying a file or directory tree into a folder
//! - Deleting a file or directory tree
//! - Creating a `.sha256` manifest for a file or directory
//! - Verifying a `.sha256` manifest
//!
//! Every operation reports 0% before doing anything and 100% on every exit
//! path, logs what it does through the reporter, and returns `false` instead
//! of an error when something goes wrong.

use std::fs;
use std::path::{Path, PathBuf};

use crate::checksums;
use crate::error::EngineError;
use crate::fs_ops;
use crate::model::{ManifestEntry, PathKind};
use crate::progress::{percent_of, JobReporter};

/// A job as requested by an operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobRequest {
    Copy {
        source_root: PathBuf,
        item_name: String,
        destination: PathBuf,
        /// Used only to compute percentages, never validated
        expected_total_bytes: u64,
    },
    Delete {
        folder: PathBuf,
        item_name: String,
    },
    CreateChecksum {
        base_folder: PathBuf,
        item_name: String,
    },
    VerifyChecksum {
        manifest: PathBuf,
    },
}

impl JobRequest {
    /// Human-readable command text shown to observers.
    pub fn describe(&self) -> String {
        match self {
            JobRequest::Copy {
                source_root,
                item_name,
                destination,
                ..
            } => format!(
                "Copy '{}' from '{}' to '{}'",
                item_name,
                source_root.display(),
                destination.display()
            ),
            JobRequest::Delete { folder, item_name } => {
                format!("Delete '{}' from '{}'", item_name, folder.display())
            }
            JobRequest::CreateChecksum {
                base_folder,
                item_name,
            } => format!("Create checksum for '{}' in '{}'", item_name, base_folder.display()),
            JobRequest::VerifyChecksum { manifest } => {
                format!("Verify checksum file '{}'", manifest.display())
            }
        }
    }

    /// Folder whose listing changes (or is concerned) when this job runs.
    pub fn target_folder(&self) -> PathBuf {
        match self {
            JobRequest::Copy { destination, .. } => destination.clone(),
            JobRequest::Delete { folder, .. } => folder.clone(),
            JobRequest::CreateChecksum { base_folder, .. } => base_folder.clone(),
            JobRequest::VerifyChecksum { manifest } => manifest
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default(),
        }
    }

    /// Run the operation this request names.
    pub fn execute(&self, reporter: &dyn JobReporter) -> bool {
        match self {
            JobRequest::Copy {
                source_root,
                item_name,
                destination,
                expected_total_bytes,
            } => copy_item(source_root, item_name, destination, *expected_total_bytes, reporter),
            JobRequest::Delete { folder, item_name } => delete_item(folder, item_name, reporter),
            JobRequest::CreateChecksum {
                base_folder,
                item_name,
            } => create_checksum_manifest(base_folder, item_name, reporter),
            JobRequest::VerifyChecksum { manifest } => verify_checksum_manifest(manifest, reporter),
        }
    }
}

/// Report 0, run `op`, log any error with `context`, and report 100 on the
/// way out no matter how `op` ends.
fn run_reported<F>(reporter: &dyn JobReporter, context: &str, op: F) -> bool
where
    F: FnOnce() -> Result<bool, EngineError>,
{
    reporter.report(0);
    let _finish = scopeguard::guard(reporter, |r| r.report(100));

    match op() {
        Ok(done) => done,
        Err(e @ EngineError::NotFound { .. }) => {
            tracing::warn!(error = %e, "{context}");
            reporter.log(&e.to_string());
            false
        }
        Err(e) => {
            tracing::warn!(error = %e, os_error = ?e.raw_os_error(), "{context}");
            reporter.log(&format!("{context}: {e}"));
            false
        }
    }
}

/// Copy `source_root/item_name` into `destination`.
///
/// Files land directly in `destination`; directories are mirrored under
/// `destination/<name>`. Existing files are overwritten. Progress is the share
/// of `expected_total_bytes` copied so far.
pub fn copy_item(
    source_root: &Path,
    item_name: &str,
    destination: &Path,
    expected_total_bytes: u64,
    reporter: &dyn JobReporter,
) -> bool {
    let source = source_root.join(item_name);
    let context = format!("Error copying '{}'", source.display());

    run_reported(reporter, &context, || {
        let kind = fs_ops::classify(&source);
        if kind == PathKind::Missing {
            return Err(EngineError::NotFound { path: source.clone() });
        }

        let target = destination.join(fs_ops::display_name(&source));
        // Copying onto the source would truncate it before it is read
        let real_source = fs::canonicalize(&source).map_err(|e| EngineError::from_io(&source, e))?;
        if fs_ops::resolve_path(&target).starts_with(&real_source) {
            return Err(EngineError::Io {
                path: target,
                source: std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "destination is inside the source",
                ),
            });
        }

        fs_ops::ensure_dir(destination)?;
        let mut counter = ByteCounter {
            copied: 0,
            total: expected_total_bytes,
        };

        if kind == PathKind::File {
            reporter.log(&format!("Copying '{}'", target.display()));
            let bytes = fs_ops::copy_file_with_metadata(&source, &target)?;
            counter.add(bytes, reporter);
        } else {
            reporter.log(&format!("Copying directory '{}'", target.display()));
            copy_tree(&source, &target, &mut counter, reporter)?;
        }

        tracing::info!(
            source = %source.display(),
            target = %target.display(),
            bytes = counter.copied,
            "copy finished"
        );
        Ok(true)
    })
}

/// Running byte total for a copy.
struct ByteCounter {
    copied: u64,
    total: u64,
}

impl ByteCounter {
    fn add(&mut self, bytes: u64, reporter: &dyn JobReporter) {
        self.copied += bytes;
        reporter.report(percent_of(self.copied, self.total));
    }
}

fn copy_tree(
    src_dir: &Path,
    dst_dir: &Path,
    counter: &mut ByteCounter,
    reporter: &dyn JobReporter,
) -> Result<(), EngineError> {
    fs_ops::ensure_dir(dst_dir)?;
    let contents = fs_ops::read_dir_sorted(src_dir)?;

    for (file, _) in &contents.files {
        let target = dst_dir.join(fs_ops::display_name(file));
        reporter.log(&format!("Copying '{}'", target.display()));
        let bytes = fs_ops::copy_file_with_metadata(file, &target)?;
        counter.add(bytes, reporter);
    }

    for sub in &contents.dirs {
        let target = dst_dir.join(fs_ops::display_name(sub));
        reporter.log(&format!("Copying directory '{}'", target.display()));
        copy_tree(sub, &target, counter, reporter)?;
    }
    Ok(())
}

/// Delete `folder/item_name`, recursively if it is a directory.
pub fn delete_item(folder: &Path, item_name: &str, reporter: &dyn JobReporter) -> bool {
    let path = folder.join(item_name);
    let context = format!("Error deleting '{}'", path.display());

    run_reported(reporter, &context, || {
        // Don't follow a symlink into someone else's tree
        let metadata = fs::symlink_metadata(&path).map_err(|e| EngineError::from_io(&path, e))?;

        if metadata.is_dir() {
            reporter.log(&format!("Deleting directory '{}'", path.display()));
            fs::remove_dir_all(&path).map_err(|e| EngineError::from_io(&path, e))?;
        } else {
            reporter.log(&format!("Deleting file '{}'", path.display()));
            fs::remove_file(&path).map_err(|e| EngineError::from_io(&path, e))?;
        }

        tracing::info!(path = %path.display(), "deleted");
        Ok(true)
    })
}

/// Write `<base_folder>/<item_name>.sha256`.
///
/// A file gets one entry with its bare name. A directory gets one entry per
/// file at any depth, in walk order, with paths relative to `base_folder`.
pub fn create_checksum_manifest(base_folder: &Path, item_name: &str, reporter: &dyn JobReporter) -> bool {
    let item = base_folder.join(item_name);
    let context = format!("Error creating checksum for '{}'", item.display());

    run_reported(reporter, &context, || {
        let manifest_path = checksums::manifest_path_for(&item);

        let entries = match fs_ops::classify(&item) {
            PathKind::Missing => return Err(EngineError::NotFound { path: item.clone() }),
            PathKind::File => {
                reporter.log(&format!("Calculating checksum for '{}'", item.display()));
                let hex = checksums::digest(&item)?;
                vec![ManifestEntry::new(hex, fs_ops::display_name(&item))]
            }
            PathKind::Directory => {
                let files = fs_ops::walk_files(&item)?;
                let total: u64 = files.iter().map(|(_, len)| len).sum();
                let mut hashed = 0u64;
                let mut entries = Vec::with_capacity(files.len());

                for (file, len) in &files {
                    reporter.log(&format!("Calculating checksum for '{}'", file.display()));
                    let hex = checksums::digest(file)?;
                    let relative = checksums::relative_manifest_path(base_folder, file)
                        .unwrap_or_else(|| fs_ops::display_name(file));
                    entries.push(ManifestEntry::new(hex, relative));

                    hashed += len;
                    reporter.report(percent_of(hashed, total));
                }
                entries
            }
        };

        checksums::write_manifest(&entries, &manifest_path)?;
        reporter.log(&format!("Checksum file '{}' created", manifest_path.display()));
        tracing::info!(manifest = %manifest_path.display(), entries = entries.len(), "manifest written");
        Ok(true)
    })
}

/// Check every entry of a manifest against the files next to it.
///
/// Stops at the first missing file or mismatching digest.
pub fn verify_checksum_manifest(manifest: &Path, reporter: &dyn JobReporter) -> bool {
    let context = format!("Error verifying '{}'", manifest.display());

    run_reported(reporter, &context, || {
        if fs_ops::classify(manifest) != PathKind::File {
            reporter.log(&format!("Checksum file '{}' does not exist", manifest.display()));
            return Ok(false);
        }

        let entries = checksums::read_manifest(manifest)?;
        let base = manifest.parent().unwrap_or_else(|| Path::new(""));

        for (index, entry) in entries.iter().enumerate() {
            let file = base.join(&entry.relative_path);
            if fs_ops::classify(&file) != PathKind::File {
                reporter.log(&format!("File not found: {}", file.display()));
                return Ok(false);
            }

            reporter.log(&format!("Verifying checksum for file: {}", file.display()));
            let computed = checksums::digest(&file)?;

            if computed != entry.digest_hex {
                reporter.log(&format!("Checksum mismatch for file: {}", file.display()));
                reporter.log(&format!("Expected: {}", entry.digest_hex));
                reporter.log(&format!("Computed: {}", computed));
                tracing::warn!(file = %file.display(), "checksum mismatch");
                return Ok(false);
            }

            reporter.report(percent_of(index as u64 + 1, entries.len() as u64));
        }

        reporter.log(&format!(
            "Checksum file '{}' verified: {} file(s) OK",
            manifest.display(),
            entries.len()
        ));
        Ok(true)
    })
}
