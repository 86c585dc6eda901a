//! Filesystem operations module.
//!
//! This module provides the stat-level helpers the jobs are built on:
//! - Listing a folder with recursive directory sizes
//! - Classifying a path as file, directory or missing
//! - Walking a tree in a stable order
//! - Copying files with modification-time preservation
//!
//! Walk order everywhere is: files of a directory first, then each
//! subdirectory recursively (depth-first, pre-order), names sorted bytewise.
//!
//! Symbolic links are followed: a link to a directory is walked as a
//! directory and a link to a file is read as that file. Dangling links, and
//! links that point back at the directory holding them or one of its
//! ancestors, are skipped.
//!
//! Listing policy: permission errors are logged and skipped at every level.
//! Other errors abort the size computation of the subdirectory they occur in;
//! the listing logs them and keeps the bytes counted before the failure.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use crate::error::EngineError;
use crate::model::{DirectoryEntry, PathKind};

/// Immediate children of one directory, sorted by name.
#[derive(Debug, Default)]
pub struct DirContents {
    pub dirs: Vec<PathBuf>,
    /// File path and length in bytes
    pub files: Vec<(PathBuf, u64)>,
}

/// Read the children of `dir`, split into subdirectories and files.
///
/// # Errors
/// Returns EngineError if the directory or any entry's metadata can't be read.
pub fn read_dir_sorted(dir: &Path) -> Result<DirContents, EngineError> {
    let mut contents = DirContents::default();
    let mut real_dir: Option<PathBuf> = None;

    for entry in fs::read_dir(dir).map_err(|e| EngineError::from_io(dir, e))? {
        let entry = entry.map_err(|e| EngineError::from_io(dir, e))?;
        let path = entry.path();
        let is_link = entry
            .file_type()
            .map_err(|e| EngineError::from_io(&path, e))?
            .is_symlink();

        let metadata = match fs::metadata(&path) {
            Ok(metadata) => metadata,
            Err(e) if is_link && e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "skipping dangling link");
                continue;
            }
            Err(e) => return Err(EngineError::from_io(&path, e)),
        };

        if is_link && metadata.is_dir() {
            if real_dir.is_none() {
                real_dir = Some(fs::canonicalize(dir).map_err(|e| EngineError::from_io(dir, e))?);
            }
            let target = fs::canonicalize(&path).map_err(|e| EngineError::from_io(&path, e))?;
            if real_dir.as_ref().is_some_and(|real| real.starts_with(&target)) {
                tracing::debug!(path = %path.display(), "skipping link to an enclosing directory");
                continue;
            }
        }

        if metadata.is_dir() {
            contents.dirs.push(path);
        } else {
            contents.files.push((path, metadata.len()));
        }
    }

    contents.dirs.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    contents.files.sort_by(|a, b| a.0.file_name().cmp(&b.0.file_name()));
    Ok(contents)
}

/// Classify what lives at `path`. Never touches the filesystem beyond a stat.
pub fn classify(path: &Path) -> PathKind {
    match fs::metadata(path) {
        Ok(metadata) if metadata.is_dir() => PathKind::Directory,
        Ok(_) => PathKind::File,
        Err(_) => PathKind::Missing,
    }
}

/// List `folder`: subdirectories first, then files, each group sorted by name.
///
/// Directory sizes are the recursive sum of all descendant file lengths.
/// Problems are reported through `log` and never abort the listing; whatever
/// could be read is returned.
pub fn list_contents(folder: &Path, log: &dyn Fn(&str)) -> Vec<DirectoryEntry> {
    let mut entries = Vec::new();

    let contents = match read_dir_sorted(folder) {
        Ok(contents) => contents,
        Err(e) if e.is_permission_denied() => {
            log(&format!("Access denied to {}", folder.display()));
            return entries;
        }
        Err(e) => {
            log(&format!("Error getting folder contents '{}': {}", folder.display(), e));
            return entries;
        }
    };

    for dir in &contents.dirs {
        let mut size = 0;
        if let Err(e) = accumulate_size(dir, &mut size, log) {
            tracing::warn!(path = %dir.display(), error = %e, "size incomplete");
        }
        entries.push(DirectoryEntry {
            name: display_name(dir),
            size_bytes: size,
            is_directory: true,
        });
    }

    for (file, len) in &contents.files {
        entries.push(DirectoryEntry {
            name: display_name(file),
            size_bytes: *len,
            is_directory: false,
        });
    }

    tracing::debug!(folder = %folder.display(), count = entries.len(), "listed folder");
    entries
}

/// Recursive size of `dir` in bytes.
///
/// Permission errors are logged and the inaccessible part counts as zero.
///
/// # Errors
/// Any other error is logged and returned.
pub fn directory_size(dir: &Path, log: &dyn Fn(&str)) -> Result<u64, EngineError> {
    let mut size = 0;
    accumulate_size(dir, &mut size, log)?;
    Ok(size)
}

fn accumulate_size(dir: &Path, total: &mut u64, log: &dyn Fn(&str)) -> Result<(), EngineError> {
    let contents = match read_dir_sorted(dir) {
        Ok(contents) => contents,
        Err(e) if e.is_permission_denied() => {
            log(&format!("Access denied to {}", dir.display()));
            return Ok(());
        }
        Err(e) => {
            log(&format!("Error getting directory size '{}': {}", dir.display(), e));
            return Err(e);
        }
    };

    *total += contents.files.iter().map(|(_, len)| len).sum::<u64>();
    for sub in &contents.dirs {
        accumulate_size(sub, total, log)?;
    }
    Ok(())
}

/// Total bytes of whatever lives at `path`: a file's length or a directory's
/// recursive size. Missing paths count as zero.
pub fn item_size(path: &Path, log: &dyn Fn(&str)) -> Result<u64, EngineError> {
    match classify(path) {
        PathKind::Missing => Ok(0),
        PathKind::File => Ok(fs::metadata(path).map_err(|e| EngineError::from_io(path, e))?.len()),
        PathKind::Directory => directory_size(path, log),
    }
}

/// Every file below `root`, at any depth, in walk order, with its length.
///
/// # Errors
/// Returns EngineError on the first directory that can't be read.
pub fn walk_files(root: &Path) -> Result<Vec<(PathBuf, u64)>, EngineError> {
    fn recurse(dir: &Path, out: &mut Vec<(PathBuf, u64)>) -> Result<(), EngineError> {
        let contents = read_dir_sorted(dir)?;
        out.extend(contents.files);
        for sub in &contents.dirs {
            recurse(sub, out)?;
        }
        Ok(())
    }

    let mut files = Vec::new();
    recurse(root, &mut files)?;
    Ok(files)
}

/// Copy a file from source to destination, overwriting it, and carry over the
/// source modification time.
///
/// # Returns
/// Number of bytes copied
///
/// # Errors
/// Returns EngineError if the copy fails
pub fn copy_file_with_metadata(src: &Path, dst: &Path) -> Result<u64, EngineError> {
    let mut src_file = fs::File::open(src).map_err(|e| EngineError::from_io(src, e))?;

    let src_mtime = src_file
        .metadata()
        .map_err(|e| EngineError::from_io(src, e))?
        .modified()
        .ok();

    let mut dst_file = fs::File::create(dst).map_err(|e| EngineError::from_io(dst, e))?;

    let bytes_copied = io::copy(&mut src_file, &mut dst_file).map_err(|e| {
        if e.kind() == io::ErrorKind::PermissionDenied {
            EngineError::from_io(dst, e)
        } else {
            EngineError::from_io(src, e)
        }
    })?;
    drop(dst_file);

    if let Some(mtime) = src_mtime {
        let _ = filetime::set_file_mtime(dst, filetime::FileTime::from_system_time(mtime));
    }

    Ok(bytes_copied)
}

/// Create `dir` and any missing ancestors.
///
/// # Errors
/// Returns EngineError if creation fails or a non-directory is in the way
pub fn ensure_dir(dir: &Path) -> Result<(), EngineError> {
    match fs::metadata(dir) {
        Ok(metadata) if metadata.is_dir() => Ok(()),
        Ok(_) => Err(EngineError::Io {
            path: dir.to_path_buf(),
            source: io::Error::new(io::ErrorKind::AlreadyExists, "path exists but is not a directory"),
        }),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            fs::create_dir_all(dir).map_err(|e| EngineError::from_io(dir, e))
        }
        Err(e) => Err(EngineError::from_io(dir, e)),
    }
}

/// Absolute form of `path` with `.`, `..` and symbolic links resolved.
///
/// `path` need not exist: its deepest existing ancestor is canonicalized and
/// the remaining components are applied lexically on top of it.
pub fn resolve_path(path: &Path) -> PathBuf {
    let components: Vec<Component> = path.components().collect();

    for split in (0..=components.len()).rev() {
        let base = if split == 0 {
            std::env::current_dir().ok()
        } else {
            fs::canonicalize(components[..split].iter().collect::<PathBuf>()).ok()
        };

        if let Some(mut resolved) = base {
            for component in &components[split..] {
                match component {
                    Component::ParentDir => {
                        resolved.pop();
                    }
                    Component::CurDir => {}
                    other => resolved.push(other.as_os_str()),
                }
            }
            return resolved;
        }
    }
    path.to_path_buf()
}

/// Last path component as a display string.
pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
