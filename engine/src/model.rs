//! Core data model for the job engine.
//!
//! - DirectoryEntry: one row of a folder listing
//! - PathKind: what lives at a path
//! - ManifestEntry: one line of a `.sha256` manifest
//! - JobProgress / JobState: the process-wide job status shown to observers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// A single entry of a folder listing.
///
/// For directories `size_bytes` is the recursive sum of every descendant file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryEntry {
    pub name: String,
    pub size_bytes: u64,
    pub is_directory: bool,
}

/// Result of classifying a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathKind {
    Missing,
    File,
    Directory,
}

impl std::fmt::Display for PathKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathKind::Missing => write!(f, "missing"),
            PathKind::File => write!(f, "file"),
            PathKind::Directory => write!(f, "directory"),
        }
    }
}

/// One `<digest>  <relative path>` line of a checksum manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    /// 64 lowercase hex characters
    pub digest_hex: String,
    /// Forward-slash separated, relative to the manifest's base directory
    pub relative_path: String,
}

impl ManifestEntry {
    pub fn new(digest_hex: impl Into<String>, relative_path: impl Into<String>) -> Self {
        ManifestEntry {
            digest_hex: digest_hex.into(),
            relative_path: relative_path.into(),
        }
    }
}

/// Last progress value published for a job, with the folder it concerns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobProgress {
    /// -1 until the first job publishes anything, then 0..=100
    pub percent: i32,
    pub target_path: PathBuf,
}

impl Default for JobProgress {
    fn default() -> Self {
        JobProgress {
            percent: -1,
            target_path: PathBuf::new(),
        }
    }
}

/// Process-wide job status.
///
/// Owned by the gate; mutated only while a job holds it. Late-joining
/// observers read a snapshot of this to resynchronize.
#[derive(Debug, Clone, Default, Serialize)]
pub struct JobState {
    pub busy: bool,
    pub command: String,
    pub last_progress: JobProgress,
    /// Id of the running (or most recent) job
    pub job_id: Option<Uuid>,
    pub started_at: Option<DateTime<Utc>>,
}
