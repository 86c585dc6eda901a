//! # FileMover Engine - Single-Flight Filesystem Jobs
//!
//! A headless job engine for long-running operations on a server's local
//! disk, with live progress and log output for any number of observers.
//!
//! ## Overview
//!
//! The engine provides:
//! - Folder listings with recursive directory sizes
//! - Recursive copy and delete
//! - SHA-256 manifest creation and verification (`<digest>  <path>` lines)
//! - A single-flight gate: at most one job at a time, others are rejected
//! - Throttled progress and log notifications fanned out to observers
//!
//! ## Basic Usage
//!
//! ```no_run
//! use mover_engine::{JobRequest, JobService, Notification};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let service = JobService::new();
//! let (events, _resync) = service.connect();
//!
//! let ok = service.run(JobRequest::CreateChecksum {
//!     base_folder: "/srv/data".into(),
//!     item_name: "photos".into(),
//! })?;
//!
//! for event in events.try_iter() {
//!     if let Notification::Message { text } = event {
//!         println!("{text}");
//!     }
//! }
//! println!("manifest created: {ok}");
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - **model**: Core data structures (DirectoryEntry, ManifestEntry, JobState)
//! - **error**: Error types and handling
//! - **fs_ops**: Listing, sizing, walking and copying
//! - **checksums**: Digests and the manifest format
//! - **progress**: Reporter trait and progress throttle
//! - **gate**: Single-flight gate
//! - **bus**: Notification fan-out
//! - **job**: The four job operations
//! - **service**: Gate + bus + operations, the entry point for front ends

pub mod model;
pub mod error;
pub mod fs_ops;
pub mod checksums;
pub mod progress;
pub mod gate;
pub mod bus;
pub mod job;
pub mod service;

// Re-export main types and functions
pub use model::{DirectoryEntry, JobProgress, JobState, ManifestEntry, PathKind};
pub use error::EngineError;
pub use fs_ops::{classify, directory_size, item_size, list_contents};
pub use checksums::{digest, read_manifest, write_manifest};
pub use progress::{JobReporter, ProgressThrottle};
pub use gate::{GateToken, SingleFlightGate};
pub use bus::{Notification, NotificationBus};
pub use job::{copy_item, create_checksum_manifest, delete_item, verify_checksum_manifest, JobRequest};
pub use service::JobService;
