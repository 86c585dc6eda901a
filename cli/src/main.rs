//! FileMover - Command-line front end for the job engine.
//!
//! Lists folders and runs copy, delete and checksum jobs on the local disk,
//! printing the engine's notifications to stderr as they arrive.

mod config;

use clap::{Parser, Subcommand};
use mover_engine::{item_size, EngineError, JobRequest, JobService, Notification};
use std::path::PathBuf;
use std::thread;
use tracing_subscriber::EnvFilter;

/// FileMover - long-running filesystem jobs with live progress
#[derive(Parser, Debug)]
#[command(name = "filemover")]
#[command(version = "0.1.0")]
#[command(about = "Copy, delete and checksum files one job at a time")]
struct Args {
    /// Enable debug diagnostics from the engine
    #[arg(long, global = true)]
    verbose: bool,

    /// Print notifications as JSON wire messages
    #[arg(long, global = true)]
    json: bool,

    /// JSON file listing the application folders
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List a folder with recursive directory sizes
    List { folder: PathBuf },

    /// Copy an item of SOURCE_ROOT into DESTINATION
    Copy {
        source_root: PathBuf,
        item: String,
        destination: PathBuf,

        /// Total bytes used for percentages (computed when omitted)
        #[arg(long, value_name = "BYTES")]
        expected_bytes: Option<u64>,
    },

    /// Delete an item of FOLDER
    Delete { folder: PathBuf, item: String },

    /// Write <BASE_FOLDER>/<ITEM>.sha256
    ChecksumCreate { base_folder: PathBuf, item: String },

    /// Verify a .sha256 manifest
    ChecksumVerify { manifest: PathBuf },

    /// Show the configured application folders
    Folders,
}

/// Why the CLI did not succeed; each maps to an exit code.
#[derive(Debug)]
enum CliError {
    /// The job ran and reported failure
    JobFailed,
    /// Usage, configuration or busy rejection
    Fatal(String),
}

impl From<EngineError> for CliError {
    fn from(err: EngineError) -> Self {
        CliError::Fatal(err.to_string())
    }
}

fn main() {
    let args = Args::parse();
    init_tracing(args.verbose);

    let exit_code = match run_cli(&args) {
        Ok(()) => 0,
        Err(CliError::JobFailed) => 1,
        Err(CliError::Fatal(msg)) => {
            eprintln!("Error: {}", msg);
            2
        }
    };

    std::process::exit(exit_code);
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "mover_engine=debug,filemover=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Main CLI logic - separated for testability
fn run_cli(args: &Args) -> Result<(), CliError> {
    tracing::debug!(command = ?args.command, "filemover starting");
    let service = JobService::new();

    let request = match &args.command {
        Command::List { folder } => {
            let entries = service.list_contents(folder);
            print!("{}", format_listing(&entries));
            return Ok(());
        }
        Command::Folders => {
            let path = args
                .config
                .as_ref()
                .ok_or_else(|| CliError::Fatal("'folders' needs --config <FILE>".to_string()))?;
            let folders = config::load_folders(path).map_err(|e| CliError::Fatal(e.to_string()))?;
            print!("{}", config::format_folders(&folders));
            return Ok(());
        }
        Command::Copy {
            source_root,
            item,
            destination,
            expected_bytes,
        } => {
            let expected_total_bytes = match expected_bytes {
                Some(bytes) => *bytes,
                None => expected_bytes_from(item, item_size(&source_root.join(item), &|m| eprintln!("{}", m)))?,
            };
            JobRequest::Copy {
                source_root: source_root.clone(),
                item_name: item.clone(),
                destination: destination.clone(),
                expected_total_bytes,
            }
        }
        Command::Delete { folder, item } => JobRequest::Delete {
            folder: folder.clone(),
            item_name: item.clone(),
        },
        Command::ChecksumCreate { base_folder, item } => JobRequest::CreateChecksum {
            base_folder: base_folder.clone(),
            item_name: item.clone(),
        },
        Command::ChecksumVerify { manifest } => JobRequest::VerifyChecksum {
            manifest: manifest.clone(),
        },
    };

    let (events, _) = service.connect();
    let json = args.json;
    let printer = thread::spawn(move || {
        for event in events.iter() {
            if let Some(line) = render_notification(&event, json) {
                eprintln!("{}", line);
            }
            if event == (Notification::Busy { busy: false }) {
                break;
            }
        }
    });

    let ok = service.run(request)?;
    let _ = printer.join();

    if ok {
        Ok(())
    } else {
        Err(CliError::JobFailed)
    }
}

/// Byte total for a copy whose size was measured up front.
fn expected_bytes_from(item: &str, measured: Result<u64, EngineError>) -> Result<u64, CliError> {
    match measured {
        Ok(bytes) => Ok(bytes),
        // A missing item is left for the job to report
        Err(EngineError::NotFound { .. }) => Ok(0),
        Err(e) => Err(CliError::Fatal(format!("Cannot size '{}': {}", item, e))),
    }
}

/// One line of terminal output for a notification, `None` to stay quiet.
fn render_notification(event: &Notification, json: bool) -> Option<String> {
    if json {
        return Some(event.to_json());
    }
    match event {
        Notification::Message { text } if text.is_empty() => None,
        Notification::Message { text } => Some(text.clone()),
        Notification::Command { command } if !command.is_empty() => Some(format!("> {}", command)),
        Notification::Percentage { percentage, .. } if *percentage >= 0 => {
            Some(format!("Progress: {}", progress_bar(*percentage)))
        }
        _ => None,
    }
}

fn progress_bar(percent: i32) -> String {
    let percent = percent.clamp(0, 100) as usize;
    let filled = percent / 5;
    format!("[{}{}] {}%", "=".repeat(filled), " ".repeat(20 - filled), percent)
}

fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_idx = 0;

    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    format!("{:.2} {}", size, UNITS[unit_idx])
}

fn format_listing(entries: &[mover_engine::DirectoryEntry]) -> String {
    let mut out = String::new();
    for entry in entries {
        let kind = if entry.is_directory { "<DIR>" } else { "" };
        out.push_str(&format!(
            "{:>5} {:>12}  {}\n",
            kind,
            format_bytes(entry.size_bytes),
            entry.name
        ));
    }
    let total: u64 = entries.iter().map(|e| e.size_bytes).sum();
    out.push_str(&format!("{} item(s), {}\n", entries.len(), format_bytes(total)));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn args(command: Command) -> Args {
        Args {
            verbose: false,
            json: false,
            config: None,
            command,
        }
    }

    #[test]
    fn test_copy_computes_expected_bytes() {
        let src_dir = TempDir::new().expect("Failed to create temp dir");
        let dst_dir = TempDir::new().expect("Failed to create temp dir");
        fs::create_dir(src_dir.path().join("docs")).unwrap();
        fs::write(src_dir.path().join("docs/a.txt"), "hello").expect("Failed to write file");

        let result = run_cli(&args(Command::Copy {
            source_root: src_dir.path().to_path_buf(),
            item: "docs".to_string(),
            destination: dst_dir.path().to_path_buf(),
            expected_bytes: None,
        }));
        assert!(result.is_ok(), "copy should succeed: {result:?}");
        assert_eq!(fs::read_to_string(dst_dir.path().join("docs/a.txt")).unwrap(), "hello");
    }

    #[test]
    fn test_copy_missing_item_is_job_failure() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let result = run_cli(&args(Command::Copy {
            source_root: dir.path().to_path_buf(),
            item: "ghost".to_string(),
            destination: dir.path().join("out"),
            expected_bytes: None,
        }));
        assert!(matches!(result, Err(CliError::JobFailed)));
    }

    #[test]
    fn test_sizing_errors_other_than_missing_are_fatal() {
        assert!(matches!(expected_bytes_from("docs", Ok(42)), Ok(42)));

        let missing = EngineError::NotFound { path: PathBuf::from("/src/docs") };
        assert!(matches!(expected_bytes_from("docs", Err(missing)), Ok(0)));

        let broken = EngineError::Io {
            path: PathBuf::from("/src/docs/raw"),
            source: std::io::Error::new(std::io::ErrorKind::Other, "device error"),
        };
        match expected_bytes_from("docs", Err(broken)) {
            Err(CliError::Fatal(msg)) => assert!(msg.starts_with("Cannot size 'docs'")),
            other => panic!("expected fatal error, got {other:?}"),
        }
    }

    #[test]
    fn test_delete_missing_is_job_failure() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let result = run_cli(&args(Command::Delete {
            folder: dir.path().to_path_buf(),
            item: "ghost".to_string(),
        }));
        assert!(matches!(result, Err(CliError::JobFailed)));
    }

    #[test]
    fn test_checksum_create_then_verify() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        fs::write(dir.path().join("image.iso"), vec![9u8; 4096]).unwrap();

        let created = run_cli(&args(Command::ChecksumCreate {
            base_folder: dir.path().to_path_buf(),
            item: "image.iso".to_string(),
        }));
        assert!(created.is_ok());

        let verified = run_cli(&args(Command::ChecksumVerify {
            manifest: dir.path().join("image.iso.sha256"),
        }));
        assert!(verified.is_ok());
    }

    #[test]
    fn test_folders_requires_config() {
        let result = run_cli(&args(Command::Folders));
        assert!(matches!(result, Err(CliError::Fatal(_))));
    }

    #[test]
    fn test_render_notification() {
        assert_eq!(render_notification(&Notification::message(""), false), None);
        assert_eq!(
            render_notification(&Notification::message("Copying 'x'"), false),
            Some("Copying 'x'".to_string())
        );
        assert_eq!(
            render_notification(&Notification::percentage(50, std::path::Path::new("/d")), false),
            Some("Progress: [==========          ] 50%".to_string())
        );
        assert_eq!(render_notification(&Notification::Busy { busy: true }, false), None);
        assert_eq!(
            render_notification(&Notification::Busy { busy: true }, true),
            Some(r#"{"type":"busy","busy":true}"#.to_string())
        );
    }

    #[test]
    fn test_format_listing() {
        let entries = vec![
            mover_engine::DirectoryEntry {
                name: "photos".to_string(),
                size_bytes: 2048,
                is_directory: true,
            },
            mover_engine::DirectoryEntry {
                name: "a.txt".to_string(),
                size_bytes: 10,
                is_directory: false,
            },
        ];
        let text = format_listing(&entries);
        assert!(text.contains("<DIR>      2.00 KB  photos"));
        assert!(text.contains("10.00 B  a.txt"));
        assert!(text.ends_with("2 item(s), 2.01 KB\n"));
    }
}
