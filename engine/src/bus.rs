//! Notification fan-out.
//!
//! Every observer gets its own unbounded channel. `emit` runs on the caller's
//! thread (usually the job's) and never blocks; observers that went away are
//! dropped on the next emit.

use std::path::Path;
use std::sync::Mutex;

use crossbeam_channel::{unbounded, Receiver, Sender};
use serde::Serialize;

/// Message sent to observers. Serializes to the JSON wire form, e.g.
/// `{"type":"percentage","percentage":40,"folder":"/data"}`.
///
/// Folders are carried as text; bytes that are not valid UTF-8 become U+FFFD.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Notification {
    /// Operator log line; an empty text clears the log
    Message { text: String },
    Busy { busy: bool },
    Command { command: String },
    Percentage { percentage: i32, folder: String },
    /// The folder's contents changed and should be listed again
    RefreshFolder { folder: String },
}

impl Notification {
    pub fn message(text: impl Into<String>) -> Self {
        Notification::Message { text: text.into() }
    }

    pub fn percentage(percentage: i32, folder: &Path) -> Self {
        Notification::Percentage {
            percentage,
            folder: folder.to_string_lossy().into_owned(),
        }
    }

    pub fn refresh(folder: &Path) -> Self {
        Notification::RefreshFolder {
            folder: folder.to_string_lossy().into_owned(),
        }
    }

    pub fn to_json(&self) -> String {
        match serde_json::to_string(self) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!(notification = ?self, error = %e, "notification not serializable");
                serde_json::json!({
                    "type": "message",
                    "text": format!("Unserializable notification: {e}"),
                })
                .to_string()
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct NotificationBus {
    subscribers: Mutex<Vec<Sender<Notification>>>,
}

impl NotificationBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new observer.
    pub fn subscribe(&self) -> Receiver<Notification> {
        let (tx, rx) = unbounded();
        self.lock().push(tx);
        rx
    }

    /// Deliver `notification` to every live observer.
    pub fn emit(&self, notification: Notification) {
        let mut subscribers = self.lock();
        subscribers.retain(|tx| tx.send(notification.clone()).is_ok());
        tracing::trace!(?notification, observers = subscribers.len(), "notification emitted");
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Sender<Notification>>> {
        self.subscribers.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fan_out_to_all_subscribers() {
        let bus = NotificationBus::new();
        let a = bus.subscribe();
        let b = bus.subscribe();

        bus.emit(Notification::Busy { busy: true });

        assert_eq!(a.try_recv().unwrap(), Notification::Busy { busy: true });
        assert_eq!(b.try_recv().unwrap(), Notification::Busy { busy: true });
    }

    #[test]
    fn test_dropped_subscriber_is_pruned() {
        let bus = NotificationBus::new();
        let keep = bus.subscribe();
        let gone = bus.subscribe();
        drop(gone);

        bus.emit(Notification::message("hello"));
        assert_eq!(bus.subscriber_count(), 1);
        assert_eq!(keep.try_recv().unwrap(), Notification::message("hello"));
    }

    #[test]
    fn test_emit_without_subscribers() {
        let bus = NotificationBus::new();
        bus.emit(Notification::message("nobody listens"));
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_wire_format() {
        assert_eq!(
            Notification::Busy { busy: false }.to_json(),
            r#"{"type":"busy","busy":false}"#
        );
        assert_eq!(
            Notification::Command { command: "Delete 'a'".into() }.to_json(),
            r#"{"type":"command","command":"Delete 'a'"}"#
        );
        assert_eq!(
            Notification::percentage(40, Path::new("/data")).to_json(),
            r#"{"type":"percentage","percentage":40,"folder":"/data"}"#
        );
        assert_eq!(
            Notification::refresh(Path::new("/data")).to_json(),
            r#"{"type":"refreshfolder","folder":"/data"}"#
        );
        assert_eq!(Notification::message("").to_json(), r#"{"type":"message","text":""}"#);
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_folder_still_serializes() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let folder = Path::new(OsStr::from_bytes(b"/data/\xff"));
        assert_eq!(
            Notification::refresh(folder).to_json(),
            "{\"type\":\"refreshfolder\",\"folder\":\"/data/\u{FFFD}\"}"
        );
        assert_eq!(
            Notification::percentage(7, folder),
            Notification::Percentage {
                percentage: 7,
                folder: "/data/\u{FFFD}".to_string()
            }
        );
    }
}
