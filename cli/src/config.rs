//! Application folder configuration.
//!
//! A JSON array of folders offered to operators, e.g.
//! `[{"id": "media", "title": "Media", "paths": ["/srv/media"]}]`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Cannot read config '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid config '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationFolder {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub paths: Vec<String>,
}

pub fn load_folders(path: &Path) -> Result<Vec<ApplicationFolder>, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_folders(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

pub fn parse_folders(text: &str) -> Result<Vec<ApplicationFolder>, serde_json::Error> {
    serde_json::from_str(text)
}

pub fn format_folders(folders: &[ApplicationFolder]) -> String {
    let mut out = String::new();
    for folder in folders {
        out.push_str(&format!("{} ({})\n", folder.title, folder.id));
        for path in &folder.paths {
            out.push_str(&format!("  {}\n", path));
        }
    }
    out
}
