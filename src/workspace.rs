//! Local `server.json` files: discovery, loading, and the starter template.

use std::path::{Path, PathBuf};

use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;

use crate::models::ServerConfig;

pub const SERVER_CONFIG_FILE: &str = "server.json";

const SKIPPED_DIRS: [&str; 2] = ["node_modules", ".git"];

/// Every `server.json` under `root`, sorted by path.
pub fn find_server_configs(root: &Path) -> Vec<PathBuf> {
    let mut found = Vec::new();
    walk(root, &mut found);
    found.sort();
    found
}

fn walk(dir: &Path, found: &mut Vec<PathBuf>) {
    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(e) => {
            debug!(dir = %dir.display(), error = %e, "skipping unreadable directory");
            return;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        if file_type.is_dir() {
            let skipped = entry
                .file_name()
                .to_str()
                .is_some_and(|name| SKIPPED_DIRS.contains(&name));
            if !skipped {
                walk(&path, found);
            }
        } else if file_type.is_file() && entry.file_name() == SERVER_CONFIG_FILE {
            found.push(path);
        }
    }
}

pub fn read_server_config(path: &Path) -> Result<ServerConfig, WorkspaceError> {
    let content = read_file(path)?;
    serde_json::from_str(&content).map_err(|source| WorkspaceError::ParseFailed {
        path: path.to_path_buf(),
        source,
    })
}

/// Read a JSON object of field updates, e.g. an edited `server.json`.
pub fn read_update_file(path: &Path) -> Result<serde_json::Map<String, Value>, WorkspaceError> {
    let content = read_file(path)?;
    let value: Value = serde_json::from_str(&content).map_err(|source| WorkspaceError::ParseFailed {
        path: path.to_path_buf(),
        source,
    })?;
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(WorkspaceError::NotAnObject(path.to_path_buf())),
    }
}

fn read_file(path: &Path) -> Result<String, WorkspaceError> {
    std::fs::read_to_string(path).map_err(|source| WorkspaceError::ReadFailed {
        path: path.to_path_buf(),
        source,
    })
}

/// Starter `server.json` for a new server.
pub fn server_template(name: &str, description: &str, endpoint: &str) -> Value {
    json!({
        "name": name,
        "description": description,
        "version": "1.0.0",
        "endpoint": endpoint,
        "tools": [
            {
                "name": "example_tool",
                "description": "An example tool"
            }
        ],
        "auth_methods": ["bearer"],
        "team": "Development Team",
        "tags": ["example"],
        "metadata": {
            "name": name,
            "endpoint": endpoint,
            "tools": [{ "name": "example_tool" }],
            "auth_methods": ["bearer"]
        }
    })
}

/// Write the starter template to `<dir>/server.json`. Returns the path.
pub fn write_server_template(
    dir: &Path,
    name: &str,
    description: &str,
    endpoint: &str,
    force: bool,
) -> Result<PathBuf, WorkspaceError> {
    let path = dir.join(SERVER_CONFIG_FILE);
    if path.exists() && !force {
        return Err(WorkspaceError::AlreadyExists(path));
    }

    let output = serde_json::to_string_pretty(&server_template(name, description, endpoint)).map_err(|source| {
        WorkspaceError::ParseFailed {
            path: path.clone(),
            source,
        }
    })?;
    let write_err = |source| WorkspaceError::WriteFailed {
        path: path.clone(),
        source,
    };
    std::fs::create_dir_all(dir).map_err(write_err)?;
    std::fs::write(&path, output).map_err(write_err)?;

    Ok(path)
}

#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("Failed to read {}: {source}", .path.display())]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid JSON in {}: {source}", .path.display())]
    ParseFailed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("{} must contain a JSON object", .0.display())]
    NotAnObject(PathBuf),
    #[error("{} already exists (use --force to overwrite)", .0.display())]
    AlreadyExists(PathBuf),
    #[error("Failed to write {}: {source}", .path.display())]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
