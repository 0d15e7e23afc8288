//! Path resolution for the config file and persisted session state.
//!
//! Uses env vars when set, otherwise XDG defaults.

use std::path::{Path, PathBuf};

/// Resolved locations of mcpreg's files.
#[derive(Debug, Clone)]
pub struct Paths {
    pub config_file: PathBuf,
    pub state_dir: PathBuf,
}

impl Paths {
    /// Resolve paths from environment, falling back to XDG/defaults.
    pub fn resolve() -> Self {
        let config_file = resolve_path(
            "MCPREG_CONFIG_PATH",
            dirs::config_dir().map(|p| p.join("mcpreg/config.toml")),
            "~/.config/mcpreg/config.toml",
        );
        let state_dir = resolve_path(
            "MCPREG_STATE_DIR",
            dirs::data_local_dir().map(|p| p.join("mcpreg")),
            "~/.local/share/mcpreg/",
        );

        Self {
            config_file,
            state_dir,
        }
    }

    /// Paths rooted at an explicit directory (tests, embedding).
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            config_file: dir.join("config.toml"),
            state_dir: dir.join("state"),
        }
    }

    /// TOML settings file (`api_base_url`, `auto_refresh`, `page_size`, `token_storage`).
    pub fn config_file(&self) -> &Path {
        &self.config_file
    }

    /// Token file used when `token_storage = "file"`.
    pub fn secrets_file(&self) -> PathBuf {
        self.state_dir.join("secrets.json")
    }

    /// Plain settings holding the auth-disabled flag.
    pub fn settings_file(&self) -> PathBuf {
        self.state_dir.join("settings.json")
    }
}

fn resolve_path(env_var: &str, xdg_default: Option<PathBuf>, fallback: &str) -> PathBuf {
    if let Ok(val) = std::env::var(env_var) {
        let trimmed = val.trim();
        if !trimmed.is_empty() {
            return expand_tilde(trimmed);
        }
    }
    xdg_default.unwrap_or_else(|| expand_tilde(fallback))
}

fn expand_tilde(path: &str) -> PathBuf {
    let expanded = shellexpand::tilde(path);
    PathBuf::from(expanded.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn env_vars_override_defaults() {
        std::env::set_var("MCPREG_CONFIG_PATH", "/tmp/mcpreg-test/config.toml");
        std::env::set_var("MCPREG_STATE_DIR", "  /tmp/mcpreg-test/state  ");
        let paths = Paths::resolve();
        std::env::remove_var("MCPREG_CONFIG_PATH");
        std::env::remove_var("MCPREG_STATE_DIR");

        assert_eq!(paths.config_file(), Path::new("/tmp/mcpreg-test/config.toml"));
        assert_eq!(paths.secrets_file(), PathBuf::from("/tmp/mcpreg-test/state/secrets.json"));
        assert_eq!(paths.settings_file(), PathBuf::from("/tmp/mcpreg-test/state/settings.json"));
    }

    #[test]
    #[serial]
    fn blank_env_var_is_ignored() {
        std::env::set_var("MCPREG_STATE_DIR", "   ");
        let paths = Paths::resolve();
        std::env::remove_var("MCPREG_STATE_DIR");

        assert!(paths.state_dir.ends_with("mcpreg"));
    }
}
