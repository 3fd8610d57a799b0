use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::Config;

/// Resolve a configured path, expanding ~ to the home directory.
pub fn resolve_path(path: &str) -> PathBuf {
    if path.starts_with("~/") || path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home.join(path.strip_prefix("~/").unwrap_or(""));
        }
    }
    PathBuf::from(path)
}

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "TANDEM_CONFIG";

/// Find the config file: `$TANDEM_CONFIG`, then `./tandem.json`, then
/// `~/.tandem/config.json`.
pub fn find_config_path() -> PathBuf {
    if let Some(path) = std::env::var_os(CONFIG_ENV).filter(|p| !p.is_empty()) {
        return PathBuf::from(path);
    }

    let local = Path::new("tandem.json");
    if local.exists() {
        return local.to_path_buf();
    }

    // The home config is the default even when absent; loading it yields defaults.
    dirs::home_dir()
        .map(|h| h.join(".tandem").join("config.json"))
        .unwrap_or_else(|| local.to_path_buf())
}

/// Load configuration from a JSON file. A missing or blank file yields defaults.
pub fn load_config(path: &Path) -> Result<Config> {
    let contents = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Config::default()),
        Err(e) => {
            return Err(e).with_context(|| format!("failed to read config '{}'", path.display()))
        }
    };
    if contents.trim().is_empty() {
        return Ok(Config::default());
    }
    serde_json::from_str(&contents)
        .with_context(|| format!("failed to parse config '{}'", path.display()))
}

/// Save configuration to a JSON file.
pub fn save_config(path: &Path, config: &Config) -> Result<()> {
    let contents = serde_json::to_string_pretty(config)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).with_context(|| {
            format!(
                "failed to create config directory '{}'",
                parent.to_string_lossy()
            )
        })?;
    }
    std::fs::write(path, contents)
        .with_context(|| format!("failed to write config '{}'", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::WriteAccess;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config(&dir.path().join("nope.json")).unwrap();
        assert!(cfg.stack.shared_memory_enabled);
        assert_eq!(cfg.memory.write_access, WriteAccess::Open);
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut cfg = Config::default();
        cfg.memory.write_access = WriteAccess::Enforced;
        cfg.bundles.custom_dir = Some("/srv/bundles".into());
        save_config(&path, &cfg).unwrap();

        let loaded = load_config(&path).unwrap();
        assert_eq!(loaded.memory.write_access, WriteAccess::Enforced);
        assert_eq!(loaded.bundles.custom_dir.as_deref(), Some("/srv/bundles"));
    }

    #[test]
    fn blank_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "  \n").unwrap();
        let cfg = load_config(&path).unwrap();
        assert!(cfg.bundles.load_builtins);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("failed to parse config"));
    }

    #[test]
    fn resolve_path_leaves_plain_paths_alone() {
        assert_eq!(resolve_path("/tmp/bundles"), PathBuf::from("/tmp/bundles"));
        assert_eq!(resolve_path("bundles"), PathBuf::from("bundles"));
    }
}
