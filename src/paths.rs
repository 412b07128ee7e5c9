//! Config directory resolution for sgczar
//!
//! # Path Resolution Priority
//!
//! For config_dir():
//! 1. `--config-dir` flag
//! 2. `SGCZAR_CONFIG_DIR` environment variable
//! 3. `./config` if it exists
//! 4. `XDG_CONFIG_HOME/sgczar` (if set)
//! 5. `~/.config/sgczar`

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Environment variable for config directory override
pub const ENV_CONFIG_DIR: &str = "SGCZAR_CONFIG_DIR";

/// Get the sgczar config directory path.
pub fn config_dir(flag: Option<&str>) -> Result<PathBuf> {
    let cwd = std::env::current_dir().context("Could not determine current directory")?;
    resolve_config_dir(
        flag,
        std::env::var(ENV_CONFIG_DIR).ok().as_deref(),
        std::env::var("XDG_CONFIG_HOME").ok().as_deref(),
        &cwd,
    )
}

fn resolve_config_dir(
    flag: Option<&str>,
    env: Option<&str>,
    xdg_config: Option<&str>,
    cwd: &Path,
) -> Result<PathBuf> {
    // 1. Explicit flag
    if let Some(dir) = flag {
        let path = expand(dir);
        log::debug!("Using config dir from --config-dir: {}", path.display());
        return Ok(path);
    }

    // 2. Environment variable override
    if let Some(dir) = env {
        let path = expand(dir);
        log::debug!("Using config dir from {}: {}", ENV_CONFIG_DIR, path.display());
        return Ok(path);
    }

    // 3. ./config next to where we run
    let local = cwd.join("config");
    if local.is_dir() {
        log::debug!("Using local config dir: {}", local.display());
        return Ok(local);
    }

    // 4. XDG_CONFIG_HOME
    if let Some(xdg) = xdg_config {
        let path = PathBuf::from(xdg).join("sgczar");
        log::debug!("Using XDG_CONFIG_HOME: {}", path.display());
        return Ok(path);
    }

    // 5. ~/.config/sgczar
    let home = dirs::home_dir().context("Could not determine home directory")?;
    let path = home.join(".config").join("sgczar");
    log::debug!("Using default config dir: {}", path.display());
    Ok(path)
}

/// Expand ~ and environment variables in a path string.
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or(std::borrow::Cow::Borrowed(path));
    PathBuf::from(expanded.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_flag_wins() {
        let cwd = TempDir::new().unwrap();
        let path = resolve_config_dir(Some("/flag"), Some("/env"), None, cwd.path()).unwrap();
        assert_eq!(path, PathBuf::from("/flag"));
    }

    #[test]
    fn test_env_before_local() {
        let cwd = TempDir::new().unwrap();
        std::fs::create_dir(cwd.path().join("config")).unwrap();
        let path = resolve_config_dir(None, Some("/env"), None, cwd.path()).unwrap();
        assert_eq!(path, PathBuf::from("/env"));
    }

    #[test]
    fn test_local_config_dir() {
        let cwd = TempDir::new().unwrap();
        std::fs::create_dir(cwd.path().join("config")).unwrap();
        let path = resolve_config_dir(None, None, Some("/xdg"), cwd.path()).unwrap();
        assert_eq!(path, cwd.path().join("config"));
    }

    #[test]
    fn test_xdg_fallback() {
        let cwd = TempDir::new().unwrap();
        let path = resolve_config_dir(None, None, Some("/xdg"), cwd.path()).unwrap();
        assert_eq!(path, PathBuf::from("/xdg/sgczar"));
    }

    #[test]
    fn test_expand_tilde() {
        let home = dirs::home_dir().unwrap();
        assert_eq!(expand("~/sg"), home.join("sg"));
        assert_eq!(expand("/abs/path"), PathBuf::from("/abs/path"));
    }
}
