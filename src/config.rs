//! Loading of the config directory: `settings.toml` plus one TOML file
//! per security group.

use anyhow::{Context, Result};
use authkit::{AuthSettings, DEFAULT_REGION, DEFAULT_SESSION_DURATION};
use serde::Deserialize;
use sgkit::{GroupConfig, GroupConfigs};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the optional run settings file.
pub const SETTINGS_FILE: &str = "settings.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("configuration directory not found: {}", .0.display())]
    MissingConfig(PathBuf),
}

/// Authentication settings, at top level or per environment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct EnvironmentSettings {
    pub region: Option<String>,
    pub profile: Option<String>,
    pub mfa: Option<bool>,
    /// Session lifetime in seconds
    pub mfa_duration: Option<u32>,
}

impl EnvironmentSettings {
    /// Fill unset fields from `fallback`.
    fn or(&self, fallback: &EnvironmentSettings) -> EnvironmentSettings {
        EnvironmentSettings {
            region: self.region.clone().or_else(|| fallback.region.clone()),
            profile: self.profile.clone().or_else(|| fallback.profile.clone()),
            mfa: self.mfa.or(fallback.mfa),
            mfa_duration: self.mfa_duration.or(fallback.mfa_duration),
        }
    }
}

/// Contents of `settings.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Settings {
    #[serde(flatten)]
    pub defaults: EnvironmentSettings,

    #[serde(default)]
    pub environments: BTreeMap<String, EnvironmentSettings>,
}

/// Command-line overrides for settings.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub region: Option<String>,
    pub profile: Option<String>,
    pub no_mfa: bool,
}

impl Settings {
    /// Effective settings for an environment: flags, then the environment
    /// table, then the top level, then built-in defaults.
    pub fn resolve(&self, environment: &str, overrides: &Overrides) -> AuthSettings {
        let merged = self
            .environments
            .get(environment)
            .map_or_else(|| self.defaults.clone(), |env| env.or(&self.defaults));

        AuthSettings {
            region: overrides
                .region
                .clone()
                .or(merged.region)
                .unwrap_or_else(|| DEFAULT_REGION.to_string()),
            profile: overrides.profile.clone().or(merged.profile),
            mfa: !overrides.no_mfa && merged.mfa.unwrap_or(false),
            mfa_duration: merged.mfa_duration.unwrap_or(DEFAULT_SESSION_DURATION),
        }
    }
}

/// A validated configuration directory.
#[derive(Debug, Clone)]
pub struct ConfigDir {
    path: PathBuf,
}

impl ConfigDir {
    pub fn open(path: PathBuf) -> Result<Self> {
        if !path.is_dir() {
            return Err(ConfigError::MissingConfig(path).into());
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load `settings.toml`, or defaults when it doesn't exist.
    pub fn settings(&self) -> Result<Settings> {
        let path = self.path.join(SETTINGS_FILE);
        if !path.exists() {
            log::debug!("No {} in {}", SETTINGS_FILE, self.path.display());
            return Ok(Settings::default());
        }
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Group files in the directory, sorted by name.
    pub fn group_files(&self) -> Result<Vec<PathBuf>> {
        let entries = fs::read_dir(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;

        let mut files = Vec::new();
        for entry in entries {
            let path = entry?.path();
            let is_toml = path.extension().is_some_and(|ext| ext == "toml");
            let is_settings = path.file_name().is_some_and(|name| name == SETTINGS_FILE);
            if path.is_file() && is_toml && !is_settings {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    /// Render and parse every group file.
    pub fn load_groups(&self, environment: &str, region: &str) -> Result<GroupConfigs> {
        let mut configs = GroupConfigs::new();
        for path in self.group_files()? {
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                log::warn!("Skipping group file with non UTF-8 name: {}", path.display());
                continue;
            };
            let content = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let config: GroupConfig = toml::from_str(&render(&content, environment, region))
                .with_context(|| format!("Failed to parse {}", path.display()))?;
            log::debug!("Loaded group {name} from {}", path.display());
            configs.insert(name, config);
        }
        Ok(configs)
    }
}

/// Substitute `${environment}` and `${region}` in a group file.
/// Other variables are left untouched.
pub fn render(content: &str, environment: &str, region: &str) -> String {
    shellexpand::env_with_context_no_errors(content, |var: &str| match var {
        "environment" => Some(environment),
        "region" => Some(region),
        _ => None,
    })
    .into_owned()
}
