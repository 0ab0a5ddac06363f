use serde::Deserialize;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::warn;

use crate::git::Identity;

const CONFIG_ENV: &str = "MDREVIEW_CONFIG";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MdreviewConfig {
    /// Document store used when `--repo` is not given.
    #[serde(default)]
    pub repo: Option<PathBuf>,
    /// git executable, if not the one on PATH.
    #[serde(default)]
    pub git: Option<String>,
    /// Identity remembered from an earlier `whoami`.
    #[serde(default)]
    pub identity: Option<Identity>,
}

pub fn config_path() -> PathBuf {
    if let Some(path) = std::env::var_os(CONFIG_ENV) {
        return PathBuf::from(path);
    }
    let mut path = dirs_home().unwrap_or_else(|| PathBuf::from("."));
    path.push(".config");
    path.push("mdreview");
    path.push("config.toml");
    path
}

fn dirs_home() -> Option<PathBuf> {
    std::env::var_os("HOME").map(PathBuf::from)
}

pub fn parse_config(contents: &str) -> Result<MdreviewConfig, toml::de::Error> {
    toml::from_str(contents)
}

/// Load config from `~/.config/mdreview/config.toml`, falling back to defaults.
pub fn load_config() -> MdreviewConfig {
    let path = config_path();

    let contents = match std::fs::read_to_string(&path) {
        Ok(c) => c,
        Err(_) => return MdreviewConfig::default(),
    };

    match parse_config(&contents) {
        Ok(config) => config,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "ignoring unreadable config");
            MdreviewConfig::default()
        }
    }
}

/// Remember `identity` in the config file. Other keys are preserved.
pub fn save_identity(identity: &Identity) -> Result<PathBuf> {
    let path = config_path();
    save_identity_to(&path, identity)?;
    Ok(path)
}

fn save_identity_to(path: &std::path::Path, identity: &Identity) -> Result<()> {
    // keep keys this version does not know about
    let mut table = if let Ok(contents) = std::fs::read_to_string(path) {
        contents
            .parse::<toml::Table>()
            .unwrap_or_else(|_| toml::Table::new())
    } else {
        toml::Table::new()
    };

    let mut entry = toml::Table::new();
    entry.insert("name".to_string(), toml::Value::String(identity.name.clone()));
    entry.insert(
        "email".to_string(),
        toml::Value::String(identity.email.clone()),
    );
    table.insert("identity".to_string(), toml::Value::Table(entry));

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }

    let toml_string = toml::to_string_pretty(&table)?;
    std::fs::write(path, toml_string).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}
