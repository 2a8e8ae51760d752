use crate::types::NodeId;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const DEFAULT_HOME_ROOT: &str = "other";
const DEFAULT_PLACEHOLDER_PAGE: &str = "extension://placeholder";

#[derive(Debug, Clone)]
pub struct Config {
    /// Root whose child region holds stash folders when no dedicated
    /// subfolder is configured.
    pub home_root: NodeId,
    /// Title of a dedicated stash subfolder under `home_root`. `None` means
    /// stash directly into the root's fenced-off region.
    pub home_folder: Option<String>,
    /// Page opened in place of a tab whose url the browser refuses.
    pub placeholder_page: String,
}

#[derive(Debug, Deserialize)]
struct FileConfig {
    home_root: Option<String>,
    home_folder: Option<String>,
    placeholder_page: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = config_path();
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let file_config: FileConfig = toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;

        Ok(Self {
            home_root: file_config
                .home_root
                .unwrap_or_else(|| DEFAULT_HOME_ROOT.to_string()),
            home_folder: file_config.home_folder.filter(|name| !name.is_empty()),
            placeholder_page: file_config
                .placeholder_page
                .unwrap_or_else(|| DEFAULT_PLACEHOLDER_PAGE.to_string()),
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            home_root: DEFAULT_HOME_ROOT.to_string(),
            home_folder: None,
            placeholder_page: DEFAULT_PLACEHOLDER_PAGE.to_string(),
        }
    }
}

fn config_path() -> PathBuf {
    if let Ok(dir) = env::var("XDG_CONFIG_HOME") {
        return Path::new(&dir).join("winstash").join("config.toml");
    }

    let home = env::var("HOME").unwrap_or_else(|_| ".".to_string());
    Path::new(&home)
        .join(".config")
        .join("winstash")
        .join("config.toml")
}
