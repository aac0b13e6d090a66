use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::style::Style;

/// What to do with teardown failures other than "already absent"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum TeardownMode {
    /// Attempt every row, then fail with the collected errors
    #[default]
    Report,
    /// Attempt every row and only log failures
    Ignore,
}

/// How a merged view treats two datasets with a row of the same name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum CollisionPolicy {
    /// The row of the later-loaded dataset wins
    #[default]
    LastWins,
    Reject,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StyleConfig {
    /// Styles applied left to right, e.g. `["named", "camel-and-unders"]`
    #[serde(default)]
    pub chain: Vec<String>,
    pub prefix: Option<String>,
    pub suffix: Option<String>,
}

impl StyleConfig {
    pub fn to_style(&self) -> crate::Result<Style> {
        let mut styles = Vec::new();
        if self.prefix.is_some() || self.suffix.is_some() {
            styles.push(Style::Trimmed {
                prefix: self.prefix.clone(),
                suffix: self.suffix.clone(),
            });
        }
        for name in &self.chain {
            styles.push(name.parse()?);
        }
        Ok(match styles.len() {
            0 => Style::default(),
            1 => styles.remove(0),
            _ => Style::Chain(styles),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DataloadConfig {
    pub database: Option<String>,
    pub fixtures: Option<String>,
    #[serde(default)]
    pub teardown: TeardownMode,
    #[serde(default)]
    pub collisions: CollisionPolicy,
    #[serde(default)]
    pub style: StyleConfig,
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("dataload.toml")
}

pub fn default_database_path_in(base: &Path) -> PathBuf {
    base.join(".dataload").join("fixtures.db")
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Option<DataloadConfig>> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path)?;
    let config: DataloadConfig = toml::from_str(&contents)?;
    Ok(Some(config))
}

pub fn write_config(path: &Path, config: &DataloadConfig, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("config already exists at {} (use --force to overwrite)", path.display());
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(path, contents)?;
    Ok(())
}

pub fn ensure_db_dir(db_path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
