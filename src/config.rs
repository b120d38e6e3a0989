use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use lineage_rs::{BuilderConfig, LedgerOptions};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Which upstream tracker format the correspondence files hold
    pub source: SourceKind,
    /// Combined ledger of all chambers
    pub ledger: PathBuf,
    #[serde(default)]
    pub builder: BuilderConfig,
    #[serde(default)]
    pub ledger_options: LedgerOptions,
    #[serde(rename = "chamber", default)]
    pub chambers: Vec<ChamberConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// CSV of `frame,mother,child` links
    Table,
    /// JSON list of per-cell daughter masks
    Masks,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChamberConfig {
    /// JSON T×H×W label volume
    pub segmentation: PathBuf,
    pub correspondence: PathBuf,
    /// Where the relabeled JSON volume goes
    pub volume: PathBuf,
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Config = toml::from_str(&content).context("Failed to parse configuration")?;
        Ok(config)
    }
}
