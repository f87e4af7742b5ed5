//! rc File Parser

use super::types::{ParsedSettings, RcFile};
use crate::Result;
use anyhow::Context;
use std::path::Path;

/// Turns rc file contents into recognized settings and log rules
pub struct SettingsParser;

impl SettingsParser {
    /// Parse rc file text
    pub fn parse(text: &str) -> Result<ParsedSettings> {
        let rc: RcFile = toml::from_str(text).context("Failed to parse settings text")?;
        Ok(rc.into_parsed())
    }

    /// Read and parse the rc file at `path`
    pub fn load_from_file(path: &Path) -> Result<ParsedSettings> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file: {}", path.display()))?;

        Self::parse(&content)
            .with_context(|| format!("Failed to parse settings file: {}", path.display()))
    }
}
