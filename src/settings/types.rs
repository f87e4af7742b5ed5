//! Settings Types

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Minimum seconds between two stats of the rc file
pub const DEFAULT_POLL_PERIOD_SECS: f64 = 5.0;

/// Shared block cache size, in megabytes, when nothing else sets it
pub const DEFAULT_SYSTEM_CACHE_SIZE_MB: usize = 768;

/// Name of the rc file inside the user's home directory
pub const DEFAULT_RC_FILENAME: &str = ".vwrc";

/// Environment variable overriding the initial rc file path
pub const RC_FILE_ENV: &str = "VW_SETTINGS_FILE";

/// Environment variable overriding the initial poll period, in seconds
pub const POLL_PERIOD_ENV: &str = "VW_SETTINGS_POLL_PERIOD";

/// A log rule read from the `[logfile]` table of the rc file.
///
/// The registry does not interpret either field; they are handed to the
/// installed [`LogRuleSink`](super::LogRuleSink) as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRule {
    pub destination: String,
    pub rule_text: String,
}

/// Everything recognized in one read of the rc file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedSettings {
    pub default_num_threads: Option<i32>,
    pub system_cache_size: Option<usize>,
    pub log_rules: Vec<LogRule>,
}

/// Snapshot of the registry's polling counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollStats {
    /// Stats of the rc file, including ones that found no file
    pub stats: u64,
    /// Reloads whose contents were parsed and applied
    pub reloads: u64,
    /// Reloads abandoned because the file could not be read or parsed
    pub failed_reloads: u64,
}

/// On-disk layout of the rc file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(crate) struct RcFile {
    pub general: GeneralSection,
    pub logfile: BTreeMap<String, String>,
}

/// `[general]` table
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(crate) struct GeneralSection {
    pub default_num_threads: Option<i32>,
    pub system_cache_size: Option<usize>,
}

impl RcFile {
    pub(crate) fn into_parsed(self) -> ParsedSettings {
        ParsedSettings {
            default_num_threads: self.general.default_num_threads,
            system_cache_size: self.general.system_cache_size,
            log_rules: self
                .logfile
                .into_iter()
                .map(|(destination, rule_text)| LogRule {
                    destination,
                    rule_text,
                })
                .collect(),
        }
    }
}

/// Default rc file location: `~/.vwrc`, or `./.vwrc` without a home directory
pub fn default_watch_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(DEFAULT_RC_FILENAME)
}
