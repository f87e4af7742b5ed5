//! vwsettings Library
//!
//! Process-wide runtime settings for the imaging pipeline.
//!
//! The thread pool and the shared block cache read their sizing from a single
//! registry, reached through [`vw_settings`]. Values can be set from code or
//! from the user's rc file (`~/.vwrc` by default), which is polled while the
//! process runs so edits take effect without a restart.
//!
//! ```no_run
//! use vwsettings::vw_settings;
//!
//! vw_settings().set_system_cache_size(2048);
//! let threads = vw_settings().default_num_threads();
//! # let _ = threads;
//! ```

pub mod settings;

pub use settings::{vw_settings, LogRule, LogRuleSink, SettingsRegistry, TracingLogSink};

/// Common error type for the settings library
pub type Result<T> = anyhow::Result<T>;
