//! Settings Module
//!
//! Handles the settings registry, rc file parsing and log rule forwarding.

pub mod parser;
pub mod registry;
pub mod sink;
pub mod types;

pub use parser::SettingsParser;
pub use registry::{vw_settings, SettingsRegistry};
pub use sink::{LogRuleSink, TracingLogSink};
pub use types::*;
