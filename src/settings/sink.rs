//! Log Rule Forwarding

use super::types::LogRule;
use tracing::info;

/// Receives the log rules of every successfully reloaded rc file.
///
/// Each reload delivers the complete rule set from the file, possibly empty;
/// implementations should replace whatever rules they applied before. Calls
/// are serialized by the registry and made with none of its locks held, so
/// an implementation may read or change settings.
pub trait LogRuleSink: Send + Sync {
    fn apply_log_rules(&self, rules: &[LogRule]);
}

/// Default sink, which only reports the rules through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogSink;

impl LogRuleSink for TracingLogSink {
    fn apply_log_rules(&self, rules: &[LogRule]) {
        info!("Received {} log rule(s) from settings file", rules.len());
        for rule in rules {
            info!("  {} => {}", rule.destination, rule.rule_text);
        }
    }
}
