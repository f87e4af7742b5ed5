//! Settings Reload Integration Tests
//!
//! These drive the process-wide registry, so the scenarios run in order
//! inside a single test.

use anyhow::Result;
use parking_lot::Mutex;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, UNIX_EPOCH};
use tempfile::TempDir;
use vwsettings::{vw_settings, LogRule, LogRuleSink};

#[derive(Default)]
struct CollectingSink {
    batches: Mutex<Vec<Vec<LogRule>>>,
}

impl LogRuleSink for CollectingSink {
    fn apply_log_rules(&self, rules: &[LogRule]) {
        self.batches.lock().push(rules.to_vec());
    }
}

#[test]
fn test_global_settings_reload_lifecycle() -> Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("vwsettings=debug")
        .with_test_writer()
        .try_init();

    let temp_dir = TempDir::new()?;
    let rc_path = temp_dir.path().join("vwrc");
    let settings = vw_settings();
    let sink = Arc::new(CollectingSink::default());
    settings.set_log_sink(sink.clone());

    // No file yet: constructor defaults
    settings.set_watch_path(rc_path.clone());
    settings.set_poll_period(0.0);
    assert_eq!(settings.watch_path(), rc_path);
    assert_eq!(settings.default_num_threads(), num_cpus::get() as i32);
    assert_eq!(settings.system_cache_size(), 768);
    assert_eq!(settings.poll_stats().reloads, 0);

    // File values apply to settings that were never set from code
    write_rc(&rc_path, &create_test_rc(16, 2048), 1_000)?;
    assert_eq!(settings.system_cache_size(), 2048);
    assert_eq!(settings.default_num_threads(), 16);
    assert_eq!(sink.batches.lock().len(), 1);

    // A programmatic value is an override from now on
    settings.set_default_num_threads(4);
    write_rc(&rc_path, &create_test_rc(32, 4096), 2_000)?;
    assert_eq!(settings.default_num_threads(), 4);
    assert_eq!(settings.system_cache_size(), 4096);

    // A long poll period hides further edits until the watch is reconfigured
    settings.set_poll_period(3600.0);
    write_rc(&rc_path, &create_test_rc(8, 128), 3_000)?;
    assert_eq!(settings.system_cache_size(), 4096);
    settings.set_poll_period(3600.0);
    assert_eq!(settings.system_cache_size(), 128);
    assert_eq!(settings.default_num_threads(), 4);

    let batches = sink.batches.lock();
    assert_eq!(batches.len(), 3);
    assert_eq!(
        batches[2],
        vec![LogRule {
            destination: "console".to_string(),
            rule_text: "*.warning".to_string(),
        }]
    );

    Ok(())
}

fn write_rc(path: &Path, contents: &str, mtime_secs: u64) -> Result<()> {
    fs::write(path, contents)?;
    let file = fs::File::options().write(true).open(path)?;
    file.set_modified(UNIX_EPOCH + Duration::from_secs(mtime_secs))?;
    Ok(())
}

fn create_test_rc(threads: i32, cache_mb: usize) -> String {
    format!(
        r#"
[general]
default_num_threads = {}
system_cache_size = {}

[logfile]
console = "*.warning"
"#,
        threads, cache_mb
    )
}
