//! Settings Registry
//!
//! Process-wide settings shared by the thread pool and the block cache.
//!
//! Reading a setting polls the rc file first. The file is stat'ed at most
//! once per poll period and re-parsed only when its modification time has
//! changed. Values set from code are overrides: once set, the file can no
//! longer change them for the life of the process.
//!
//! State is split across three locks so cheap throttle checks never queue
//! behind a slow stat or parse:
//!
//! * `timing` guards the poll period and the last poll instant,
//! * `file` guards the watch path, the last seen mtime and the log sink,
//! * `values` guards the setting values and their override flags.
//!
//! `timing` is never held together with another lock. The only nesting is
//! `file` then `values`: a reload holds `file` through stat, parse and apply,
//! and takes `values` briefly inside it. Nothing takes them in the opposite
//! order.
//!
//! The log sink runs with no lock held. A reload leaves its rules in a
//! pending slot; whichever thread is already forwarding delivers them after
//! its current call returns, so sink calls never overlap and arrive in reload
//! order. A sink may therefore call back into the registry.

use super::parser::SettingsParser;
use super::sink::{LogRuleSink, TracingLogSink};
use super::types::{
    default_watch_path, LogRule, ParsedSettings, PollStats, DEFAULT_POLL_PERIOD_SECS,
    DEFAULT_SYSTEM_CACHE_SIZE_MB, POLL_PERIOD_ENV, RC_FILE_ENV,
};
use crate::Result;
use anyhow::Context;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Instant, SystemTime};
use tracing::{debug, info, warn};

static SETTINGS: OnceLock<SettingsRegistry> = OnceLock::new();

/// Access the process-wide settings registry.
///
/// The registry is built on first use. Concurrent first calls all observe
/// the same instance.
///
/// ```no_run
/// vwsettings::vw_settings().set_system_cache_size(2048);
/// ```
pub fn vw_settings() -> &'static SettingsRegistry {
    SETTINGS.get_or_init(SettingsRegistry::from_env)
}

/// Poll throttle bookkeeping
struct PollTiming {
    period_secs: f64,
    /// `None` until the first poll, and again after the watch configuration changes
    last_poll: Option<Instant>,
}

/// Watched rc file bookkeeping
struct WatchedFile {
    path: PathBuf,
    /// Newest mtime seen; never moves backwards
    last_modification: Option<SystemTime>,
    sink: Arc<dyn LogRuleSink>,
    /// Rules of the latest reload not yet handed to the sink
    pending_rules: Option<Vec<LogRule>>,
    /// Set while some thread is calling the sink
    forwarding: bool,
}

/// Clears `forwarding` if the sink panics, so later reloads still forward
struct ForwardingGuard<'a> {
    file: &'a Mutex<WatchedFile>,
    finished: bool,
}

impl Drop for ForwardingGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.file.lock().forwarding = false;
        }
    }
}

struct SettingValues {
    default_num_threads: i32,
    default_num_threads_overridden: bool,
    system_cache_size: usize,
    system_cache_size_overridden: bool,
}

#[derive(Default)]
struct PollCounters {
    stats: AtomicU64,
    reloads: AtomicU64,
    failed_reloads: AtomicU64,
}

/// Runtime settings with rc file overrides.
///
/// There is no public constructor; use [`vw_settings`].
pub struct SettingsRegistry {
    timing: Mutex<PollTiming>,
    file: Mutex<WatchedFile>,
    values: Mutex<SettingValues>,
    counters: PollCounters,
}

impl SettingsRegistry {
    /// Build the registry, taking the watch path and poll period from the
    /// environment when set
    fn from_env() -> Self {
        let path = std::env::var_os(RC_FILE_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(default_watch_path);

        let period_secs = match std::env::var(POLL_PERIOD_ENV) {
            Ok(raw) => parse_poll_period(&raw).unwrap_or_else(|e| {
                warn!("Ignoring {}: {:#}", POLL_PERIOD_ENV, e);
                DEFAULT_POLL_PERIOD_SECS
            }),
            Err(_) => DEFAULT_POLL_PERIOD_SECS,
        };

        Self::with_watch(path, period_secs)
    }

    /// Build a registry watching `path`. Nothing is stat'ed until the first poll.
    pub(crate) fn with_watch(path: PathBuf, period_secs: f64) -> Self {
        let default_num_threads = i32::try_from(num_cpus::get()).unwrap_or(i32::MAX);

        debug!(
            "Settings defaults: {} thread(s), {} MB cache, watching {} every {}s",
            default_num_threads,
            DEFAULT_SYSTEM_CACHE_SIZE_MB,
            path.display(),
            period_secs
        );

        Self {
            timing: Mutex::new(PollTiming {
                period_secs,
                last_poll: None,
            }),
            file: Mutex::new(WatchedFile {
                path,
                last_modification: None,
                sink: Arc::new(TracingLogSink),
                pending_rules: None,
                forwarding: false,
            }),
            values: Mutex::new(SettingValues {
                default_num_threads,
                default_num_threads_overridden: false,
                system_cache_size: DEFAULT_SYSTEM_CACHE_SIZE_MB,
                system_cache_size_overridden: false,
            }),
            counters: PollCounters::default(),
        }
    }

    /// Change the watched rc file and check it immediately
    pub fn set_watch_path(&self, path: impl Into<PathBuf>) {
        let path = path.into();
        info!("Watching settings file: {}", path.display());
        self.file.lock().path = path;
        self.timing.lock().last_poll = None;
        self.poll();
    }

    /// The rc file currently watched
    pub fn watch_path(&self) -> PathBuf {
        self.file.lock().path.clone()
    }

    /// Change the minimum number of seconds between stats of the rc file and
    /// check it immediately. Zero, negative or NaN periods stat on every access.
    pub fn set_poll_period(&self, seconds: f64) {
        {
            let mut timing = self.timing.lock();
            timing.period_secs = seconds;
            timing.last_poll = None;
        }
        self.poll();
    }

    /// Minimum number of seconds between stats of the rc file
    pub fn poll_period(&self) -> f64 {
        self.timing.lock().period_secs
    }

    /// Install the consumer of log rules read from the rc file.
    ///
    /// Rules already forwarded are not replayed; the new sink sees the next
    /// reload.
    pub fn set_log_sink(&self, sink: Arc<dyn LogRuleSink>) {
        self.file.lock().sink = sink;
    }

    /// Default number of threads for block processing
    pub fn default_num_threads(&self) -> i32 {
        self.poll();
        self.values.lock().default_num_threads
    }

    /// Set the default number of threads. The rc file no longer affects it.
    pub fn set_default_num_threads(&self, num: i32) {
        let mut values = self.values.lock();
        values.default_num_threads = num;
        values.default_num_threads_overridden = true;
    }

    /// Shared block cache size, in megabytes
    pub fn system_cache_size(&self) -> usize {
        self.poll();
        self.values.lock().system_cache_size
    }

    /// Set the shared block cache size in megabytes. The rc file no longer
    /// affects it.
    pub fn set_system_cache_size(&self, size_mb: usize) {
        let mut values = self.values.lock();
        values.system_cache_size = size_mb;
        values.system_cache_size_overridden = true;
    }

    /// Counters describing the rc file polling done so far
    pub fn poll_stats(&self) -> PollStats {
        PollStats {
            stats: self.counters.stats.load(Ordering::Relaxed),
            reloads: self.counters.reloads.load(Ordering::Relaxed),
            failed_reloads: self.counters.failed_reloads.load(Ordering::Relaxed),
        }
    }

    /// Stat the rc file if the poll period has elapsed, reloading it when it
    /// has changed
    fn poll(&self) {
        {
            let mut timing = self.timing.lock();
            let now = Instant::now();
            if let Some(last) = timing.last_poll {
                if now.duration_since(last).as_secs_f64() < timing.period_secs {
                    return;
                }
            }
            timing.last_poll = Some(now);
        }

        if self.check_file() {
            self.forward_log_rules();
        }
    }

    /// Stat the rc file and reload it when it is newer than the last one seen.
    /// Returns true when new log rules are waiting to be forwarded.
    fn check_file(&self) -> bool {
        let mut file = self.file.lock();

        self.counters.stats.fetch_add(1, Ordering::Relaxed);
        let modified = match std::fs::metadata(&file.path).and_then(|meta| meta.modified()) {
            Ok(modified) => modified,
            Err(e) => {
                debug!("Settings file {} not available: {}", file.path.display(), e);
                return false;
            }
        };

        if let Some(last) = file.last_modification {
            if modified <= last {
                if modified < last {
                    debug!(
                        "Settings file {} is older than the last one loaded, ignoring it",
                        file.path.display()
                    );
                }
                return false;
            }
        }
        file.last_modification = Some(modified);

        match SettingsParser::load_from_file(&file.path) {
            Ok(parsed) => {
                info!("Reloading settings from: {}", file.path.display());
                self.apply_file_values(&parsed);
                self.counters.reloads.fetch_add(1, Ordering::Relaxed);
                file.pending_rules = Some(parsed.log_rules);
                // A thread already inside the sink picks these up next
                !file.forwarding
            }
            Err(e) => {
                warn!("Keeping current settings: {:#}", e);
                self.counters.failed_reloads.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    /// Hand pending log rules to the sink until none are left, without
    /// holding any lock during the sink call
    fn forward_log_rules(&self) {
        {
            let mut file = self.file.lock();
            if file.forwarding {
                return;
            }
            file.forwarding = true;
        }
        let mut guard = ForwardingGuard {
            file: &self.file,
            finished: false,
        };

        loop {
            let (sink, rules) = {
                let mut file = self.file.lock();
                let pending = file.pending_rules.take();
                match pending {
                    Some(rules) => (Arc::clone(&file.sink), rules),
                    None => {
                        file.forwarding = false;
                        guard.finished = true;
                        return;
                    }
                }
            };
            sink.apply_log_rules(&rules);
        }
    }

    fn apply_file_values(&self, parsed: &ParsedSettings) {
        let mut values = self.values.lock();

        if let Some(num) = parsed.default_num_threads {
            if values.default_num_threads_overridden {
                debug!("default_num_threads is set programmatically, ignoring file value {}", num);
            } else {
                values.default_num_threads = num;
            }
        }

        if let Some(size) = parsed.system_cache_size {
            if values.system_cache_size_overridden {
                debug!("system_cache_size is set programmatically, ignoring file value {}", size);
            } else {
                values.system_cache_size = size;
            }
        }
    }
}

/// Parse a poll period given in seconds
fn parse_poll_period(raw: &str) -> Result<f64> {
    raw.trim()
        .parse::<f64>()
        .with_context(|| format!("Invalid poll period: {}", raw))
}
