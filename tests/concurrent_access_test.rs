//! Concurrent Access Integration Tests

use anyhow::Result;
use std::fs;
use std::sync::Barrier;
use tempfile::TempDir;
use vwsettings::{vw_settings, SettingsRegistry};

#[test]
fn test_concurrent_first_access_and_reload() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let rc_path = temp_dir.path().join("vwrc");
    fs::write(
        &rc_path,
        "[general]\ndefault_num_threads = 3\nsystem_cache_size = 256\n",
    )?;

    let threads = 16;
    let barrier = Barrier::new(threads);

    let instances: Vec<usize> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..threads)
            .map(|_| {
                scope.spawn(|| {
                    barrier.wait();
                    let settings = vw_settings();
                    settings as *const SettingsRegistry as usize
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|handle| handle.join().expect("accessor thread panicked"))
            .collect()
    });

    // Every thread saw the same registry
    assert!(instances.windows(2).all(|pair| pair[0] == pair[1]));

    let settings = vw_settings();
    settings.set_watch_path(rc_path.clone());
    settings.set_poll_period(0.0);

    std::thread::scope(|scope| {
        for _ in 0..threads {
            scope.spawn(|| {
                for _ in 0..100 {
                    assert_eq!(settings.default_num_threads(), 3);
                    assert_eq!(settings.system_cache_size(), 256);
                }
            });
        }
    });

    let stats = settings.poll_stats();
    assert_eq!(stats.reloads, 1);
    assert_eq!(stats.failed_reloads, 0);

    Ok(())
}
