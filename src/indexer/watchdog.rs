use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

struct InFlight {
    path: PathBuf,
    started: Instant,
    reported: bool,
}

#[derive(Default)]
struct Registry {
    next_id: AtomicU64,
    in_flight: Mutex<HashMap<u64, InFlight>>,
    stop: AtomicBool,
}

/// Background thread that reports parses running longer than `timeout`.
/// It only logs; slow parses always run to completion.
pub struct ParseWatchdog {
    registry: Arc<Registry>,
    handle: Option<JoinHandle<()>>,
}

/// Marks one parse as in flight until dropped.
pub struct ParseGuard {
    registry: Arc<Registry>,
    id: u64,
}

impl ParseWatchdog {
    pub fn start(timeout: Duration) -> Self {
        let registry = Arc::new(Registry::default());
        let poll = (timeout / 4).clamp(Duration::from_millis(10), Duration::from_millis(500));

        let thread_registry = Arc::clone(&registry);
        let handle = thread::Builder::new()
            .name("parse-watchdog".to_string())
            .spawn(move || {
                while !thread_registry.stop.load(Ordering::Acquire) {
                    thread::sleep(poll);
                    let mut in_flight = thread_registry.in_flight.lock();
                    for entry in in_flight.values_mut() {
                        if !entry.reported && entry.started.elapsed() >= timeout {
                            entry.reported = true;
                            tracing::warn!(
                                "ParseTimeoutWarning: {} still parsing after {:?}",
                                entry.path.display(),
                                timeout
                            );
                        }
                    }
                }
            })
            .ok();

        if handle.is_none() {
            tracing::warn!("Could not start parse watchdog thread");
        }

        Self { registry, handle }
    }

    pub fn track(&self, path: &Path) -> ParseGuard {
        let id = self.registry.next_id.fetch_add(1, Ordering::Relaxed);
        self.registry.in_flight.lock().insert(
            id,
            InFlight {
                path: path.to_path_buf(),
                started: Instant::now(),
                reported: false,
            },
        );
        ParseGuard {
            registry: Arc::clone(&self.registry),
            id,
        }
    }

    pub fn in_flight(&self) -> usize {
        self.registry.in_flight.lock().len()
    }

    /// Number of tracked parses already reported as slow.
    pub fn reported(&self) -> usize {
        self.registry
            .in_flight
            .lock()
            .values()
            .filter(|e| e.reported)
            .count()
    }
}

impl Drop for ParseGuard {
    fn drop(&mut self) {
        self.registry.in_flight.lock().remove(&self.id);
    }
}

impl Drop for ParseWatchdog {
    fn drop(&mut self) {
        self.registry.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_tracks_in_flight() {
        let watchdog = ParseWatchdog::start(Duration::from_secs(5));
        let a = watchdog.track(Path::new("/a.py"));
        let b = watchdog.track(Path::new("/b.py"));
        assert_eq!(watchdog.in_flight(), 2);
        drop(a);
        assert_eq!(watchdog.in_flight(), 1);
        drop(b);
        assert_eq!(watchdog.in_flight(), 0);
    }

    #[test]
    fn test_slow_parse_is_reported_once_and_not_abandoned() {
        let watchdog = ParseWatchdog::start(Duration::from_millis(20));
        let guard = watchdog.track(Path::new("/slow.c"));
        thread::sleep(Duration::from_millis(200));
        assert_eq!(watchdog.reported(), 1);
        assert_eq!(watchdog.in_flight(), 1);
        drop(guard);
        assert_eq!(watchdog.in_flight(), 0);
    }
}
