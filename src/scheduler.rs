//! Debounced evaluation scheduling
//!
//! Edits and ticks do not evaluate immediately; they arm a trailing-edge
//! debounce timer instead. A burst of requests collapses into a single
//! evaluation that runs once the burst has settled. Structural edits use a
//! longer settle window than time ticks, so an animation playhead stays
//! responsive while a user dragging a slider does not thrash the engine.

use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, trace};

/// Settle windows for the two request classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Quiet period after the last structural edit or parameter change.
    pub edit_settle: Duration,
    /// Quiet period after the last time tick. Only applies to graphs that
    /// actually consume the session clock.
    pub time_settle: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            edit_settle: Duration::from_millis(250),
            time_settle: Duration::from_millis(16),
        }
    }
}

enum Msg {
    Request { fire_at: Instant },
    Shutdown,
}

/// A single-slot trailing-edge debounce timer backed by a worker thread.
///
/// Each request replaces any pending one; the callback fires once the
/// latest deadline passes with no newer request. The callback runs on the
/// worker thread.
pub struct DebounceScheduler {
    tx: Sender<Msg>,
    worker: Option<JoinHandle<()>>,
}

impl DebounceScheduler {
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn() + Send + 'static,
    {
        let (tx, rx) = mpsc::channel::<Msg>();
        let worker = thread::spawn(move || {
            let mut pending: Option<Instant> = None;
            loop {
                let msg = match pending {
                    None => match rx.recv() {
                        Ok(msg) => Some(msg),
                        Err(_) => break,
                    },
                    Some(fire_at) => {
                        let now = Instant::now();
                        if fire_at <= now {
                            None
                        } else {
                            match rx.recv_timeout(fire_at - now) {
                                Ok(msg) => Some(msg),
                                Err(RecvTimeoutError::Timeout) => None,
                                Err(RecvTimeoutError::Disconnected) => break,
                            }
                        }
                    }
                };

                match msg {
                    Some(Msg::Request { fire_at }) => {
                        trace!("debounce re-armed");
                        pending = Some(fire_at);
                    }
                    Some(Msg::Shutdown) => break,
                    None => {
                        // Deadline passed with no newer request.
                        pending = None;
                        debug!("debounce settled, running callback");
                        callback();
                    }
                }
            }
        });
        Self {
            tx,
            worker: Some(worker),
        }
    }

    /// Arm (or re-arm) the timer to fire after `settle`.
    pub fn request(&self, settle: Duration) {
        let _ = self.tx.send(Msg::Request {
            fire_at: Instant::now() + settle,
        });
    }
}

impl Drop for DebounceScheduler {
    fn drop(&mut self) {
        let _ = self.tx.send(Msg::Shutdown);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_burst_collapses_to_one_callback() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        let scheduler = DebounceScheduler::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        for _ in 0..20 {
            scheduler.request(Duration::from_millis(30));
            thread::sleep(Duration::from_millis(1));
        }
        thread::sleep(Duration::from_millis(120));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_separate_bursts_fire_separately() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        let scheduler = DebounceScheduler::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        scheduler.request(Duration::from_millis(10));
        thread::sleep(Duration::from_millis(60));
        scheduler.request(Duration::from_millis(10));
        thread::sleep(Duration::from_millis(60));
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_drop_stops_worker_without_firing() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        {
            let scheduler = DebounceScheduler::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
            scheduler.request(Duration::from_millis(200));
        }
        thread::sleep(Duration::from_millis(250));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_default_config_windows() {
        let config = SchedulerConfig::default();
        assert!(config.time_settle < config.edit_settle);
    }
}
