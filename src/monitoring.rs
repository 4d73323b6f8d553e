//! Periodic monitoring loop
//!
//! A background thread that fetches a batch, runs one cycle and then waits
//! for the configured interval. The stop signal is only observed between
//! cycles, so the last published snapshot is always a complete one.

use crate::alerts::AlertSnapshot;
use crate::config::ConfigWatcher;
use crate::engine::RiskEngine;
use crate::error::{MonitorError, SourceError};
use crate::ingest::RecordSource;
use crate::records::Severity;
use log::{debug, error, info, warn};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Fetch one batch and run one cycle synchronously
///
/// # Errors
///
/// Returns the `SourceError` if the batch could not be fetched; no cycle is
/// run in that case.
pub fn run_once(
    engine: &RiskEngine,
    source: &mut dyn RecordSource,
) -> Result<Arc<AlertSnapshot>, SourceError> {
    let batch = source.fetch()?;
    Ok(engine.run_cycle(&batch))
}

/// Drives the engine on a fixed interval from a background thread
pub struct MonitoringLoop {
    engine: Arc<RiskEngine>,
    interval: Duration,
    shutdown_sender: Option<Sender<()>>,
    thread_handle: Option<JoinHandle<()>>,
}

impl MonitoringLoop {
    /// Create a loop; nothing runs until `start`
    ///
    /// # Arguments
    ///
    /// * `engine` - Engine shared with synchronous callers
    /// * `interval` - Wait between the end of one cycle and the next
    pub fn new(engine: Arc<RiskEngine>, interval: Duration) -> Self {
        Self {
            engine,
            interval,
            shutdown_sender: None,
            thread_handle: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.thread_handle.is_some()
    }

    /// Start cycling in a background thread
    ///
    /// The first cycle runs immediately. If a watcher is given, the
    /// configuration file is checked for changes before every cycle.
    ///
    /// # Errors
    ///
    /// Returns `MonitorError::AlreadyRunning` if the loop was started before,
    /// or `MonitorError::ThreadSpawn` if the thread could not be created.
    pub fn start(
        &mut self,
        source: Box<dyn RecordSource>,
        watcher: Option<ConfigWatcher>,
    ) -> Result<(), MonitorError> {
        if self.is_running() {
            return Err(MonitorError::AlreadyRunning);
        }
        info!(
            "Starting monitoring loop on {} every {:?}",
            source.describe(),
            self.interval
        );

        let (shutdown_sender, shutdown_receiver) = mpsc::channel();
        let engine = Arc::clone(&self.engine);
        let interval = self.interval;

        let handle = thread::Builder::new()
            .name("monitoring-loop".to_string())
            .spawn(move || {
                Self::loop_thread(engine, source, watcher, interval, shutdown_receiver);
            })
            .map_err(|e| MonitorError::ThreadSpawn(e.to_string()))?;

        self.shutdown_sender = Some(shutdown_sender);
        self.thread_handle = Some(handle);
        Ok(())
    }

    /// Signal the loop to stop after the current cycle and wait for it
    ///
    /// # Errors
    ///
    /// Returns `MonitorError::ThreadPanicked` if the loop thread panicked.
    pub fn stop(&mut self) -> Result<(), MonitorError> {
        let Some(handle) = self.thread_handle.take() else {
            debug!("Monitoring loop already stopped");
            return Ok(());
        };

        info!("Stopping monitoring loop");
        if let Some(sender) = self.shutdown_sender.take() {
            // The thread may already have exited; a closed channel is fine
            let _ = sender.send(());
        }

        handle.join().map_err(|_| {
            error!("Failed to join monitoring thread");
            MonitorError::ThreadPanicked
        })?;
        info!("Monitoring loop stopped");
        Ok(())
    }

    fn loop_thread(
        engine: Arc<RiskEngine>,
        mut source: Box<dyn RecordSource>,
        mut watcher: Option<ConfigWatcher>,
        interval: Duration,
        shutdown: Receiver<()>,
    ) {
        loop {
            if let Some(watcher) = watcher.as_mut() {
                match watcher.poll(engine.config()) {
                    Ok(true) => info!(
                        "Applied updated thresholds from {}",
                        watcher.path().display()
                    ),
                    Ok(false) => {}
                    Err(e) => warn!("Keeping previous thresholds: {}", e),
                }
            }

            match run_once(&engine, source.as_mut()) {
                Ok(snapshot) => {
                    let critical = snapshot.at_least(Severity::Critical).len();
                    if critical > 0 {
                        warn!("Cycle {}: {} critical alerts", snapshot.cycle(), critical);
                    }
                }
                Err(e) => error!(
                    "Skipping cycle, failed to fetch input from {}: {}",
                    source.describe(),
                    e
                ),
            }

            match shutdown.recv_timeout(interval) {
                Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                    debug!("Monitoring loop received shutdown signal");
                    break;
                }
                Err(RecvTimeoutError::Timeout) => continue,
            }
        }
    }
}

impl Drop for MonitoringLoop {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            error!("Error stopping monitoring loop on drop: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::ingest::{MockRecordSource, RawBatch, StaticSource};
    use std::time::Instant;

    fn engine() -> Arc<RiskEngine> {
        Arc::new(RiskEngine::from_config(&Config::default()).unwrap())
    }

    fn wait_for_cycle(engine: &RiskEngine, cycle: u64) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if engine.snapshot().cycle() >= cycle {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        false
    }

    #[test]
    fn test_loop_runs_cycles_until_stopped() {
        let engine = engine();
        let mut monitor = MonitoringLoop::new(Arc::clone(&engine), Duration::from_millis(10));
        monitor
            .start(Box::new(StaticSource::new(RawBatch::default())), None)
            .unwrap();

        assert!(wait_for_cycle(&engine, 3));
        monitor.stop().unwrap();
        assert!(!monitor.is_running());

        let stopped_at = engine.snapshot().cycle();
        thread::sleep(Duration::from_millis(50));
        assert_eq!(engine.snapshot().cycle(), stopped_at);
    }

    #[test]
    fn test_stop_takes_effect_between_cycles() {
        let engine = engine();
        let mut monitor = MonitoringLoop::new(Arc::clone(&engine), Duration::from_secs(60));
        monitor
            .start(Box::new(StaticSource::new(RawBatch::default())), None)
            .unwrap();

        assert!(wait_for_cycle(&engine, 1));
        let started = Instant::now();
        monitor.stop().unwrap();
        assert!(started.elapsed() < Duration::from_secs(5));

        let snapshot = engine.snapshot();
        assert_eq!(snapshot.cycle(), 1);
        assert!(snapshot.completed_at().is_some());
    }

    #[test]
    fn test_failed_fetch_skips_cycle() {
        let mut source = MockRecordSource::new();
        source
            .expect_fetch()
            .returning(|| Err(SourceError::ReadError("input unavailable".to_string())));
        source
            .expect_describe()
            .returning(|| "mock source".to_string());

        let engine = engine();
        let mut monitor = MonitoringLoop::new(Arc::clone(&engine), Duration::from_millis(5));
        monitor.start(Box::new(source), None).unwrap();
        thread::sleep(Duration::from_millis(50));
        monitor.stop().unwrap();

        assert_eq!(engine.snapshot().cycle(), 0);
    }

    #[test]
    fn test_double_start_is_rejected() {
        let engine = engine();
        let mut monitor = MonitoringLoop::new(engine, Duration::from_secs(60));
        monitor
            .start(Box::new(StaticSource::default()), None)
            .unwrap();
        let second = monitor.start(Box::new(StaticSource::default()), None);
        assert!(matches!(second, Err(MonitorError::AlreadyRunning)));
        monitor.stop().unwrap();
    }

    #[test]
    fn test_run_once_uses_source() {
        let mut source = MockRecordSource::new();
        source.expect_fetch().times(1).returning(|| Ok(RawBatch::default()));

        let engine = engine();
        let snapshot = run_once(&engine, &mut source).unwrap();
        assert_eq!(snapshot.cycle(), 1);
    }
}
