//! Sweep worker lifecycle: start, stop, on-demand runs and the thread loop

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};

use super::types::{SweepCommand, SweepStats, SweepStatsSnapshot, SweepTarget};
use crate::cache::config::SweepConfig;
use crate::cache::factory::SweepReport;
use crate::cache::traits::{CacheOperationError, CacheResult};
use crate::cache::types::timestamp_nanos;

const THREAD_NAME: &str = "stashbox-sweep";

/// Background thread that periodically sweeps cache factories
pub struct SweepWorker {
    config: SweepConfig,
    target: SweepTarget,
    command_sender: Sender<SweepCommand>,
    command_receiver: Receiver<SweepCommand>,
    shutdown: Arc<AtomicBool>,
    stats: Arc<SweepStats>,
    worker_handle: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for SweepWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SweepWorker")
            .field("config", &self.config)
            .field("running", &self.is_running())
            .finish()
    }
}

impl SweepWorker {
    /// Create a stopped worker
    pub fn new(target: SweepTarget, config: SweepConfig) -> Self {
        let (command_sender, command_receiver) = unbounded();
        Self {
            config,
            target,
            command_sender,
            command_receiver,
            shutdown: Arc::new(AtomicBool::new(false)),
            stats: Arc::new(SweepStats::default()),
            worker_handle: None,
        }
    }

    #[inline]
    pub fn config(&self) -> &SweepConfig {
        &self.config
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.worker_handle.is_some()
    }

    pub fn stats(&self) -> SweepStatsSnapshot {
        self.stats.snapshot()
    }

    /// Start the worker thread; starting a running worker is a no-op
    pub fn start(&mut self) -> CacheResult<()> {
        if self.worker_handle.is_some() {
            return Ok(());
        }
        self.shutdown.store(false, Ordering::Release);
        let handle = Self::spawn_worker(
            self.target.clone(),
            self.config,
            self.command_receiver.clone(),
            Arc::clone(&self.shutdown),
            Arc::clone(&self.stats),
        )?;
        self.worker_handle = Some(handle);
        log::info!(
            "Sweep worker started (interval {:?}, inactivity timeout {:?})",
            self.config.interval,
            self.config.inactivity_timeout
        );
        Ok(())
    }

    /// Stop the worker thread and wait for it to finish
    pub fn stop(&mut self) -> CacheResult<()> {
        let Some(handle) = self.worker_handle.take() else {
            return Ok(());
        };
        self.shutdown.store(true, Ordering::Release);
        let _ = self.command_sender.send(SweepCommand::Shutdown);

        let joined = handle.join();
        // Drop commands the thread never saw so a restart begins clean
        while self.command_receiver.try_recv().is_ok() {}
        if joined.is_err() {
            log::warn!("Sweep worker thread terminated by panic");
            return Err(CacheOperationError::WorkerUnavailable);
        }
        log::info!("Sweep worker stopped");
        Ok(())
    }

    /// Ask the running worker to sweep now
    pub fn run_now(&self) -> CacheResult<()> {
        if self.worker_handle.is_none() {
            return Err(CacheOperationError::WorkerUnavailable);
        }
        self.command_sender
            .send(SweepCommand::RunNow)
            .map_err(|_| CacheOperationError::WorkerUnavailable)
    }

    /// Sweep on the calling thread
    pub fn sweep_once(&self) -> SweepReport {
        run_sweep(&self.target, &self.config, &self.stats)
    }

    fn spawn_worker(
        target: SweepTarget,
        config: SweepConfig,
        commands: Receiver<SweepCommand>,
        shutdown: Arc<AtomicBool>,
        stats: Arc<SweepStats>,
    ) -> CacheResult<JoinHandle<()>> {
        thread::Builder::new()
            .name(THREAD_NAME.to_string())
            .spawn(move || {
                while !shutdown.load(Ordering::Acquire) {
                    match commands.recv_timeout(config.interval) {
                        Ok(SweepCommand::RunNow) | Err(RecvTimeoutError::Timeout) => {
                            if shutdown.load(Ordering::Acquire) {
                                break;
                            }
                            run_sweep(&target, &config, &stats);
                        }
                        Ok(SweepCommand::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
            })
            .map_err(|err| {
                log::error!("Failed to spawn sweep worker: {}", err);
                CacheOperationError::initialization_failed(format!(
                    "cannot spawn {}: {}",
                    THREAD_NAME, err
                ))
            })
    }
}

/// One sweep over every factory of `target`
fn run_sweep(target: &SweepTarget, config: &SweepConfig, stats: &SweepStats) -> SweepReport {
    let mut report = SweepReport::default();
    for factory in target.factories() {
        match catch_unwind(AssertUnwindSafe(|| factory.sweep(config))) {
            Ok(swept) => report.absorb(swept),
            Err(_) => {
                report.failures += 1;
                log::warn!("Sweep of domain {} panicked; skipped", factory.domain());
            }
        }
    }
    stats.record(&report, timestamp_nanos());
    report
}

impl Drop for SweepWorker {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}
