//! Background task driving recurring subscription checks.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::time::Duration;

use log::error;
use log::info;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::service::SyncService;

/// Task that periodically reconciles due subscriptions.
///
/// Passes never overlap: the loop awaits each pass before the next tick is
/// taken, so a slow pass delays the cadence rather than stacking work. Any
/// pass-level fault is logged and the loop keeps going.
pub struct SyncScheduler {
    service: Arc<SyncService>,
    poll_interval: Duration,
    running: AtomicBool,
    shutdown: Notify,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl SyncScheduler {
    pub fn new(service: Arc<SyncService>, poll_interval: Duration) -> Arc<Self> {
        info!(
            "Initializing SyncScheduler with poll interval {:?}",
            poll_interval
        );
        Arc::new(Self {
            service,
            poll_interval,
            running: AtomicBool::new(false),
            shutdown: Notify::new(),
            handle: Mutex::new(None),
        })
    }

    /// Starts the check loop.
    pub fn start(self: Arc<Self>) -> anyhow::Result<()> {
        if !self.running.load(Ordering::SeqCst) {
            self.running.store(true, Ordering::SeqCst);
            info!("Starting SyncScheduler check loop.");
            let handle = self.clone().spawn_check_loop();
            *self.handle.lock().expect("scheduler mutex poisoned") = Some(handle);
        }
        Ok(())
    }

    /// Stops the check loop and waits for it to exit. An in-flight pass
    /// runs to completion; the loop leaves at the tick boundary without
    /// starting another.
    pub async fn stop(self: Arc<Self>) -> anyhow::Result<()> {
        info!("Stopping SyncScheduler check loop.");
        self.running.store(false, Ordering::SeqCst);
        self.shutdown.notify_one();

        let handle = self
            .handle
            .lock()
            .expect("scheduler mutex poisoned")
            .take();
        if let Some(handle) = handle {
            handle.await?;
        }
        info!("SyncScheduler check loop stopped.");
        Ok(())
    }

    fn spawn_check_loop(self: Arc<Self>) -> JoinHandle<()> {
        let mut interval = tokio::time::interval(self.poll_interval);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = interval.tick() => {}
                    _ = self.shutdown.notified() => break,
                }
                if !self.running.load(Ordering::SeqCst) {
                    break;
                }
                match self.service.run_pass().await {
                    Ok(summary) if summary.failed > 0 => {
                        error!(
                            "Pass finished with failures. due={} failed={}",
                            summary.due, summary.failed
                        );
                    }
                    Ok(_) => {}
                    Err(e) => {
                        error!("Error running subscription check pass: {e}");
                    }
                }
            }
            info!("Check loop exited.");
        })
    }
}
