//! Background worker for router lifecycle events.
//!
//! Provides a generic `BackgroundWorker<R>` that processes tasks from an mpsc channel
//! via a `BackgroundRunnable` implementation, with optional periodic tick callbacks,
//! and the `RegistrationRunnable` that applies `RouterEvent`s to the router registry.

use std::sync::Arc;

use async_trait::async_trait;
use hyperroute_core::RouterDescriptor;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use super::registry::RouterRegistry;

// ---------------------------------------------------------------------------
// BackgroundRunnable trait
// ---------------------------------------------------------------------------

/// Trait for task handlers executed by `BackgroundWorker`.
///
/// Implementors define how individual tasks are processed, what happens on each
/// periodic tick, and how to clean up on shutdown.
#[async_trait]
pub trait BackgroundRunnable: Send + 'static {
    /// The type of task this runnable processes.
    type Task: Send + 'static;

    /// Process a single task.
    async fn run(&mut self, task: Self::Task);

    /// Called periodically (on each tick interval). Default is a no-op.
    async fn on_tick(&mut self) {}

    /// Called once when the worker is shutting down. Default is a no-op.
    async fn shutdown(&mut self) {}
}

// ---------------------------------------------------------------------------
// RouterEvent
// ---------------------------------------------------------------------------

/// Lifecycle change of a contributed router.
#[derive(Debug)]
pub enum RouterEvent {
    /// A plugin contributed a router.
    Registered(RouterDescriptor),
    /// A plugin's router changed; its binding is rebuilt.
    Updated(RouterDescriptor),
    /// A plugin withdrew the router it registered under `key`.
    Unregistered { key: String },
}

// ---------------------------------------------------------------------------
// BackgroundWorker
// ---------------------------------------------------------------------------

/// Generic background worker that processes tasks via an mpsc channel.
///
/// The worker spawns a tokio task that:
/// 1. Listens for tasks on the mpsc channel
/// 2. Calls `BackgroundRunnable::run()` for each task
/// 3. Periodically calls `BackgroundRunnable::on_tick()` at the configured interval
/// 4. Calls `BackgroundRunnable::shutdown()` when stopped
pub struct BackgroundWorker<R: BackgroundRunnable> {
    tx: Option<mpsc::Sender<R::Task>>,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl<R: BackgroundRunnable> BackgroundWorker<R> {
    /// Start the background worker with the given runnable and tick interval.
    ///
    /// Returns a `BackgroundWorker` handle that can be used to submit tasks
    /// and stop the worker. The channel capacity is 256.
    pub fn start(runnable: R, tick_interval_ms: u64) -> Self {
        Self::start_with_capacity(runnable, tick_interval_ms, 256)
    }

    /// Like [`start`](Self::start) with an explicit channel capacity.
    ///
    /// A zero tick interval is raised to one millisecond.
    pub fn start_with_capacity(mut runnable: R, tick_interval_ms: u64, capacity: usize) -> Self {
        let (tx, mut rx) = mpsc::channel::<R::Task>(capacity.max(1));
        let (shutdown_tx, mut shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            let mut tick_interval =
                tokio::time::interval(std::time::Duration::from_millis(tick_interval_ms.max(1)));
            // Skip the first immediate tick so on_tick doesn't fire at startup.
            tick_interval.tick().await;

            loop {
                tokio::select! {
                    task = rx.recv() => {
                        match task {
                            Some(t) => runnable.run(t).await,
                            None => break, // Channel closed.
                        }
                    }
                    _ = tick_interval.tick() => {
                        runnable.on_tick().await;
                    }
                    _ = &mut shutdown_rx => {
                        rx.close();
                        while let Some(t) = rx.recv().await {
                            runnable.run(t).await;
                        }
                        break;
                    }
                }
            }

            runnable.shutdown().await;
        });

        Self {
            tx: Some(tx),
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    /// Submit a task to the worker.
    ///
    /// # Errors
    ///
    /// Returns an error if the worker has been stopped or the channel is full.
    pub async fn submit(&self, task: R::Task) -> anyhow::Result<()> {
        match &self.tx {
            Some(tx) => tx
                .send(task)
                .await
                .map_err(|_| anyhow::anyhow!("worker channel closed")),
            None => Err(anyhow::anyhow!("worker not running")),
        }
    }

    /// A sender for producers that outlive this handle's borrow, e.g. plugin
    /// hosts running on other tasks. `None` once stopped.
    #[must_use]
    pub fn sender(&self) -> Option<mpsc::Sender<R::Task>> {
        self.tx.clone()
    }

    /// Stop the worker, waiting for the worker task to complete.
    ///
    /// Tasks already queued are processed before the runnable shuts down.
    pub async fn stop(&mut self) {
        // Closing the task channel lets the loop drain and exit.
        self.tx.take();
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            if let Err(err) = handle.await {
                error!(error = %err, "background worker task failed");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// RegistrationRunnable
// ---------------------------------------------------------------------------

/// Applies router lifecycle events to the registry.
///
/// Configuration errors are logged by the registry and do not stop the
/// worker. Each tick logs a registry summary.
pub struct RegistrationRunnable {
    registry: Arc<RouterRegistry>,
    applied: u64,
    failed: u64,
}

impl RegistrationRunnable {
    pub fn new(registry: Arc<RouterRegistry>) -> Self {
        Self {
            registry,
            applied: 0,
            failed: 0,
        }
    }
}

#[async_trait]
impl BackgroundRunnable for RegistrationRunnable {
    type Task = RouterEvent;

    async fn run(&mut self, event: RouterEvent) {
        let outcome = match &event {
            RouterEvent::Registered(descriptor) => self.registry.register(descriptor).map(drop),
            RouterEvent::Updated(descriptor) => self.registry.update(descriptor).map(drop),
            RouterEvent::Unregistered { key } => {
                self.registry.unregister(key);
                Ok(())
            }
        };
        match outcome {
            Ok(()) => self.applied += 1,
            Err(err) => {
                self.failed += 1;
                debug!(event = ?event, error = %err, "router event rejected");
            }
        }
    }

    async fn on_tick(&mut self) {
        debug!(
            resources = self.registry.len(),
            version = self.registry.version(),
            applied = self.applied,
            failed = self.failed,
            "router registry summary"
        );
    }

    async fn shutdown(&mut self) {
        info!(
            applied = self.applied,
            failed = self.failed,
            "registration worker stopped"
        );
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
