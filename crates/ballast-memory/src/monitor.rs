use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

use crate::manager::CacheManager;
use crate::stats::CacheStats;

const MAILBOX_CAPACITY: usize = 32;
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Requests served by the monitor task, in arrival order.
#[derive(Debug)]
pub enum MonitorMessage {
    /// Run one monitoring step now, in addition to the periodic ones.
    Tick,
    /// Reply with the current statistics.
    Stats(oneshot::Sender<CacheStats>),
}

/// Spawn the task that owns `manager` and drives it on its monitoring
/// interval.
///
/// The task runs one forced resize pass first, then ticks every
/// `monitoring_interval` regardless of what the previous tick decided.
pub fn spawn_monitor(manager: CacheManager, runtime: &Handle) -> MonitorHandle {
    spawn_monitor_with_token(manager, runtime, CancellationToken::new())
}

/// [`spawn_monitor`] stopping when `token` (or the returned handle) is
/// cancelled.
pub fn spawn_monitor_with_token(
    manager: CacheManager,
    runtime: &Handle,
    token: CancellationToken,
) -> MonitorHandle {
    let (sender, receiver) = mpsc::channel(MAILBOX_CAPACITY);
    let task = runtime.spawn(run(manager, receiver, token.clone()));
    MonitorHandle {
        sender,
        token,
        task: Some(task),
    }
}

async fn run(
    mut manager: CacheManager,
    mut receiver: mpsc::Receiver<MonitorMessage>,
    token: CancellationToken,
) -> CacheManager {
    let interval = manager.options().monitoring_interval.max(MIN_INTERVAL);
    manager.start_at(Instant::now().into_std());
    let mut next_tick = Instant::now() + interval;

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = time::sleep_until(next_tick) => {
                manager.tick_at(Instant::now().into_std());
                next_tick = Instant::now() + interval;
            }
            message = receiver.recv() => match message {
                Some(MonitorMessage::Tick) => {
                    manager.tick_at(Instant::now().into_std());
                }
                Some(MonitorMessage::Stats(reply)) => {
                    // The requester may have given up waiting.
                    let _ = reply.send(manager.stats());
                }
                None => break,
            },
        }
    }

    tracing::debug!(target: "ballast.memory", "cache monitor stopped");
    manager
}

/// Handle to a running monitor task. Dropping it stops the task.
#[derive(Debug)]
pub struct MonitorHandle {
    sender: mpsc::Sender<MonitorMessage>,
    token: CancellationToken,
    task: Option<JoinHandle<CacheManager>>,
}

impl MonitorHandle {
    /// Request an extra tick. Returns `false` if the task has stopped or its
    /// mailbox is full.
    pub fn tick(&self) -> bool {
        match self.sender.try_send(MonitorMessage::Tick) {
            Ok(()) => true,
            Err(err) => {
                tracing::trace!(target: "ballast.memory", error = %err, "tick request dropped");
                false
            }
        }
    }

    /// Current statistics, or `None` once the task has stopped.
    pub async fn stats(&self) -> Option<CacheStats> {
        let (reply, response) = oneshot::channel();
        self.sender.send(MonitorMessage::Stats(reply)).await.ok()?;
        response.await.ok()
    }

    pub fn is_running(&self) -> bool {
        self.task
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Stop the task and hand back the manager it owned.
    ///
    /// Returns `None` if the task panicked or was aborted.
    pub async fn shutdown(mut self) -> Option<CacheManager> {
        self.token.cancel();
        let task = self.task.take()?;
        match task.await {
            Ok(manager) => Some(manager),
            Err(err) => {
                tracing::warn!(target: "ballast.memory", error = %err, "cache monitor task failed");
                None
            }
        }
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
