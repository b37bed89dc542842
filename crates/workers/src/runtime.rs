// crates/workers/src/runtime.rs
//! WorkerRuntime - OFFLINE/ONLINE lifecycle of one worker

use futures::FutureExt;
use hive_common::{Event, HiveError, HiveResult, JobPacket, ResultPacket, WorkerId, WorkerState};
use hive_fabric::SubscriptionId;
use parking_lot::Mutex;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::worker::{Worker, WorkerContext};

#[derive(Default)]
struct Lifecycle {
    state: WorkerState,
    subscriptions: Vec<SubscriptionId>,
    stop_tx: Option<watch::Sender<bool>>,
    ticker: Option<JoinHandle<()>>,
}

/// Drives one worker: subscribes its handlers on start, runs its proactive
/// loop, and tears both down on stop.
///
/// Every handler checks the shared `active` flag first, so events already in
/// flight when `stop` runs are dropped rather than executed.
pub struct WorkerRuntime {
    worker: Arc<dyn Worker>,
    ctx: WorkerContext,
    active: Arc<AtomicBool>,
    lifecycle: Mutex<Lifecycle>,
}

impl WorkerRuntime {
    pub fn new(worker: Arc<dyn Worker>, ctx: WorkerContext) -> Self {
        Self {
            worker,
            ctx,
            active: Arc::new(AtomicBool::new(false)),
            lifecycle: Mutex::new(Lifecycle::default()),
        }
    }

    pub fn id(&self) -> WorkerId {
        self.worker.id()
    }

    pub fn state(&self) -> WorkerState {
        self.lifecycle.lock().state
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// OFFLINE -> ONLINE. Starting an online worker does nothing.
    #[instrument(skip(self), fields(worker = %self.id()))]
    pub fn start(&self) -> HiveResult<()> {
        let mut lifecycle = self.lifecycle.lock();
        if lifecycle.state == WorkerState::Online {
            return Ok(());
        }
        let id = self.id();
        let runtime = Handle::try_current()
            .map_err(|_| HiveError::Bootstrap(format!("{id} started outside a tokio runtime")))?;
        let online = Event::status(id, WorkerState::Online)?;
        self.active.store(true, Ordering::Release);

        for &event_type in self.worker.subscriptions() {
            let worker = Arc::clone(&self.worker);
            let ctx = self.ctx.clone();
            let active = Arc::clone(&self.active);
            let sub = self.ctx.fabric().subscribe(event_type, move |event: Arc<Event>| {
                let worker = Arc::clone(&worker);
                let ctx = ctx.clone();
                let active = Arc::clone(&active);
                async move {
                    if !active.load(Ordering::Acquire) {
                        return Ok(());
                    }
                    worker.handle_event(&ctx, event).await
                }
            });
            lifecycle.subscriptions.push(sub);
        }

        if let Some(period) = self.worker.tick_interval() {
            let (stop_tx, stop_rx) = watch::channel(false);
            lifecycle.ticker = Some(runtime.spawn(proactive_loop(
                Arc::clone(&self.worker),
                self.ctx.clone(),
                Arc::clone(&self.active),
                period,
                stop_rx,
            )));
            lifecycle.stop_tx = Some(stop_tx);
        }

        lifecycle.state = WorkerState::Online;
        drop(lifecycle);

        self.ctx.publish(online);
        info!("{} is ONLINE", id);
        Ok(())
    }

    /// ONLINE -> OFFLINE. Waits up to `grace` for the proactive loop to exit;
    /// a loop that does not exit in time is aborted and reported as an error.
    #[instrument(skip(self), fields(worker = %self.id()))]
    pub async fn stop(&self, grace: Duration) -> HiveResult<()> {
        let id = self.id();
        let (ticker, stop_tx) = {
            let mut lifecycle = self.lifecycle.lock();
            if lifecycle.state == WorkerState::Offline {
                return Ok(());
            }
            self.active.store(false, Ordering::Release);
            for sub in lifecycle.subscriptions.drain(..) {
                self.ctx.fabric().unsubscribe(sub);
            }
            lifecycle.state = WorkerState::Offline;
            (lifecycle.ticker.take(), lifecycle.stop_tx.take())
        };

        if let Some(tx) = stop_tx {
            let _ = tx.send(true);
        }

        let outcome = match ticker {
            Some(mut handle) => match tokio::time::timeout(grace, &mut handle).await {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(HiveError::Worker(id.to_string(), format!("tick loop failed: {e}"))),
                Err(_) => {
                    handle.abort();
                    Err(HiveError::Worker(
                        id.to_string(),
                        format!("tick loop still running after {grace:?}"),
                    ))
                }
            },
            None => Ok(()),
        };

        if let Ok(event) = Event::status(id, WorkerState::Offline) {
            self.ctx.publish(event);
        }
        info!("{} is OFFLINE", id);
        outcome
    }

    /// Run a packet through the worker directly, bypassing the fabric.
    pub async fn execute(&self, packet: &JobPacket) -> ResultPacket {
        self.worker.execute_task(&self.ctx, packet).await
    }
}

async fn proactive_loop(
    worker: Arc<dyn Worker>,
    ctx: WorkerContext,
    active: Arc<AtomicBool>,
    period: Duration,
    mut stop_rx: watch::Receiver<bool>,
) {
    let id = worker.id();
    debug!(worker = %id, ?period, "proactive loop started");
    loop {
        tokio::select! {
            _ = stop_rx.changed() => break,
            _ = tokio::time::sleep(period) => {}
        }
        if !active.load(Ordering::Acquire) {
            break;
        }
        match AssertUnwindSafe(worker.tick(&ctx)).catch_unwind().await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(worker = %id, error = %e, "tick failed"),
            Err(_) => error!(worker = %id, "tick panicked"),
        }
    }
    debug!(worker = %id, "proactive loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use hive_common::{EventType, StatusReport};
    use hive_fabric::MessageFabric;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    struct Counter {
        ticks: Arc<AtomicUsize>,
        seen: mpsc::UnboundedSender<String>,
    }

    #[async_trait]
    impl Worker for Counter {
        fn id(&self) -> WorkerId {
            WorkerId::Librarian
        }

        fn subscriptions(&self) -> &'static [EventType] {
            &[EventType::Log]
        }

        async fn handle_event(&self, _ctx: &WorkerContext, event: Arc<Event>) -> anyhow::Result<()> {
            let msg = event.payload_str("message").unwrap_or_default();
            if msg == "explode" {
                panic!("worker fault");
            }
            self.seen.send(msg.to_string())?;
            Ok(())
        }

        fn tick_interval(&self) -> Option<Duration> {
            Some(Duration::from_secs(1))
        }

        async fn tick(&self, _ctx: &WorkerContext) -> anyhow::Result<()> {
            self.ticks.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Stubborn;

    #[async_trait]
    impl Worker for Stubborn {
        fn id(&self) -> WorkerId {
            WorkerId::Cortex
        }

        fn subscriptions(&self) -> &'static [EventType] {
            &[]
        }

        fn tick_interval(&self) -> Option<Duration> {
            Some(Duration::from_millis(10))
        }

        async fn tick(&self, _ctx: &WorkerContext) -> anyhow::Result<()> {
            // Ignores cancellation for far longer than any grace period.
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        }
    }

    fn counter() -> (Arc<Counter>, Arc<AtomicUsize>, mpsc::UnboundedReceiver<String>) {
        let ticks = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Arc::new(Counter {
                ticks: Arc::clone(&ticks),
                seen: tx,
            }),
            ticks,
            rx,
        )
    }

    #[test]
    fn failed_start_leaves_the_worker_offline() {
        let fabric = MessageFabric::new();
        let (worker, _, _) = counter();
        let runtime = WorkerRuntime::new(worker, WorkerContext::new(fabric.clone()));

        assert!(matches!(runtime.start(), Err(HiveError::Bootstrap(_))));
        assert_eq!(runtime.state(), WorkerState::Offline);
        assert!(!runtime.is_active());
        assert_eq!(fabric.subscriber_count(EventType::Log), 0);
    }

    #[tokio::test]
    async fn start_announces_and_subscribes() {
        let fabric = MessageFabric::new();
        let (status_tx, mut status_rx) = mpsc::unbounded_channel();
        fabric.subscribe(EventType::AgentStatus, move |event| {
            let tx = status_tx.clone();
            async move {
                tx.send(event.decode::<StatusReport>()?)?;
                Ok::<(), anyhow::Error>(())
            }
        });

        let (worker, _, mut seen) = counter();
        let runtime = WorkerRuntime::new(worker, WorkerContext::new(fabric.clone()));
        assert_eq!(runtime.state(), WorkerState::Offline);

        runtime.start().unwrap();
        runtime.start().unwrap();
        assert_eq!(runtime.state(), WorkerState::Online);
        assert_eq!(fabric.subscriber_count(EventType::Log), 1);

        let status = timeout(Duration::from_secs(1), status_rx.recv()).await.unwrap().unwrap();
        assert_eq!(status.worker, WorkerId::Librarian);
        assert_eq!(status.state, WorkerState::Online);

        fabric.publish(Event::log("test", "hello"));
        assert_eq!(timeout(Duration::from_secs(1), seen.recv()).await.unwrap().as_deref(), Some("hello"));

        runtime.stop(Duration::from_secs(1)).await.unwrap();
        assert_eq!(fabric.subscriber_count(EventType::Log), 0);
    }

    #[tokio::test]
    async fn stopped_worker_receives_nothing() {
        let fabric = MessageFabric::new();
        let (worker, _, mut seen) = counter();
        let runtime = WorkerRuntime::new(worker, WorkerContext::new(fabric.clone()));
        runtime.start().unwrap();
        runtime.stop(Duration::from_secs(1)).await.unwrap();
        assert!(!runtime.is_active());

        fabric.publish(Event::log("test", "late"));
        assert!(timeout(Duration::from_millis(50), seen.recv()).await.is_err());
    }

    #[tokio::test]
    async fn handler_fault_does_not_stop_worker() {
        let fabric = MessageFabric::new();
        let (worker, _, mut seen) = counter();
        let runtime = WorkerRuntime::new(worker, WorkerContext::new(fabric.clone()));
        runtime.start().unwrap();

        fabric.publish(Event::log("test", "explode"));
        fabric.publish(Event::log("test", "still here"));
        assert_eq!(
            timeout(Duration::from_secs(1), seen.recv()).await.unwrap().as_deref(),
            Some("still here")
        );
        assert_eq!(runtime.state(), WorkerState::Online);
    }

    #[tokio::test(start_paused = true)]
    async fn proactive_loop_ticks_until_stopped() {
        let fabric = MessageFabric::new();
        let (worker, ticks, _seen) = counter();
        let runtime = WorkerRuntime::new(worker, WorkerContext::new(fabric));
        runtime.start().unwrap();

        tokio::time::sleep(Duration::from_millis(3500)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 3);

        runtime.stop(Duration::from_secs(1)).await.unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn stuck_loop_is_aborted_and_reported() {
        let runtime = WorkerRuntime::new(Arc::new(Stubborn), WorkerContext::new(MessageFabric::new()));
        runtime.start().unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let err = runtime.stop(Duration::from_millis(100)).await.unwrap_err();
        assert!(matches!(err, HiveError::Worker(ref w, _) if w == "cortex"));
        assert_eq!(runtime.state(), WorkerState::Offline);
    }
}
