// crates/orchestrator/src/orchestrator.rs
//! SwarmOrchestrator - one bounded mission of the swarm against one target

use hive_common::{
    Archive, Event, EventType, HiveError, HiveResult, MissionConfig, MissionReport,
    MissionReporter, NullArchive,
};
use hive_fabric::MessageFabric;
use hive_threat::ThreatScoringEngine;
use hive_workers::{roster, Arsenal, Worker, WorkerContext, WorkerRuntime};
use parking_lot::Mutex;
use serde_json::json;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::{broadcast, watch};
use tokio::time::Instant;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::admission::AdmissionController;
use crate::dashboard::{DashboardFeed, DashboardUpdate};
use crate::registry::WorkerRegistry;
use crate::tally::MissionTally;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissionPhase {
    Initializing,
    Running,
    Completing,
    Completed,
    /// The mission was dropped before it could tear down.
    Failed,
}

impl fmt::Display for MissionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MissionPhase::Initializing => "INITIALIZING",
            MissionPhase::Running => "RUNNING",
            MissionPhase::Completing => "COMPLETING",
            MissionPhase::Completed => "COMPLETED",
            MissionPhase::Failed => "FAILED",
        })
    }
}

/// Runs missions: builds a fresh fabric, admission controller and roster per
/// mission, seeds the target, waits for the timeout or cancellation, then
/// tears everything down and reports.
///
/// One mission runs at a time per orchestrator. Missions on different
/// orchestrators share nothing.
pub struct SwarmOrchestrator {
    config: MissionConfig,
    arsenal: Arc<Arsenal>,
    engine: Arc<ThreatScoringEngine>,
    archive: Arc<dyn Archive>,
    reporter: Option<Arc<dyn MissionReporter>>,
    workers: Option<Vec<Arc<dyn Worker>>>,
    dashboard: DashboardFeed,
    phase: watch::Sender<MissionPhase>,
    registry: Mutex<Option<Arc<WorkerRegistry>>>,
    busy: AtomicBool,
}

impl SwarmOrchestrator {
    pub fn new(config: MissionConfig) -> Self {
        let (phase, _) = watch::channel(MissionPhase::Initializing);
        Self {
            dashboard: DashboardFeed::new(config.dashboard_capacity),
            config,
            arsenal: Arc::new(Arsenal::default()),
            engine: Arc::new(ThreatScoringEngine::new()),
            archive: Arc::new(NullArchive),
            reporter: None,
            workers: None,
            phase,
            registry: Mutex::new(None),
            busy: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn with_arsenal(mut self, arsenal: Arsenal) -> Self {
        self.arsenal = Arc::new(arsenal);
        self
    }

    #[must_use]
    pub fn with_engine(mut self, engine: ThreatScoringEngine) -> Self {
        self.engine = Arc::new(engine);
        self
    }

    #[must_use]
    pub fn with_archive(mut self, archive: Arc<dyn Archive>) -> Self {
        self.archive = archive;
        self
    }

    #[must_use]
    pub fn with_reporter(mut self, reporter: Arc<dyn MissionReporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    /// Replace the standard roster. The Cortex is always added.
    #[must_use]
    pub fn with_workers(mut self, workers: Vec<Arc<dyn Worker>>) -> Self {
        self.workers = Some(workers);
        self
    }

    pub fn config(&self) -> &MissionConfig {
        &self.config
    }

    pub fn phase(&self) -> MissionPhase {
        *self.phase.borrow()
    }

    pub fn watch_phase(&self) -> watch::Receiver<MissionPhase> {
        self.phase.subscribe()
    }

    pub fn dashboard(&self) -> broadcast::Receiver<DashboardUpdate> {
        self.dashboard.subscribe()
    }

    /// Workers of the running mission, if one is running.
    pub fn registry(&self) -> Option<Arc<WorkerRegistry>> {
        self.registry.lock().clone()
    }

    /// Run until the mission timeout.
    pub async fn run(&self, target: &str) -> HiveResult<MissionReport> {
        self.run_until(target, std::future::pending()).await
    }

    /// Run until the mission timeout or until `shutdown` resolves.
    ///
    /// Only bootstrap failures are errors: everything after RUNNING is
    /// best-effort and ends in a report.
    #[instrument(skip(self, shutdown))]
    pub async fn run_until<F>(&self, target: &str, shutdown: F) -> HiveResult<MissionReport>
    where
        F: Future<Output = ()>,
    {
        if self.busy.swap(true, Ordering::AcqRel) {
            return Err(HiveError::Bootstrap("a mission is already running".into()));
        }
        let mut guard = MissionGuard {
            orchestrator: self,
            live: None,
        };
        self.mission(target, shutdown, &mut guard).await
    }

    async fn mission<F>(
        &self,
        target: &str,
        shutdown: F,
        guard: &mut MissionGuard<'_>,
    ) -> HiveResult<MissionReport>
    where
        F: Future<Output = ()>,
    {
        self.phase.send_replace(MissionPhase::Initializing);
        let mission_id = Uuid::new_v4();
        let started_at = chrono::Utc::now();
        let started = Instant::now();

        self.config.validate().map_err(|e| HiveError::Bootstrap(e.to_string()))?;
        let fabric = MessageFabric::with_history(self.config.history_limit);
        let tally = MissionTally::new();
        tally.attach(&fabric);
        self.dashboard.attach(&fabric);

        let registry = Arc::new(self.bootstrap(&fabric)?);
        guard.live = Some(Arc::clone(&registry));
        if let Err(e) = registry.start_all() {
            registry.stop_all(self.config.stop_timeout()).await;
            guard.live = None;
            return Err(HiveError::Bootstrap(e.to_string()));
        }
        *self.registry.lock() = Some(Arc::clone(&registry));

        self.phase.send_replace(MissionPhase::Running);
        info!(%mission_id, %target, "mission RUNNING");
        fabric.publish(Event::from_body(
            EventType::SystemStart,
            Event::ORCHESTRATOR,
            &json!({ "mission_id": mission_id, "target": target }),
        )?);
        fabric.publish(Event::target_acquired(Event::ORCHESTRATOR, target));

        let timeout = self.config.mission_timeout();
        tokio::select! {
            _ = tokio::time::sleep(timeout) => info!(?timeout, "mission timeout reached"),
            _ = shutdown => info!("mission cancelled"),
        }

        self.phase.send_replace(MissionPhase::Completing);
        let failures = registry.stop_all(self.config.stop_timeout()).await;
        if !failures.is_empty() {
            warn!(count = failures.len(), "some workers did not stop cleanly");
        }
        self.registry.lock().take();
        guard.live = None;

        tally.log_summary();
        let report = MissionReport {
            mission_id,
            target_url: target.to_string(),
            started_at,
            duration: started.elapsed(),
            events: fabric.history(),
            findings: tally.findings(),
            severity_counts: tally.severity_counts(),
            jobs: tally.jobs(),
        };
        if let Some(reporter) = &self.reporter {
            if let Err(e) = reporter.report(&report) {
                warn!(error = %e, "mission reporter failed");
            }
        }

        self.phase.send_replace(MissionPhase::Completed);
        info!(%mission_id, findings = report.finding_count(), "mission COMPLETED");
        Ok(report)
    }

    /// Admission controller plus roster, all on `fabric`.
    fn bootstrap(&self, fabric: &MessageFabric) -> HiveResult<WorkerRegistry> {
        let cortex = Arc::new(
            AdmissionController::new(self.config.admission.clone())
                .with_tick(self.config.tick_interval()),
        );
        let ctx = WorkerContext::new(fabric.clone())
            .with_gate(cortex.clone())
            .with_arsenal(Arc::clone(&self.arsenal))
            .with_engine(Arc::clone(&self.engine))
            .with_archive(Arc::clone(&self.archive));

        let workers = self
            .workers
            .clone()
            .unwrap_or_else(|| roster(&self.config));
        let mut registry = WorkerRegistry::new();
        registry.register(WorkerRuntime::new(cortex, ctx.clone()));
        for worker in workers {
            registry.register(WorkerRuntime::new(worker, ctx.clone()));
        }
        if registry.is_empty() {
            return Err(HiveError::Bootstrap("empty roster".into()));
        }
        Ok(registry)
    }
}

/// Releases the orchestrator when `run_until` ends, and tears the roster
/// down when the mission future is dropped before it could do so itself.
struct MissionGuard<'a> {
    orchestrator: &'a SwarmOrchestrator,
    /// Set while workers may be running.
    live: Option<Arc<WorkerRegistry>>,
}

impl Drop for MissionGuard<'_> {
    fn drop(&mut self) {
        let orchestrator = self.orchestrator;
        if let Some(registry) = self.live.take() {
            warn!("mission dropped before teardown, stopping workers");
            orchestrator.registry.lock().take();
            orchestrator.phase.send_replace(MissionPhase::Failed);
            let grace = orchestrator.config.stop_timeout();
            match Handle::try_current() {
                Ok(handle) => {
                    handle.spawn(async move {
                        let failures = registry.stop_all(grace).await;
                        if !failures.is_empty() {
                            warn!(count = failures.len(), "some workers did not stop cleanly");
                        }
                    });
                }
                Err(_) => warn!("no runtime left to stop the abandoned workers on"),
            }
        }
        orchestrator.busy.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use hive_common::{JobPacket, WorkerId, WorkerState};
    use std::time::Duration;
    use tokio::sync::oneshot;

    #[derive(Default)]
    struct Collect(Mutex<Vec<MissionReport>>);

    impl MissionReporter for Collect {
        fn report(&self, report: &MissionReport) -> anyhow::Result<()> {
            self.0.lock().push(report.clone());
            Ok(())
        }
    }

    struct Stubborn;

    #[async_trait]
    impl Worker for Stubborn {
        fn id(&self) -> WorkerId {
            WorkerId::Sentinel
        }

        fn tick_interval(&self) -> Option<Duration> {
            Some(Duration::from_millis(10))
        }

        async fn tick(&self, _ctx: &WorkerContext) -> anyhow::Result<()> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        }
    }

    fn config(timeout_secs: u64) -> MissionConfig {
        MissionConfig {
            mission_timeout_secs: timeout_secs,
            stop_timeout_ms: 100,
            ..MissionConfig::default()
        }
    }

    fn orchestrator(timeout_secs: u64) -> SwarmOrchestrator {
        SwarmOrchestrator::new(config(timeout_secs)).with_arsenal(Arsenal::dry_run())
    }

    fn assigned(report: &MissionReport) -> Vec<JobPacket> {
        report
            .events
            .iter()
            .filter(|e| e.event_type == EventType::JobAssigned)
            .filter_map(|e| e.decode().ok())
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn mission_runs_to_timeout_and_reports() {
        let reporter = Arc::new(Collect::default());
        let orch = orchestrator(30).with_reporter(reporter.clone());
        assert_eq!(orch.phase(), MissionPhase::Initializing);

        let report = orch.run("https://shop.example/api/order/7").await.unwrap();
        assert_eq!(orch.phase(), MissionPhase::Completed);
        assert!(orch.registry().is_none());
        assert!(report.duration >= Duration::from_secs(30));

        let kinds: Vec<_> = report.events.iter().map(|e| e.event_type).collect();
        let start = kinds.iter().position(|k| *k == EventType::SystemStart).unwrap();
        let acquired = kinds.iter().position(|k| *k == EventType::TargetAcquired).unwrap();
        assert!(start < acquired);

        assert_eq!(report.jobs.assigned, 4);
        assert_eq!(report.jobs.completed, 4);
        assert_eq!(report.jobs.failed, 0);
        assert_eq!(assigned(&report).len(), 4);

        let reported = reporter.0.lock();
        assert_eq!(reported.len(), 1);
        assert_eq!(reported[0].mission_id, report.mission_id);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_ends_the_mission_early() {
        let orch = orchestrator(180);
        let mut phases = orch.watch_phase();
        let (cancel, cancelled) = oneshot::channel::<()>();

        let canceller = async {
            while *phases.borrow_and_update() != MissionPhase::Running {
                phases.changed().await.unwrap();
            }
            let registry = orch.registry().unwrap();
            assert!(registry.states().iter().all(|(_, s)| *s == WorkerState::Online));
            assert_eq!(registry.len(), 8);
            assert!(registry.get(WorkerId::Inspector).is_some());
            tokio::time::sleep(Duration::from_secs(2)).await;
            cancel.send(()).unwrap();
        };
        let (report, ()) = tokio::join!(
            orch.run_until("https://docs.example", async {
                let _ = cancelled.await;
            }),
            canceller
        );

        let report = report.unwrap();
        assert!(report.duration < Duration::from_secs(10));
        assert_eq!(orch.phase(), MissionPhase::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_mission_releases_the_orchestrator() {
        let orch = orchestrator(180);
        let mut phases = orch.watch_phase();

        let (outcome, registry) = tokio::join!(
            tokio::time::timeout(Duration::from_secs(5), orch.run("https://x.example")),
            async {
                while *phases.borrow_and_update() != MissionPhase::Running {
                    phases.changed().await.unwrap();
                }
                orch.registry().unwrap()
            }
        );
        assert!(outcome.is_err());
        assert_eq!(orch.phase(), MissionPhase::Failed);
        assert!(orch.registry().is_none());

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(registry.states().iter().all(|(_, s)| *s == WorkerState::Offline));

        let report = orch.run("https://x.example").await.unwrap();
        assert_eq!(report.target_url, "https://x.example");
        assert_eq!(orch.phase(), MissionPhase::Completed);
    }

    #[tokio::test]
    async fn bad_config_fails_before_running() {
        let reporter = Arc::new(Collect::default());
        let mut bad = config(1);
        bad.tick_interval_ms = 0;
        let orch = SwarmOrchestrator::new(bad).with_reporter(reporter.clone());

        let err = orch.run("https://x.example").await.unwrap_err();
        assert!(matches!(err, HiveError::Bootstrap(_)));
        assert_eq!(orch.phase(), MissionPhase::Initializing);
        assert!(reporter.0.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn stuck_worker_does_not_block_teardown() {
        let orch = orchestrator(5).with_workers(vec![Arc::new(Stubborn)]);
        let report = orch.run("https://x.example").await.unwrap();
        assert_eq!(orch.phase(), MissionPhase::Completed);
        assert!(report.duration < Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_missions_do_not_cross_talk() {
        let a = orchestrator(10);
        let b = orchestrator(10);
        let (ra, rb) = tokio::join!(
            a.run("https://shop-a.example/api/order/1"),
            b.run("https://shop-b.example/api/order/2")
        );
        let (ra, rb) = (ra.unwrap(), rb.unwrap());

        assert!(assigned(&ra).iter().all(|p| p.target.url.contains("shop-a")));
        assert!(assigned(&rb).iter().all(|p| p.target.url.contains("shop-b")));
        assert_eq!(ra.jobs.assigned, 4);
        assert_eq!(rb.jobs.assigned, 4);
        assert_ne!(ra.mission_id, rb.mission_id);
    }

    #[tokio::test(start_paused = true)]
    async fn one_mission_at_a_time() {
        let orch = orchestrator(5);
        let (first, second) = tokio::join!(orch.run("https://x.example"), async {
            tokio::task::yield_now().await;
            orch.run("https://y.example").await
        });
        assert!(first.is_ok());
        assert!(matches!(second, Err(HiveError::Bootstrap(_))));
    }
}
