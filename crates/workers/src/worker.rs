// crates/workers/src/worker.rs
//! Worker capability trait and the context workers act through

use async_trait::async_trait;
use hive_common::{
    Archive, Event, EventType, Finding, HiveError, HiveResult, JobPacket, NullArchive, OpenGate,
    PreflightDecision, PreflightGate, ResultPacket, WorkerId,
};
use hive_fabric::MessageFabric;
use hive_threat::ThreatScoringEngine;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::arsenal::Arsenal;

/// What a member of the roster can do.
///
/// A worker is reactive through `handle_event`, proactive when
/// `tick_interval` returns a period, or both.
#[async_trait]
pub trait Worker: Send + Sync + 'static {
    fn id(&self) -> WorkerId;

    /// Event types subscribed on start.
    fn subscriptions(&self) -> &'static [EventType] {
        &[EventType::JobAssigned]
    }

    async fn handle_event(&self, ctx: &WorkerContext, event: Arc<Event>) -> anyhow::Result<()> {
        if event.event_type == EventType::JobAssigned {
            run_assigned(self, ctx, &event).await?;
        }
        Ok(())
    }

    fn tick_interval(&self) -> Option<Duration> {
        None
    }

    async fn tick(&self, _ctx: &WorkerContext) -> anyhow::Result<()> {
        Ok(())
    }

    /// Execute one packet and produce its result. Called for packets this
    /// worker owns, and synchronously through the worker registry.
    async fn execute_task(&self, ctx: &WorkerContext, packet: &JobPacket) -> ResultPacket {
        ctx.run_module(self.id(), packet).await
    }
}

/// Shared collaborators of every worker in a mission.
#[derive(Clone)]
pub struct WorkerContext {
    fabric: MessageFabric,
    gate: Arc<dyn PreflightGate>,
    arsenal: Arc<Arsenal>,
    engine: Arc<ThreatScoringEngine>,
    archive: Arc<dyn Archive>,
}

impl WorkerContext {
    pub fn new(fabric: MessageFabric) -> Self {
        Self {
            fabric,
            gate: Arc::new(OpenGate),
            arsenal: Arc::new(Arsenal::default()),
            engine: Arc::new(ThreatScoringEngine::new()),
            archive: Arc::new(NullArchive),
        }
    }

    #[must_use]
    pub fn with_gate(mut self, gate: Arc<dyn PreflightGate>) -> Self {
        self.gate = gate;
        self
    }

    #[must_use]
    pub fn with_arsenal(mut self, arsenal: Arc<Arsenal>) -> Self {
        self.arsenal = arsenal;
        self
    }

    #[must_use]
    pub fn with_engine(mut self, engine: Arc<ThreatScoringEngine>) -> Self {
        self.engine = engine;
        self
    }

    #[must_use]
    pub fn with_archive(mut self, archive: Arc<dyn Archive>) -> Self {
        self.archive = archive;
        self
    }

    pub fn fabric(&self) -> &MessageFabric {
        &self.fabric
    }

    pub fn engine(&self) -> &ThreatScoringEngine {
        &self.engine
    }

    pub fn arsenal(&self) -> &Arsenal {
        &self.arsenal
    }

    pub fn archive(&self) -> Arc<dyn Archive> {
        Arc::clone(&self.archive)
    }

    pub fn preflight(&self, packet: &JobPacket) -> PreflightDecision {
        self.gate.preflight(packet)
    }

    pub fn publish(&self, event: Event) -> usize {
        self.fabric.publish(event)
    }

    /// Publish a packet for its owning worker.
    pub fn assign(&self, source: WorkerId, packet: &JobPacket) -> HiveResult<()> {
        debug!(
            job_id = %packet.id,
            module = %packet.config.module,
            to = %packet.config.worker,
            "assigning job"
        );
        self.publish(Event::job_assigned(source, packet)?);
        Ok(())
    }

    /// Publish the completion of `packet`, plus one confirmation per finding.
    pub fn complete(&self, packet: &JobPacket, result: &ResultPacket) -> HiveResult<()> {
        for vulnerability in &result.findings {
            let finding = Finding {
                url: packet.target.url.clone(),
                worker: result.source,
                vulnerability: vulnerability.clone(),
                risk_score: result
                    .data
                    .get("score")
                    .and_then(serde_json::Value::as_u64)
                    .map(|s| s.min(100) as u8),
            };
            self.publish(Event::confirmed(result.source, &finding)?);
        }
        self.publish(Event::job_completed(result.source, result)?);
        Ok(())
    }

    /// Run the arsenal module `packet` asks for. Missing modules and module
    /// errors become failed results; nothing here returns an error.
    pub async fn run_module(&self, worker: WorkerId, packet: &JobPacket) -> ResultPacket {
        let kind = packet.config.module;
        let Some(module) = self.arsenal.get(kind) else {
            let missing = HiveError::Arsenal(kind.to_string());
            warn!(%worker, error = %missing, "cannot run job");
            return ResultPacket::failed(packet.id, worker, missing.to_string());
        };

        let mut result = match module.execute(packet).await {
            Ok(result) => result,
            Err(e) => {
                warn!(%worker, module = %kind, job_id = %packet.id, error = %e, "module failed");
                ResultPacket::failed(packet.id, worker, e.to_string())
            }
        };
        result.job_id = packet.id;
        result.source = worker;
        result
    }
}

/// Decode a JOB_ASSIGNED event and, if `worker` owns the packet, run it
/// through the pre-flight gate and `execute_task`, then publish the result.
///
/// Returns `None` for packets addressed to another worker.
pub async fn run_assigned<W: Worker + ?Sized>(
    worker: &W,
    ctx: &WorkerContext,
    event: &Event,
) -> anyhow::Result<Option<(JobPacket, ResultPacket)>> {
    let packet: JobPacket = event.decode()?;
    let id = worker.id();
    if !packet.is_owned_by(id) {
        return Ok(None);
    }

    let result = match ctx.preflight(&packet) {
        PreflightDecision::Deny { reason } => {
            warn!(worker = %id, job_id = %packet.id, %reason, "pre-flight denied job");
            ResultPacket::throttled(packet.id, id, reason)
        }
        PreflightDecision::Allow => {
            let started = Instant::now();
            let mut result = worker.execute_task(ctx, &packet).await;
            result.job_id = packet.id;
            result.source = id;
            result.set_execution_time(started.elapsed());
            result
        }
    };

    debug!(worker = %id, job_id = %packet.id, status = ?result.status, "job finished");
    ctx.complete(&packet, &result)?;
    Ok(Some((packet, result)))
}
