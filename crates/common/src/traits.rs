//! Seams between the swarm core and its collaborators
//!
//! Technique modules, persistence and reporting live outside the core; the core
//! only knows these interfaces.

use crate::types::{ArsenalKind, Event, JobPacket, MissionReport, ResultPacket};
use anyhow::Result;
use async_trait::async_trait;

/// A pluggable technique implementation invoked by a worker.
///
/// Any error returned here is converted by the invoking worker into a failed
/// `ResultPacket`; it never reaches the fabric.
#[async_trait]
pub trait ArsenalModule: Send + Sync {
    /// Which technique this module implements.
    fn kind(&self) -> ArsenalKind;

    /// Run one job against its target.
    async fn execute(&self, packet: &JobPacket) -> Result<ResultPacket>;

    /// Module name/identifier
    fn name(&self) -> &str {
        self.kind().as_str()
    }
}

/// Answer of the synchronous pre-flight query.
#[derive(Debug, Clone, PartialEq)]
pub enum PreflightDecision {
    Allow,
    Deny { reason: String },
}

impl PreflightDecision {
    #[inline]
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, PreflightDecision::Allow)
    }
}

/// Advisory admission check a worker runs before executing a JobPacket.
///
/// Implementations read in-memory state only and must never block on I/O.
pub trait PreflightGate: Send + Sync {
    fn preflight(&self, packet: &JobPacket) -> PreflightDecision;
}

/// Gate that admits everything. Used when no controller is wired in.
#[derive(Debug, Default, Clone, Copy)]
pub struct OpenGate;

impl PreflightGate for OpenGate {
    fn preflight(&self, _packet: &JobPacket) -> PreflightDecision {
        PreflightDecision::Allow
    }
}

/// A record handed to the persistence collaborator.
#[derive(Debug, Clone)]
pub enum ArchiveRecord {
    Result(ResultPacket),
    Event(Event),
}

/// Fire-and-forget archival writes. Nothing in the core reads them back.
#[async_trait]
pub trait Archive: Send + Sync {
    async fn archive(&self, record: ArchiveRecord) -> Result<()>;
}

/// Archive that drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullArchive;

#[async_trait]
impl Archive for NullArchive {
    async fn archive(&self, _record: ArchiveRecord) -> Result<()> {
        Ok(())
    }
}

/// Receives the full mission record once the swarm has stopped.
pub trait MissionReporter: Send + Sync {
    fn report(&self, report: &MissionReport) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ModuleConfig, ResultStatus, TaskTarget, WorkerId};

    struct EchoModule;

    #[async_trait]
    impl ArsenalModule for EchoModule {
        fn kind(&self) -> ArsenalKind {
            ArsenalKind::ApiFuzzer
        }

        async fn execute(&self, packet: &JobPacket) -> Result<ResultPacket> {
            Ok(ResultPacket::new(packet.id, packet.config.worker, ResultStatus::Success))
        }
    }

    #[tokio::test]
    async fn arsenal_module_trait() {
        let module = EchoModule;
        let packet = JobPacket::new(
            TaskTarget::new("http://localhost/api"),
            ModuleConfig::new(ArsenalKind::ApiFuzzer, WorkerId::Breaker),
        );
        let result = module.execute(&packet).await.unwrap();
        assert_eq!(result.job_id, packet.id);
        assert_eq!(module.name(), "api_fuzzer");
    }

    #[tokio::test]
    async fn null_archive_accepts_everything() {
        let archive = NullArchive;
        let event = Event::log("librarian", "stored");
        assert!(archive.archive(ArchiveRecord::Event(event)).await.is_ok());
    }

    #[test]
    fn open_gate_allows() {
        let packet = JobPacket::new(
            TaskTarget::new("http://localhost"),
            ModuleConfig::new(ArsenalKind::WorkflowSkip, WorkerId::Scout),
        );
        assert!(OpenGate.preflight(&packet).is_allowed());
    }
}
