//! Librarian - hands findings and candidates to the archive

use async_trait::async_trait;
use hive_common::{ArchiveRecord, Event, EventType, ResultPacket, ResultStatus, WorkerId};
use std::sync::Arc;
use tracing::{debug, error};

use crate::worker::{Worker, WorkerContext};

#[derive(Debug, Default)]
pub struct Librarian;

impl Librarian {
    pub fn new() -> Self {
        Self
    }

    /// Write `record` in the background; the fabric never waits on storage.
    fn file(&self, ctx: &WorkerContext, record: ArchiveRecord) {
        let archive = ctx.archive();
        tokio::spawn(async move {
            if let Err(e) = archive.archive(record).await {
                error!(error = %e, "archive write failed");
            }
        });
    }
}

#[async_trait]
impl Worker for Librarian {
    fn id(&self) -> WorkerId {
        WorkerId::Librarian
    }

    fn subscriptions(&self) -> &'static [EventType] {
        &[EventType::JobCompleted, EventType::VulnCandidate]
    }

    async fn handle_event(&self, ctx: &WorkerContext, event: Arc<Event>) -> anyhow::Result<()> {
        match event.event_type {
            EventType::JobCompleted => {
                let result: ResultPacket = event.decode()?;
                if result.status != ResultStatus::VulnFound {
                    return Ok(());
                }
                debug!(job_id = %result.job_id, findings = result.findings.len(), "archiving result");
                ctx.publish(Event::log(
                    self.id().as_str(),
                    format!("archived {} finding(s) from {}", result.findings.len(), result.source),
                ));
                self.file(ctx, ArchiveRecord::Result(result));
            }
            EventType::VulnCandidate => {
                self.file(ctx, ArchiveRecord::Event(Event::clone(&event)));
            }
            _ => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hive_common::{Archive, Candidate, CandidateTag, Severity, Vulnerability};
    use hive_fabric::MessageFabric;
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    struct Recorder(mpsc::UnboundedSender<ArchiveRecord>);

    #[async_trait]
    impl Archive for Recorder {
        async fn archive(&self, record: ArchiveRecord) -> anyhow::Result<()> {
            self.0.send(record)?;
            Ok(())
        }
    }

    fn context() -> (WorkerContext, mpsc::UnboundedReceiver<ArchiveRecord>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let ctx = WorkerContext::new(MessageFabric::new()).with_archive(Arc::new(Recorder(tx)));
        (ctx, rx)
    }

    #[tokio::test]
    async fn archives_only_vulnerable_results() {
        let (ctx, mut records) = context();
        let librarian = Librarian::new();

        let clean = ResultPacket::new(Default::default(), WorkerId::Scout, ResultStatus::Success);
        librarian
            .handle_event(&ctx, Arc::new(Event::job_completed(WorkerId::Scout, &clean).unwrap()))
            .await
            .unwrap();

        let hit = ResultPacket::new(Default::default(), WorkerId::Breaker, ResultStatus::Success)
            .with_finding(Vulnerability::new("SQLI", Severity::Critical));
        librarian
            .handle_event(&ctx, Arc::new(Event::job_completed(WorkerId::Breaker, &hit).unwrap()))
            .await
            .unwrap();

        match timeout(Duration::from_secs(1), records.recv()).await.unwrap() {
            Some(ArchiveRecord::Result(r)) => assert_eq!(r.findings[0].name, "SQLI"),
            other => panic!("unexpected record {other:?}"),
        }
        assert!(timeout(Duration::from_millis(50), records.recv()).await.is_err());
    }

    #[tokio::test]
    async fn archives_every_candidate() {
        let (ctx, mut records) = context();
        let candidate = Candidate {
            url: "https://x.example/api".into(),
            tag: CandidateTag::Api,
        };
        let event = Event::candidate(WorkerId::Scout, &candidate).unwrap();
        Librarian::new().handle_event(&ctx, Arc::new(event.clone())).await.unwrap();

        match timeout(Duration::from_secs(1), records.recv()).await.unwrap() {
            Some(ArchiveRecord::Event(e)) => assert_eq!(e.id, event.id),
            other => panic!("unexpected record {other:?}"),
        }
    }
}
