//! Hive Workers - Worker runtime and the swarm roster
//!
//! A worker is anything implementing [`Worker`]; [`WorkerRuntime`] gives it an
//! OFFLINE/ONLINE lifecycle on a shared fabric. Packets are routed only by
//! equality between a worker's id and the packet's owning worker.

mod arsenal;
mod runtime;
mod worker;

pub mod roster;

pub use arsenal::{Arsenal, ArsenalBuilder, DryRunModule};
pub use roster::roster;
pub use runtime::WorkerRuntime;
pub use worker::{run_assigned, Worker, WorkerContext};

#[cfg(test)]
mod tests {
    use super::*;
    use hive_common::{Event, EventType, JobPacket, MissionConfig, ResultPacket, WorkerId};
    use hive_fabric::MessageFabric;
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    #[tokio::test]
    async fn roster_choreography_on_one_fabric() {
        let fabric = MessageFabric::with_history(1_000);
        let (tx, mut done) = mpsc::unbounded_channel();
        fabric.subscribe(EventType::JobCompleted, move |event| {
            let tx = tx.clone();
            async move {
                tx.send(event.decode::<ResultPacket>()?)?;
                Ok::<(), anyhow::Error>(())
            }
        });

        let ctx = WorkerContext::new(fabric.clone()).with_arsenal(Arc::new(Arsenal::dry_run()));
        let runtimes: Vec<_> = roster(&MissionConfig::default())
            .into_iter()
            .map(|w| WorkerRuntime::new(w, ctx.clone()))
            .collect();
        for rt in &runtimes {
            rt.start().unwrap();
        }

        // Blitz (2 jobs), the scout's object-reference probe, the breaker's fuzz job.
        fabric.publish(Event::target_acquired("test", "https://shop.example/api/order/7"));
        let mut results = Vec::new();
        for _ in 0..4 {
            let r = timeout(Duration::from_secs(2), done.recv()).await.unwrap().unwrap();
            results.push(r);
        }
        assert!(timeout(Duration::from_millis(100), done.recv()).await.is_err());

        let assigned: HashMap<_, _> = fabric
            .history()
            .iter()
            .filter(|e| e.event_type == EventType::JobAssigned)
            .map(|e| e.decode::<JobPacket>().unwrap())
            .map(|p| (p.id, p.config.worker))
            .collect();
        assert_eq!(assigned.len(), 4);
        for r in &results {
            assert_eq!(assigned.get(&r.job_id), Some(&r.source), "result for an unpublished job");
        }
        assert!(results.iter().any(|r| r.source == WorkerId::Breaker));
        assert_eq!(fabric.stats().faults, 0);

        for rt in &runtimes {
            rt.stop(Duration::from_secs(1)).await.unwrap();
        }
    }
}
