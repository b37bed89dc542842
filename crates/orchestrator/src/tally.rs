//! Mission tally

use hive_common::{Event, EventType, Finding, JobTally, ResultPacket, ResultStatus, Severity};
use hive_fabric::{MessageFabric, SubscriptionId};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

#[derive(Default)]
struct Counts {
    jobs: JobTally,
    findings: Vec<Finding>,
}

/// Running counts of jobs and confirmed findings for one mission.
#[derive(Clone, Default)]
pub struct MissionTally {
    counts: Arc<Mutex<Counts>>,
}

impl MissionTally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, event: &Event) {
        match event.event_type {
            EventType::JobAssigned => self.counts.lock().jobs.assigned += 1,
            EventType::JobCompleted => {
                if let Ok(result) = event.decode::<ResultPacket>() {
                    let mut counts = self.counts.lock();
                    counts.jobs.completed += 1;
                    match result.status {
                        ResultStatus::Failure => counts.jobs.failed += 1,
                        ResultStatus::Throttled => counts.jobs.throttled += 1,
                        _ => {}
                    }
                }
            }
            EventType::VulnConfirmed => {
                if let Ok(finding) = event.decode::<Finding>() {
                    self.counts.lock().findings.push(finding);
                }
            }
            _ => {}
        }
    }

    pub fn attach(&self, fabric: &MessageFabric) -> Vec<SubscriptionId> {
        [EventType::JobAssigned, EventType::JobCompleted, EventType::VulnConfirmed]
            .into_iter()
            .map(|event_type| {
                let tally = self.clone();
                fabric.subscribe(event_type, move |event: Arc<Event>| {
                    let tally = tally.clone();
                    async move {
                        tally.record(&event);
                        Ok::<(), anyhow::Error>(())
                    }
                })
            })
            .collect()
    }

    pub fn jobs(&self) -> JobTally {
        self.counts.lock().jobs
    }

    pub fn findings(&self) -> Vec<Finding> {
        self.counts.lock().findings.clone()
    }

    pub fn severity_counts(&self) -> BTreeMap<Severity, usize> {
        let mut by_severity = BTreeMap::new();
        for finding in &self.counts.lock().findings {
            *by_severity.entry(finding.vulnerability.severity).or_insert(0) += 1;
        }
        by_severity
    }

    pub fn log_summary(&self) {
        let counts = self.counts.lock();
        let jobs = counts.jobs;

        info!("Mission Summary:");
        info!("  Jobs assigned: {}", jobs.assigned);
        info!("  Completed: {}", jobs.completed);
        info!("  Failed: {}", jobs.failed);
        info!("  Throttled: {}", jobs.throttled);
        info!("  Confirmed findings: {}", counts.findings.len());
        if jobs.completed > 0 {
            let ok = jobs.completed - jobs.failed - jobs.throttled;
            info!("  Success rate: {:.1}%", (ok as f64 / jobs.completed as f64) * 100.0);
        }
    }
}
