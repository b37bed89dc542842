//! Orchestrator - Admission control and mission management

mod admission;
mod dashboard;
mod orchestrator;
mod registry;
mod tally;

pub use admission::{slope, AdmissionController, ErrorBudget, HealthSnapshot};
pub use dashboard::{DashboardFeed, DashboardUpdate};
pub use orchestrator::{MissionPhase, SwarmOrchestrator};
pub use registry::WorkerRegistry;
pub use tally::MissionTally;

#[cfg(test)]
mod tests {
    use super::*;
    use hive_common::{MissionConfig, Severity};
    use hive_workers::Arsenal;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn dashboard_sees_the_campaign() {
        let config = MissionConfig {
            mission_timeout_secs: 5,
            ..MissionConfig::default()
        };
        let orch = SwarmOrchestrator::new(config).with_arsenal(Arsenal::dry_run());
        let mut feed = orch.dashboard();

        let report = orch.run("https://store.example/checkout").await.unwrap();
        assert!(report.severity_counts.get(&Severity::Critical).is_none());

        let mut jobs = 0;
        while let Ok(update) = feed.try_recv() {
            if matches!(update, DashboardUpdate::JobAssigned { .. }) {
                jobs += 1;
            }
        }
        assert_eq!(jobs, report.jobs.assigned);
        assert!(report.duration >= Duration::from_secs(5));
    }
}
