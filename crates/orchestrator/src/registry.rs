//! Worker registry - the mission's explicit handle on its running workers

use hive_common::{HiveError, HiveResult, JobPacket, ResultPacket, WorkerId, WorkerState};
use hive_workers::WorkerRuntime;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Runtimes of one mission, keyed by worker id.
///
/// Owned by the orchestrator and handed by reference to callers that need
/// synchronous access to a worker.
#[derive(Default)]
pub struct WorkerRegistry {
    runtimes: BTreeMap<WorkerId, Arc<WorkerRuntime>>,
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a runtime. A second runtime for the same id replaces the first.
    pub fn register(&mut self, runtime: WorkerRuntime) {
        let id = runtime.id();
        if self.runtimes.insert(id, Arc::new(runtime)).is_some() {
            warn!(worker = %id, "worker registered twice, keeping the latest");
        }
    }

    pub fn get(&self, worker: WorkerId) -> Option<Arc<WorkerRuntime>> {
        self.runtimes.get(&worker).cloned()
    }

    pub fn ids(&self) -> Vec<WorkerId> {
        self.runtimes.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.runtimes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runtimes.is_empty()
    }

    pub fn states(&self) -> Vec<(WorkerId, WorkerState)> {
        self.runtimes.iter().map(|(id, rt)| (*id, rt.state())).collect()
    }

    /// Start every worker. Stops at the first failure; workers started so far
    /// stay online for the caller to tear down.
    pub fn start_all(&self) -> HiveResult<()> {
        for runtime in self.runtimes.values() {
            runtime.start()?;
        }
        info!(workers = self.runtimes.len(), "roster online");
        Ok(())
    }

    /// Stop every worker, best-effort. Failures are logged and returned, never
    /// retried.
    pub async fn stop_all(&self, grace: Duration) -> Vec<(WorkerId, HiveError)> {
        let mut failures = Vec::new();
        for (id, runtime) in &self.runtimes {
            if let Err(e) = runtime.stop(grace).await {
                warn!(worker = %id, error = %e, "worker did not stop cleanly, skipping");
                failures.push((*id, e));
            }
        }
        failures
    }

    /// Run `packet` on `worker` and wait for the result.
    ///
    /// The packet must be addressed to `worker`; this is the same ownership
    /// rule the fabric path enforces. The result itself is returned, not
    /// published as JOB_COMPLETED, but the worker may still publish follow-up
    /// work on the mission fabric (the Scout's candidates and hand-offs).
    pub async fn execute_task(&self, worker: WorkerId, packet: &JobPacket) -> HiveResult<ResultPacket> {
        let runtime = self
            .get(worker)
            .ok_or_else(|| HiveError::UnknownWorker(worker.to_string()))?;
        if !packet.is_owned_by(worker) {
            return Err(HiveError::Worker(
                worker.to_string(),
                format!("job {} belongs to {}", packet.id, packet.config.worker),
            ));
        }
        Ok(runtime.execute(packet).await)
    }
}
