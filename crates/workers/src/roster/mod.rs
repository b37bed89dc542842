//! The swarm roster

mod auditor;
mod breaker;
mod inspector;
mod librarian;
mod scout;
mod sentinel;
mod strategist;

pub use auditor::{similarity, Auditor};
pub use breaker::{mutate, Breaker, Mutation, POLYGLOTS};
pub use inspector::{judge_intent, Inspector, IntentAction, IntentVerdict};
pub use librarian::Librarian;
pub use scout::{classify, Scout};
pub use sentinel::{snapshot_input, Sentinel};
pub use strategist::{Campaign, Strategist};

use hive_common::MissionConfig;
use std::sync::Arc;

use crate::worker::Worker;

/// Every roster worker except the Cortex, which the orchestrator supplies.
pub fn roster(config: &MissionConfig) -> Vec<Arc<dyn Worker>> {
    vec![
        Arc::new(Strategist::new().with_base_aggression(config.base_aggression)),
        Arc::new(Scout::new()),
        Arc::new(Breaker::new()),
        Arc::new(Auditor::new()),
        Arc::new(Sentinel::new()),
        Arc::new(Inspector::new()),
        Arc::new(Librarian::new()),
    ]
}
