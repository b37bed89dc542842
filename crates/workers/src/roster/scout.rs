//! Scout - reconnaissance and hand-off of interesting endpoints

use async_trait::async_trait;
use hive_common::{
    ArsenalKind, Candidate, CandidateTag, Event, JobPacket, ModuleConfig, Priority, ResultPacket,
    TaskTarget, WorkerId,
};
use tracing::{info, warn};

use crate::worker::{Worker, WorkerContext};

const API_INDICATORS: &[&str] = &["/api", "/v1", "graphql", "swagger"];
const OBJECT_PATHS: &[&str] = &["/order", "/user", "/account", "/profile"];

/// Candidate tags a URL deserves, in hand-off order.
pub fn classify(url: &str) -> Vec<CandidateTag> {
    let lowered = url.to_lowercase();
    let mut tags = Vec::new();
    if API_INDICATORS.iter().any(|i| lowered.contains(i)) {
        tags.push(CandidateTag::Api);
    }
    if OBJECT_PATHS.iter().any(|p| lowered.contains(p)) {
        tags.push(CandidateTag::ObjectReference);
    }
    tags
}

#[derive(Debug, Default)]
pub struct Scout;

impl Scout {
    pub fn new() -> Self {
        Self
    }

    fn hand_off(&self, ctx: &WorkerContext, packet: &JobPacket) -> anyhow::Result<()> {
        let url = &packet.target.url;
        for tag in classify(url) {
            info!(%url, ?tag, "candidate spotted");
            let candidate = Candidate {
                url: url.clone(),
                tag,
            };
            ctx.publish(Event::candidate(self.id(), &candidate)?);

            if tag == CandidateTag::ObjectReference {
                let probe = JobPacket::new(
                    TaskTarget::new(url.as_str()).with_method("POST"),
                    ModuleConfig::new(ArsenalKind::ObjectReference, WorkerId::Auditor)
                        .with_aggression(packet.config.aggression),
                )
                .with_priority(Priority::High);
                ctx.assign(self.id(), &probe)?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Worker for Scout {
    fn id(&self) -> WorkerId {
        WorkerId::Scout
    }

    async fn execute_task(&self, ctx: &WorkerContext, packet: &JobPacket) -> ResultPacket {
        if let Err(e) = self.hand_off(ctx, packet) {
            warn!(job_id = %packet.id, error = %e, "candidate hand-off failed");
        }
        ctx.run_module(self.id(), packet).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        assert_eq!(classify("https://x.example/api/v1/items"), vec![CandidateTag::Api]);
        assert_eq!(
            classify("https://x.example/API/user/42"),
            vec![CandidateTag::Api, CandidateTag::ObjectReference]
        );
        assert_eq!(classify("https://x.example/account/settings"), vec![CandidateTag::ObjectReference]);
        assert!(classify("https://x.example/about").is_empty());
    }
}
