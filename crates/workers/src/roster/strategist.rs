//! Strategist - turns an acquired target into a campaign of jobs

use async_trait::async_trait;
use hive_common::{
    ArsenalKind, Event, EventType, JobPacket, ModuleConfig, Priority, TaskTarget, WorkerId,
};
use parking_lot::Mutex;
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use tracing::info;

use crate::worker::{Worker, WorkerContext};

const ECOMMERCE_KEYWORDS: &[&str] = &["shop", "store", "buy", "cart", "checkout", "order"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Campaign {
    EcommerceBlitz,
    Blitzkrieg,
    LowAndSlow,
    Deception,
}

impl Campaign {
    const MIXED: [Campaign; 3] = [Campaign::Blitzkrieg, Campaign::LowAndSlow, Campaign::Deception];
    const MIXED_WEIGHTS: [u32; 3] = [2, 5, 3];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Campaign::EcommerceBlitz => "E_COMMERCE_BLITZ",
            Campaign::Blitzkrieg => "BLITZKRIEG",
            Campaign::LowAndSlow => "LOW_AND_SLOW",
            Campaign::Deception => "DECEPTION",
        }
    }

    /// Jobs this campaign opens with against `url`.
    pub fn jobs(&self, url: &str, base_aggression: u8) -> Vec<JobPacket> {
        let target = TaskTarget::new(url);
        match self {
            Campaign::EcommerceBlitz => vec![
                JobPacket::new(
                    target.clone(),
                    ModuleConfig::new(ArsenalKind::FinancialLogic, WorkerId::Auditor).with_aggression(8),
                )
                .with_priority(Priority::High),
                JobPacket::new(
                    target,
                    ModuleConfig::new(ArsenalKind::WorkflowSkip, WorkerId::Scout).with_aggression(7),
                )
                .with_priority(Priority::High),
            ],
            mixed => {
                let recon = match mixed {
                    Campaign::Blitzkrieg => base_aggression.saturating_add(4),
                    Campaign::LowAndSlow => base_aggression.saturating_sub(2),
                    _ => base_aggression,
                };
                vec![
                    JobPacket::new(
                        target.clone(),
                        ModuleConfig::new(ArsenalKind::WorkflowSkip, WorkerId::Scout)
                            .with_aggression(recon),
                    )
                    .with_priority(Priority::High),
                    JobPacket::new(
                        target,
                        ModuleConfig::new(ArsenalKind::FinancialLogic, WorkerId::Auditor)
                            .with_aggression(8),
                    )
                    .with_priority(Priority::Normal),
                ]
            }
        }
    }
}

pub struct Strategist {
    rng: Mutex<StdRng>,
    base_aggression: u8,
}

impl Default for Strategist {
    fn default() -> Self {
        Self::new()
    }
}

impl Strategist {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
            base_aggression: 5,
        }
    }

    /// Deterministic campaign choice, for tests and replays.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            base_aggression: 5,
        }
    }

    #[must_use]
    pub fn with_base_aggression(mut self, aggression: u8) -> Self {
        self.base_aggression = aggression;
        self
    }

    pub fn plan(&self, url: &str) -> Campaign {
        let lowered = url.to_lowercase();
        if ECOMMERCE_KEYWORDS.iter().any(|k| lowered.contains(k)) {
            return Campaign::EcommerceBlitz;
        }
        match WeightedIndex::new(Campaign::MIXED_WEIGHTS) {
            Ok(dist) => Campaign::MIXED[dist.sample(&mut *self.rng.lock())],
            Err(_) => Campaign::LowAndSlow,
        }
    }
}

#[async_trait]
impl Worker for Strategist {
    fn id(&self) -> WorkerId {
        WorkerId::Strategist
    }

    fn subscriptions(&self) -> &'static [EventType] {
        &[EventType::TargetAcquired]
    }

    async fn handle_event(&self, ctx: &WorkerContext, event: Arc<Event>) -> anyhow::Result<()> {
        let Some(url) = event.payload_str("url") else {
            return Ok(());
        };
        let campaign = self.plan(url);
        info!(%url, campaign = campaign.as_str(), "initiating campaign");
        ctx.publish(Event::log(
            self.id().as_str(),
            format!("initiating campaign '{url}' with strategy {}", campaign.as_str()),
        ));

        for packet in campaign.jobs(url, self.base_aggression) {
            ctx.assign(self.id(), &packet)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shop_urls_get_the_blitz() {
        let s = Strategist::with_seed(1);
        assert_eq!(s.plan("https://store.example/checkout"), Campaign::EcommerceBlitz);

        let jobs = Campaign::EcommerceBlitz.jobs("https://store.example", 5);
        assert_eq!(jobs.len(), 2);
        assert!(jobs.iter().all(|j| j.priority == Priority::High));
        assert_eq!(jobs[0].config.worker, WorkerId::Auditor);
        assert_eq!(jobs[1].config.module, ArsenalKind::WorkflowSkip);
    }

    #[test]
    fn mixed_strategy_is_seeded() {
        let a: Vec<_> = (0..20).map(|_| Strategist::with_seed(7).plan("https://docs.example")).collect();
        assert!(a.windows(2).all(|w| w[0] == w[1]));
        assert_ne!(a[0], Campaign::EcommerceBlitz);
    }

    #[test]
    fn mixed_strategy_uses_every_option() {
        let s = Strategist::with_seed(42);
        let picks: Vec<_> = (0..300).map(|_| s.plan("https://docs.example")).collect();
        for c in Campaign::MIXED {
            assert!(picks.contains(&c), "{c:?} never chosen");
        }
    }

    #[test]
    fn campaign_sets_recon_aggression() {
        let recon = |c: Campaign| c.jobs("https://x.example", 5)[0].config.aggression;
        assert_eq!(recon(Campaign::Blitzkrieg), 9);
        assert_eq!(recon(Campaign::LowAndSlow), 3);
        assert_eq!(recon(Campaign::Deception), 5);
        let logic = &Campaign::Deception.jobs("https://x.example", 5)[1];
        assert_eq!(logic.priority, Priority::Normal);
        assert_eq!(logic.config.worker, WorkerId::Auditor);
    }
}
