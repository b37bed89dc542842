// crates/workers/src/arsenal.rs
//! Arsenal - capability registry of technique modules

use anyhow::Result;
use async_trait::async_trait;
use hive_common::{ArsenalKind, ArsenalModule, JobPacket, ResultPacket, ResultStatus};
use serde_json::json;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Technique modules available to the workers of one mission, keyed by kind.
///
/// Populated once at startup and shared read-only afterwards.
#[derive(Default, Clone)]
pub struct Arsenal {
    modules: HashMap<ArsenalKind, Arc<dyn ArsenalModule>>,
}

impl fmt::Debug for Arsenal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arsenal").field("kinds", &self.kinds()).finish()
    }
}

impl Arsenal {
    pub fn builder() -> ArsenalBuilder {
        ArsenalBuilder::default()
    }

    /// Every technique backed by a `DryRunModule`.
    pub fn dry_run() -> Self {
        ArsenalKind::ALL
            .into_iter()
            .fold(Self::builder(), |b, kind| b.register(DryRunModule::new(kind)))
            .build()
    }

    pub fn get(&self, kind: ArsenalKind) -> Option<Arc<dyn ArsenalModule>> {
        self.modules.get(&kind).cloned()
    }

    pub fn contains(&self, kind: ArsenalKind) -> bool {
        self.modules.contains_key(&kind)
    }

    pub fn kinds(&self) -> Vec<ArsenalKind> {
        let mut kinds: Vec<_> = self.modules.keys().copied().collect();
        kinds.sort();
        kinds
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

#[derive(Default)]
pub struct ArsenalBuilder {
    modules: HashMap<ArsenalKind, Arc<dyn ArsenalModule>>,
}

impl ArsenalBuilder {
    /// Register a module under its own kind. A later registration replaces an earlier one.
    #[must_use]
    pub fn register<M: ArsenalModule + 'static>(self, module: M) -> Self {
        self.register_arc(Arc::new(module))
    }

    #[must_use]
    pub fn register_arc(mut self, module: Arc<dyn ArsenalModule>) -> Self {
        self.modules.insert(module.kind(), module);
        self
    }

    pub fn build(self) -> Arsenal {
        Arsenal {
            modules: self.modules,
        }
    }
}

/// Module that never touches the network. It echoes the job back as a
/// successful result with a stable synthetic response body.
#[derive(Debug, Clone)]
pub struct DryRunModule {
    kind: ArsenalKind,
    latency: Duration,
}

impl DryRunModule {
    pub fn new(kind: ArsenalKind) -> Self {
        Self {
            kind,
            latency: Duration::from_millis(5),
        }
    }

    #[inline]
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }
}

#[async_trait]
impl ArsenalModule for DryRunModule {
    fn kind(&self) -> ArsenalKind {
        self.kind
    }

    async fn execute(&self, packet: &JobPacket) -> Result<ResultPacket> {
        tokio::time::sleep(self.latency).await;
        Ok(
            ResultPacket::new(packet.id, packet.config.worker, ResultStatus::Success).with_data(json!({
                "module": self.kind.as_str(),
                "url": packet.target.url,
                "method": packet.target.method,
                "aggression": packet.config.aggression,
                "dry_run": true,
                "raw_response": format!("<html><body>dry run of {}</body></html>", packet.target.url),
            })),
        )
    }
}
