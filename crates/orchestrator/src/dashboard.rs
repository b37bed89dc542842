//! Dashboard feed - lossy projection of select fabric events

use hive_common::{ArsenalKind, ControlSignal, Event, EventType, Finding, JobPacket, WorkerId};
use hive_fabric::{MessageFabric, SubscriptionId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

/// What a live dashboard is shown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DashboardUpdate {
    Finding(Finding),
    Control(ControlSignal),
    JobAssigned {
        job_id: Uuid,
        worker: WorkerId,
        module: ArsenalKind,
        url: String,
    },
    Log {
        source: String,
        message: String,
    },
}

impl DashboardUpdate {
    pub const SOURCES: [EventType; 4] = [
        EventType::VulnConfirmed,
        EventType::ControlSignal,
        EventType::JobAssigned,
        EventType::Log,
    ];

    /// Projection of `event`, or `None` for types the dashboard does not show
    /// and payloads that do not decode.
    pub fn project(event: &Event) -> Option<Self> {
        match event.event_type {
            EventType::VulnConfirmed => event.decode().ok().map(DashboardUpdate::Finding),
            EventType::ControlSignal => event.decode().ok().map(DashboardUpdate::Control),
            EventType::JobAssigned => {
                let packet: JobPacket = event.decode().ok()?;
                Some(DashboardUpdate::JobAssigned {
                    job_id: packet.id,
                    worker: packet.config.worker,
                    module: packet.config.module,
                    url: packet.target.url,
                })
            }
            EventType::Log => Some(DashboardUpdate::Log {
                source: event.source.clone(),
                message: event.payload_str("message").unwrap_or_default().to_string(),
            }),
            _ => None,
        }
    }
}

/// Broadcast side of the dashboard. Sending never blocks and never fails:
/// with no receivers the update is dropped, and slow receivers lag.
#[derive(Clone)]
pub struct DashboardFeed {
    tx: broadcast::Sender<DashboardUpdate>,
}

impl DashboardFeed {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DashboardUpdate> {
        self.tx.subscribe()
    }

    pub fn send(&self, update: DashboardUpdate) {
        let _ = self.tx.send(update);
    }

    /// Forward the dashboard's event types from `fabric`.
    pub fn attach(&self, fabric: &MessageFabric) -> Vec<SubscriptionId> {
        DashboardUpdate::SOURCES
            .iter()
            .map(|&event_type| {
                let feed = self.clone();
                fabric.subscribe(event_type, move |event: Arc<Event>| {
                    let feed = feed.clone();
                    async move {
                        if let Some(update) = DashboardUpdate::project(&event) {
                            feed.send(update);
                        }
                        Ok::<(), anyhow::Error>(())
                    }
                })
            })
            .collect()
    }
}
