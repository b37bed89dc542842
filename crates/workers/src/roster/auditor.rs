//! Auditor - business-logic verification and response diffing

use async_trait::async_trait;
use hive_common::{JobPacket, Priority, ResultPacket, Severity, Vulnerability, WorkerId};
use hive_threat::levenshtein;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use tracing::info;

use crate::worker::{Worker, WorkerContext};

const VERIFY_AGGRESSION: u8 = 1;
const BASELINE_CAPACITY: usize = 256;
/// Responses are compared on this many leading characters.
const DIFF_WINDOW: usize = 2048;

/// Edit-distance similarity in [0, 1].
pub fn similarity(a: &str, b: &str) -> f64 {
    let a: String = a.chars().take(DIFF_WINDOW).collect();
    let b: String = b.chars().take(DIFF_WINDOW).collect();
    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return 1.0;
    }
    1.0 - levenshtein(&a, &b) as f64 / longest as f64
}

/// Similar but not identical: the page rendered, with different content.
#[inline]
fn is_anomalous(similarity: f64) -> bool {
    similarity > 0.5 && similarity < 0.95
}

#[derive(Default)]
struct Baselines {
    responses: HashMap<String, String>,
    order: VecDeque<String>,
}

impl Baselines {
    /// Stored baseline for `url`, recording `response` as it if none exists.
    fn compare_or_record(&mut self, url: &str, response: &str) -> Option<String> {
        if let Some(existing) = self.responses.get(url) {
            return Some(existing.clone());
        }
        if self.order.len() >= BASELINE_CAPACITY {
            if let Some(oldest) = self.order.pop_front() {
                self.responses.remove(&oldest);
            }
        }
        self.order.push_back(url.to_string());
        self.responses.insert(url.to_string(), response.to_string());
        None
    }
}

#[derive(Default)]
pub struct Auditor {
    baselines: Mutex<Baselines>,
}

impl Auditor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Critical re-runs of loud jobs are confirmations; run them gently.
    fn prepare(&self, packet: &JobPacket) -> JobPacket {
        let mut packet = packet.clone();
        if packet.priority == Priority::Critical && packet.config.aggression > 5 {
            info!(job_id = %packet.id, "verification mode, lowering aggression");
            packet.config.aggression = VERIFY_AGGRESSION;
        }
        packet
    }

    fn diff(&self, url: &str, result: ResultPacket) -> ResultPacket {
        let Some(response) = result.data.get("raw_response").and_then(|v| v.as_str()) else {
            return result;
        };
        let Some(baseline) = self.baselines.lock().compare_or_record(url, response) else {
            return result;
        };

        let score = similarity(&baseline, response);
        if !is_anomalous(score) {
            return result;
        }
        info!(%url, similarity = format!("{score:.2}"), "response anomaly, possible leak");
        result.with_finding(
            Vulnerability::new("LOGIC_ANOMALY", Severity::High)
                .with_description("response differs subtly from the recorded baseline")
                .with_evidence(format!("similarity {score:.2}")),
        )
    }
}

#[async_trait]
impl Worker for Auditor {
    fn id(&self) -> WorkerId {
        WorkerId::Auditor
    }

    async fn execute_task(&self, ctx: &WorkerContext, packet: &JobPacket) -> ResultPacket {
        let packet = self.prepare(packet);
        let result = ctx.run_module(self.id(), &packet).await;
        self.diff(&packet.target.url, result)
    }
}
