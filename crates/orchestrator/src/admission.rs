// crates/orchestrator/src/admission.rs
//! Admission control - swarm-wide health estimation and advisory signals
//!
//! The controller folds every JOB_COMPLETED into rolling latency and outcome
//! windows plus an error budget, all behind one lock. A governance tick turns
//! that state into THROTTLE, STEALTH_MODE and INFRA_ROTATE signals, and the
//! synchronous pre-flight gate reads the same state without touching the
//! network.

use async_trait::async_trait;
use hive_common::{
    AdmissionConfig, ControlSignal, Event, EventType, JobPacket, PreflightDecision,
    PreflightGate, ResultPacket, ResultStatus, SignalKind, WorkerId,
};
use hive_workers::{Worker, WorkerContext};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

const STRESS_MARKERS: &[&str] = &["timeout", "overload"];

/// Least-squares slope of `samples` against their index.
pub fn slope(samples: &[f64]) -> f64 {
    let n = samples.len();
    if n < 2 {
        return 0.0;
    }
    let x_mean = (n - 1) as f64 / 2.0;
    let y_mean = samples.iter().sum::<f64>() / n as f64;

    let (mut num, mut den) = (0.0, 0.0);
    for (i, y) in samples.iter().enumerate() {
        let dx = i as f64 - x_mean;
        num += dx * (y - y_mean);
        den += dx * dx;
    }
    if den == 0.0 {
        0.0
    } else {
        num / den
    }
}

/// Tokens spent by stress signals, refilled on a fixed cadence.
#[derive(Debug, Clone)]
pub struct ErrorBudget {
    current: u32,
    max: u32,
    last_refill: Instant,
}

impl ErrorBudget {
    pub fn new(max: u32) -> Self {
        Self {
            current: max,
            max,
            last_refill: Instant::now(),
        }
    }

    #[inline]
    pub fn current(&self) -> u32 {
        self.current
    }

    #[inline]
    pub fn max(&self) -> u32 {
        self.max
    }

    pub fn spend(&mut self, penalty: u32) {
        self.current = self.current.saturating_sub(penalty);
    }

    /// Credit `amount` for every full `interval` elapsed since the last refill.
    pub fn refill(&mut self, now: Instant, interval: Duration, amount: u32) {
        let elapsed = now.saturating_duration_since(self.last_refill);
        let periods = (elapsed.as_nanos() / interval.as_nanos().max(1)) as u32;
        if periods == 0 {
            return;
        }
        let credit = periods.saturating_mul(amount);
        self.current = self.current.saturating_add(credit).min(self.max);
        self.last_refill += interval * periods;
    }
}

struct HealthState {
    latencies: VecDeque<f64>,
    /// `true` for a failed completion.
    outcomes: VecDeque<bool>,
    budget: ErrorBudget,
}

impl HealthState {
    fn push(&mut self, capacity: usize, latency_ms: f64, failed: bool) {
        if self.latencies.len() >= capacity {
            self.latencies.pop_front();
        }
        self.latencies.push_back(latency_ms);
        if self.outcomes.len() >= capacity {
            self.outcomes.pop_front();
        }
        self.outcomes.push_back(failed);
    }

    fn average_latency(&self) -> Option<f64> {
        if self.latencies.is_empty() {
            None
        } else {
            Some(self.latencies.iter().sum::<f64>() / self.latencies.len() as f64)
        }
    }
}

/// Point-in-time view of the controller, for logs and tests.
#[derive(Debug, Clone, PartialEq)]
pub struct HealthSnapshot {
    pub samples: usize,
    pub average_latency_ms: Option<f64>,
    pub trend: Option<f64>,
    pub budget: u32,
}

/// The Cortex. One instance per mission.
pub struct AdmissionController {
    config: AdmissionConfig,
    tick: Duration,
    state: Mutex<HealthState>,
}

impl AdmissionController {
    pub fn new(config: AdmissionConfig) -> Self {
        let budget = ErrorBudget::new(config.budget_max);
        Self {
            state: Mutex::new(HealthState {
                latencies: VecDeque::with_capacity(config.window_capacity),
                outcomes: VecDeque::with_capacity(config.window_capacity),
                budget,
            }),
            tick: Duration::from_secs(1),
            config,
        }
    }

    /// Governance tick period when running as a worker.
    #[inline]
    #[must_use]
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    pub fn config(&self) -> &AdmissionConfig {
        &self.config
    }

    /// Fold one completion into the windows. Throttled results never reached
    /// the target and are skipped.
    pub fn observe(&self, result: &ResultPacket) {
        if result.status == ResultStatus::Throttled {
            return;
        }
        let failed = result.status == ResultStatus::Failure;
        let stressed = failed && {
            let data = result.data.to_string().to_lowercase();
            STRESS_MARKERS.iter().any(|m| data.contains(m))
        };

        let mut state = self.state.lock();
        state.push(self.config.window_capacity, result.execution_time_ms, failed);
        if stressed {
            state.budget.spend(self.config.stress_penalty);
            debug!(budget = state.budget.current(), "target under stress, budget spent");
        }
    }

    /// Latency slope over the window, once enough samples exist.
    pub fn trend(&self) -> Option<f64> {
        let state = self.state.lock();
        if state.latencies.len() < self.config.trend_min_samples {
            return None;
        }
        let samples: Vec<f64> = state.latencies.iter().copied().collect();
        Some(slope(&samples))
    }

    pub fn budget(&self) -> u32 {
        self.state.lock().budget.current()
    }

    pub fn snapshot(&self) -> HealthSnapshot {
        let trend = self.trend();
        let state = self.state.lock();
        HealthSnapshot {
            samples: state.latencies.len(),
            average_latency_ms: state.average_latency(),
            trend,
            budget: state.budget.current(),
        }
    }

    /// One governance pass: refill the budget, then collect every signal the
    /// current state warrants.
    pub fn govern(&self) -> Vec<ControlSignal> {
        let cfg = &self.config;
        let mut signals = Vec::new();

        if let Some(trend) = self.trend() {
            if trend > cfg.trend_threshold {
                signals.push(ControlSignal {
                    signal: SignalKind::Throttle,
                    reason: "latency acceleration".into(),
                    metric: trend,
                });
            }
        }

        let mut state = self.state.lock();
        state
            .budget
            .refill(Instant::now(), cfg.refill_interval(), cfg.refill_amount);

        let budget = state.budget.current();
        if budget < cfg.stealth_low_water {
            signals.push(ControlSignal {
                signal: SignalKind::StealthMode,
                reason: "error budget depleted".into(),
                metric: f64::from(budget),
            });
        }

        if state.outcomes.len() >= cfg.rotation_min_samples {
            let blocked = state.outcomes.iter().filter(|&&failed| failed).count();
            let rate = blocked as f64 / state.outcomes.len() as f64;
            if rate > cfg.block_rate_threshold {
                signals.push(ControlSignal {
                    signal: SignalKind::InfraRotate,
                    reason: "high block rate".into(),
                    metric: rate,
                });
                state.outcomes.clear();
            }
        }
        signals
    }
}

impl PreflightGate for AdmissionController {
    fn preflight(&self, packet: &JobPacket) -> PreflightDecision {
        let state = self.state.lock();
        if let Some(avg) = state.average_latency() {
            if avg > self.config.latency_ceiling_ms {
                debug!(job_id = %packet.id, avg, "pre-flight denied: latency");
                return PreflightDecision::Deny {
                    reason: format!("high latency ({avg:.1}ms)"),
                };
            }
        }
        let budget = state.budget.current();
        if budget < self.config.preflight_budget_floor {
            debug!(job_id = %packet.id, budget, "pre-flight denied: budget");
            return PreflightDecision::Deny {
                reason: format!("low error budget ({budget})"),
            };
        }
        PreflightDecision::Allow
    }
}

#[async_trait]
impl Worker for AdmissionController {
    fn id(&self) -> WorkerId {
        WorkerId::Cortex
    }

    fn subscriptions(&self) -> &'static [EventType] {
        &[EventType::JobCompleted]
    }

    async fn handle_event(&self, _ctx: &WorkerContext, event: Arc<Event>) -> anyhow::Result<()> {
        let result: ResultPacket = event.decode()?;
        self.observe(&result);
        Ok(())
    }

    fn tick_interval(&self) -> Option<Duration> {
        Some(self.tick)
    }

    async fn tick(&self, ctx: &WorkerContext) -> anyhow::Result<()> {
        for signal in self.govern() {
            warn!(signal = ?signal.signal, reason = %signal.reason, metric = signal.metric, "control signal");
            ctx.publish(Event::control(self.id(), &signal)?);
        }
        Ok(())
    }
}
