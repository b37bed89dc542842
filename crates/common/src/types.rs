//! Core data types shared by every crate of the swarm
//!
//! Events are the only thing that crosses the fabric. Packets travel inside event
//! payloads as JSON objects, so string keys exist only at that serialization
//! boundary; everything else is a closed enum.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

use crate::error::{HiveError, HiveResult};

/// JSON object carried by every event.
pub type Payload = serde_json::Map<String, Value>;

/// Closed vocabulary of fabric events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    SystemStart,
    Log,
    TargetAcquired,
    VulnCandidate,
    VulnConfirmed,
    AgentStatus,
    JobAssigned,
    JobCompleted,
    ControlSignal,
}

impl EventType {
    pub const ALL: [EventType; 9] = [
        EventType::SystemStart,
        EventType::Log,
        EventType::TargetAcquired,
        EventType::VulnCandidate,
        EventType::VulnConfirmed,
        EventType::AgentStatus,
        EventType::JobAssigned,
        EventType::JobCompleted,
        EventType::ControlSignal,
    ];

    #[inline]
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            EventType::SystemStart => "SYSTEM_START",
            EventType::Log => "LOG",
            EventType::TargetAcquired => "TARGET_ACQUIRED",
            EventType::VulnCandidate => "VULN_CANDIDATE",
            EventType::VulnConfirmed => "VULN_CONFIRMED",
            EventType::AgentStatus => "AGENT_STATUS",
            EventType::JobAssigned => "JOB_ASSIGNED",
            EventType::JobCompleted => "JOB_COMPLETED",
            EventType::ControlSignal => "CONTROL_SIGNAL",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of every worker in the roster. Routing is equality on this value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerId {
    Strategist,
    Scout,
    Breaker,
    Auditor,
    Sentinel,
    Inspector,
    Librarian,
    Cortex,
}

impl WorkerId {
    pub const ROSTER: [WorkerId; 8] = [
        WorkerId::Strategist,
        WorkerId::Scout,
        WorkerId::Breaker,
        WorkerId::Auditor,
        WorkerId::Sentinel,
        WorkerId::Inspector,
        WorkerId::Librarian,
        WorkerId::Cortex,
    ];

    #[inline]
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            WorkerId::Strategist => "strategist",
            WorkerId::Scout => "scout",
            WorkerId::Breaker => "breaker",
            WorkerId::Auditor => "auditor",
            WorkerId::Sentinel => "sentinel",
            WorkerId::Inspector => "inspector",
            WorkerId::Librarian => "librarian",
            WorkerId::Cortex => "cortex",
        }
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Technique modules a job can ask for. Implementations live outside the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArsenalKind {
    WorkflowSkip,
    AuthBypass,
    FinancialLogic,
    ObjectReference,
    SqlInjection,
    ApiFuzzer,
    TokenCracker,
    /// Passive DOM risk analysis; built into the Sentinel.
    DomAnalysis,
    /// Click/submit intent judgement; built into the Inspector.
    IntentCheck,
}

impl ArsenalKind {
    pub const ALL: [ArsenalKind; 9] = [
        ArsenalKind::WorkflowSkip,
        ArsenalKind::AuthBypass,
        ArsenalKind::FinancialLogic,
        ArsenalKind::ObjectReference,
        ArsenalKind::SqlInjection,
        ArsenalKind::ApiFuzzer,
        ArsenalKind::TokenCracker,
        ArsenalKind::DomAnalysis,
        ArsenalKind::IntentCheck,
    ];

    #[inline]
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            ArsenalKind::WorkflowSkip => "workflow_skip",
            ArsenalKind::AuthBypass => "auth_bypass",
            ArsenalKind::FinancialLogic => "financial_logic",
            ArsenalKind::ObjectReference => "object_reference",
            ArsenalKind::SqlInjection => "sql_injection",
            ArsenalKind::ApiFuzzer => "api_fuzzer",
            ArsenalKind::TokenCracker => "token_cracker",
            ArsenalKind::DomAnalysis => "dom_analysis",
            ArsenalKind::IntentCheck => "intent_check",
        }
    }

    /// Worker whose arsenal carries this technique.
    #[must_use]
    pub const fn owner(&self) -> WorkerId {
        match self {
            ArsenalKind::WorkflowSkip | ArsenalKind::AuthBypass => WorkerId::Scout,
            ArsenalKind::FinancialLogic | ArsenalKind::ObjectReference => WorkerId::Auditor,
            ArsenalKind::SqlInjection | ArsenalKind::ApiFuzzer | ArsenalKind::TokenCracker => {
                WorkerId::Breaker
            }
            ArsenalKind::DomAnalysis => WorkerId::Sentinel,
            ArsenalKind::IntentCheck => WorkerId::Inspector,
        }
    }

    /// Severity a positive hit from this technique is reported with.
    #[must_use]
    pub const fn default_severity(&self) -> Severity {
        match self {
            ArsenalKind::SqlInjection | ArsenalKind::TokenCracker | ArsenalKind::IntentCheck => {
                Severity::Critical
            }
            ArsenalKind::AuthBypass | ArsenalKind::ObjectReference => Severity::High,
            _ => Severity::Medium,
        }
    }
}

impl fmt::Display for ArsenalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Critical,
    High,
    #[default]
    Normal,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Info,
}

impl Severity {
    #[inline]
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "Critical",
            Severity::High => "High",
            Severity::Medium => "Medium",
            Severity::Low => "Low",
            Severity::Info => "Info",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a job points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskTarget {
    pub url: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub payload: Option<Value>,
}

fn default_method() -> String {
    "GET".to_string()
}

impl TaskTarget {
    #[inline]
    #[must_use]
    pub fn new<S: Into<String>>(url: S) -> Self {
        Self {
            url: url.into(),
            method: default_method(),
            headers: BTreeMap::new(),
            payload: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn with_method<S: Into<String>>(mut self, method: S) -> Self {
        self.method = method.into();
        self
    }

    #[inline]
    #[must_use]
    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }
}

/// Which module runs a job and which worker owns it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleConfig {
    pub module: ArsenalKind,
    pub worker: WorkerId,
    /// 1 (gentle) to 10 (loud). Out-of-range wire values are clamped.
    #[serde(deserialize_with = "clamped_aggression")]
    pub aggression: u8,
    #[serde(default = "default_ai_assist")]
    pub ai_assist: bool,
}

fn default_ai_assist() -> bool {
    true
}

fn clamped_aggression<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = i64::deserialize(deserializer)?;
    let clamped = raw.clamp(
        i64::from(ModuleConfig::MIN_AGGRESSION),
        i64::from(ModuleConfig::MAX_AGGRESSION),
    );
    Ok(clamped as u8)
}

impl ModuleConfig {
    pub const MIN_AGGRESSION: u8 = 1;
    pub const MAX_AGGRESSION: u8 = 10;

    #[must_use]
    pub fn new(module: ArsenalKind, worker: WorkerId) -> Self {
        Self {
            module,
            worker,
            aggression: 5,
            ai_assist: true,
        }
    }

    /// Aggression is clamped into 1..=10.
    #[inline]
    #[must_use]
    pub fn with_aggression(mut self, aggression: u8) -> Self {
        self.aggression = aggression.clamp(Self::MIN_AGGRESSION, Self::MAX_AGGRESSION);
        self
    }

    #[inline]
    #[must_use]
    pub fn with_ai_assist(mut self, ai_assist: bool) -> Self {
        self.ai_assist = ai_assist;
        self
    }
}

/// A unit of work addressed to exactly one worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobPacket {
    pub id: Uuid,
    pub priority: Priority,
    pub target: TaskTarget,
    pub config: ModuleConfig,
    pub created_at: DateTime<Utc>,
}

impl JobPacket {
    #[must_use]
    pub fn new(target: TaskTarget, config: ModuleConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            priority: Priority::default(),
            target,
            config,
            created_at: Utc::now(),
        }
    }

    #[inline]
    #[must_use]
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// True when `worker` is the only worker allowed to act on this packet.
    #[inline]
    #[must_use]
    pub fn is_owned_by(&self, worker: WorkerId) -> bool {
        self.config.worker == worker
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vulnerability {
    pub name: String,
    pub severity: Severity,
    pub description: String,
    pub evidence: String,
}

impl Vulnerability {
    #[must_use]
    pub fn new<S: Into<String>>(name: S, severity: Severity) -> Self {
        Self {
            name: name.into(),
            severity,
            description: String::new(),
            evidence: String::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn with_description<S: Into<String>>(mut self, description: S) -> Self {
        self.description = description.into();
        self
    }

    #[inline]
    #[must_use]
    pub fn with_evidence<S: Into<String>>(mut self, evidence: S) -> Self {
        self.evidence = evidence.into();
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResultStatus {
    Success,
    VulnFound,
    Failure,
    /// The pre-flight gate denied the job; nothing was sent to the target.
    Throttled,
}

/// Hint a module leaves for whoever reads its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NextStep {
    /// Re-run gently to confirm a finding.
    Verify,
    /// The target pushed back; try a different payload shape.
    Escalate,
}

/// Outcome of one JobPacket. Produced exactly once per packet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultPacket {
    pub job_id: Uuid,
    pub source: WorkerId,
    pub status: ResultStatus,
    pub execution_time_ms: f64,
    #[serde(default)]
    pub findings: Vec<Vulnerability>,
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub next_step: Option<NextStep>,
}

impl ResultPacket {
    #[must_use]
    pub fn new(job_id: Uuid, source: WorkerId, status: ResultStatus) -> Self {
        Self {
            job_id,
            source,
            status,
            execution_time_ms: 0.0,
            findings: Vec::new(),
            data: Value::Null,
            next_step: None,
        }
    }

    /// A failed result carrying the error text in `data.error`.
    #[must_use]
    pub fn failed<S: Into<String>>(job_id: Uuid, source: WorkerId, error: S) -> Self {
        Self::new(job_id, source, ResultStatus::Failure)
            .with_data(serde_json::json!({ "error": error.into() }))
    }

    #[must_use]
    pub fn throttled<S: Into<String>>(job_id: Uuid, source: WorkerId, reason: S) -> Self {
        Self::new(job_id, source, ResultStatus::Throttled)
            .with_data(serde_json::json!({ "reason": reason.into() }))
    }

    #[inline]
    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_finding(mut self, finding: Vulnerability) -> Self {
        self.findings.push(finding);
        self.status = ResultStatus::VulnFound;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_next_step(mut self, next: NextStep) -> Self {
        self.next_step = Some(next);
        self
    }

    #[inline]
    pub fn set_execution_time(&mut self, elapsed: Duration) {
        self.execution_time_ms = elapsed.as_secs_f64() * 1000.0;
    }

    #[inline]
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.status, ResultStatus::Success | ResultStatus::VulnFound)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateTag {
    Api,
    ObjectReference,
}

/// Something a worker thinks is worth a closer look.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub url: String,
    pub tag: CandidateTag,
}

/// Payload of VULN_CONFIRMED.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub url: String,
    pub worker: WorkerId,
    pub vulnerability: Vulnerability,
    #[serde(default)]
    pub risk_score: Option<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalKind {
    Throttle,
    StealthMode,
    InfraRotate,
}

/// Advisory broadcast from the admission controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlSignal {
    pub signal: SignalKind,
    pub reason: String,
    /// The measurement that tripped the signal (slope, budget, block rate).
    pub metric: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerState {
    #[default]
    Offline,
    Online,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusReport {
    pub worker: WorkerId,
    pub state: WorkerState,
}

/// The fundamental unit of communication. Immutable once published.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub source: String,
    #[serde(default)]
    pub payload: Payload,
}

impl Event {
    pub const ORCHESTRATOR: &'static str = "orchestrator";

    #[must_use]
    pub fn new<S: Into<String>>(event_type: EventType, source: S, payload: Payload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            event_type,
            source: source.into(),
            payload,
        }
    }

    /// Serialize `body` into the payload map. Non-object bodies land under `"value"`.
    pub fn from_body<S: Into<String>, T: Serialize>(
        event_type: EventType,
        source: S,
        body: &T,
    ) -> HiveResult<Self> {
        let payload = match serde_json::to_value(body)? {
            Value::Object(map) => map,
            Value::Null => Payload::new(),
            other => {
                let mut map = Payload::new();
                map.insert("value".to_string(), other);
                map
            }
        };
        Ok(Self::new(event_type, source, payload))
    }

    /// Decode the payload back into a typed body.
    pub fn decode<T: DeserializeOwned>(&self) -> HiveResult<T> {
        serde_json::from_value(Value::Object(self.payload.clone())).map_err(|e| {
            HiveError::Decode(format!("{} payload from {}: {}", self.event_type, self.source, e))
        })
    }

    #[must_use]
    pub fn payload_str(&self, key: &str) -> Option<&str> {
        self.payload.get(key).and_then(Value::as_str)
    }

    pub fn job_assigned(source: WorkerId, packet: &JobPacket) -> HiveResult<Self> {
        Self::from_body(EventType::JobAssigned, source.as_str(), packet)
    }

    pub fn job_completed(source: WorkerId, result: &ResultPacket) -> HiveResult<Self> {
        Self::from_body(EventType::JobCompleted, source.as_str(), result)
    }

    pub fn candidate(source: WorkerId, candidate: &Candidate) -> HiveResult<Self> {
        Self::from_body(EventType::VulnCandidate, source.as_str(), candidate)
    }

    pub fn confirmed(source: WorkerId, finding: &Finding) -> HiveResult<Self> {
        Self::from_body(EventType::VulnConfirmed, source.as_str(), finding)
    }

    pub fn control(source: WorkerId, signal: &ControlSignal) -> HiveResult<Self> {
        Self::from_body(EventType::ControlSignal, source.as_str(), signal)
    }

    pub fn status(worker: WorkerId, state: WorkerState) -> HiveResult<Self> {
        Self::from_body(EventType::AgentStatus, worker.as_str(), &StatusReport { worker, state })
    }

    #[must_use]
    pub fn target_acquired<S: Into<String>>(source: &str, url: S) -> Self {
        let mut payload = Payload::new();
        payload.insert("url".to_string(), Value::String(url.into()));
        Self::new(EventType::TargetAcquired, source, payload)
    }

    #[must_use]
    pub fn log<S: Into<String>>(source: &str, message: S) -> Self {
        let mut payload = Payload::new();
        payload.insert("message".to_string(), Value::String(message.into()));
        Self::new(EventType::Log, source, payload)
    }
}

/// Counts of jobs seen over one mission.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobTally {
    pub assigned: usize,
    pub completed: usize,
    pub failed: usize,
    pub throttled: usize,
}

/// Everything the reporting collaborator receives at the end of a mission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MissionReport {
    pub mission_id: Uuid,
    pub target_url: String,
    pub started_at: DateTime<Utc>,
    pub duration: Duration,
    pub events: Vec<Event>,
    pub findings: Vec<Finding>,
    pub severity_counts: BTreeMap<Severity, usize>,
    pub jobs: JobTally,
}

impl MissionReport {
    #[must_use]
    pub fn finding_count(&self) -> usize {
        self.findings.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn packet() -> JobPacket {
        JobPacket::new(
            TaskTarget::new("https://shop.example/cart"),
            ModuleConfig::new(ArsenalKind::FinancialLogic, WorkerId::Auditor).with_aggression(8),
        )
    }

    #[test]
    fn job_packet_ownership() {
        let p = packet();
        assert!(p.is_owned_by(WorkerId::Auditor));
        assert!(!p.is_owned_by(WorkerId::Scout));
    }

    #[test]
    fn aggression_is_clamped() {
        let cfg = ModuleConfig::new(ArsenalKind::ApiFuzzer, WorkerId::Breaker).with_aggression(42);
        assert_eq!(cfg.aggression, 10);
        let cfg = cfg.with_aggression(0);
        assert_eq!(cfg.aggression, 1);
    }

    #[test]
    fn wire_aggression_is_clamped_on_decode() {
        for (sent, expected) in [(0, 1), (200, 10), (-3, 1), (7, 7)] {
            let mut body = serde_json::to_value(packet()).unwrap();
            body["config"]["aggression"] = serde_json::json!(sent);
            let event = Event::from_body(EventType::JobAssigned, "strategist", &body).unwrap();

            let decoded: JobPacket = event.decode().unwrap();
            assert_eq!(decoded.config.aggression, expected, "sent {sent}");
        }
    }

    #[test]
    fn job_event_decodes_back_to_packet() {
        let p = packet().with_priority(Priority::High);
        let event = Event::job_assigned(WorkerId::Strategist, &p).unwrap();
        assert_eq!(event.event_type, EventType::JobAssigned);
        assert_eq!(event.source, "strategist");
        assert_eq!(event.payload_str("priority"), Some("high"));

        let decoded: JobPacket = event.decode().unwrap();
        assert_eq!(decoded, p);
    }

    #[test]
    fn decode_mismatch_is_an_error() {
        let event = Event::log("scout", "hello");
        assert!(event.decode::<JobPacket>().is_err());
    }

    #[test]
    fn result_packet_builders() {
        let id = Uuid::new_v4();
        let r = ResultPacket::new(id, WorkerId::Breaker, ResultStatus::Success)
            .with_finding(Vulnerability::new("SQLI", Severity::Critical).with_evidence("' OR 1=1--"));
        assert_eq!(r.status, ResultStatus::VulnFound);
        assert!(r.is_success());

        let failed = ResultPacket::failed(id, WorkerId::Breaker, "connect timeout");
        assert!(!failed.is_success());
        assert_eq!(failed.data["error"], "connect timeout");
    }

    #[test]
    fn wire_names_are_stable() {
        assert_eq!(serde_json::to_string(&EventType::JobCompleted).unwrap(), "\"JOB_COMPLETED\"");
        assert_eq!(serde_json::to_string(&ArsenalKind::WorkflowSkip).unwrap(), "\"workflow_skip\"");
        assert_eq!(serde_json::to_string(&WorkerId::Cortex).unwrap(), "\"cortex\"");
        assert_eq!(serde_json::to_string(&SignalKind::InfraRotate).unwrap(), "\"INFRA_ROTATE\"");
    }

    #[test]
    fn every_technique_has_an_executing_owner() {
        for kind in ArsenalKind::ALL {
            assert!(matches!(
                kind.owner(),
                WorkerId::Scout
                    | WorkerId::Breaker
                    | WorkerId::Auditor
                    | WorkerId::Sentinel
                    | WorkerId::Inspector
            ));
        }
        assert_eq!(ArsenalKind::ApiFuzzer.owner(), WorkerId::Breaker);
    }

    #[test]
    fn scalar_body_is_wrapped() {
        let event = Event::from_body(EventType::Log, "x", &42).unwrap();
        assert_eq!(event.payload["value"], 42);
    }
}
