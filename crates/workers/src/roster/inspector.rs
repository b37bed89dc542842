//! Inspector - intent judgement for intercepted clicks and form submits
//!
//! A job for the Inspector carries one intercepted browser event in its
//! payload (`innerText`, `action`, `method`, `is_overlay`). The event is
//! blocked when the page lies about what the click does.

use async_trait::async_trait;
use hive_common::{ArsenalKind, JobPacket, ResultPacket, ResultStatus, Severity, Vulnerability, WorkerId};
use hive_threat::sanitize::sanitize;
use hive_threat::typosquat::{brand, domain_root};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use tracing::{debug, info};

use crate::worker::{Worker, WorkerContext};

/// Words a button uses to promise that nothing will happen.
const SAFE_LABELS: &[&str] = &["cancel", "back", "close", "no", "decline"];
const RISKY_ACTIONS: &[&str] = &["pay", "subscribe", "buy", "order", "confirm", "submit"];
const LOOKALIKE_HOSTS: &[&str] = &["g00gle.com", "linked1n.com", "paypa1.com"];
const DECEPTION_SCORE: u8 = 95;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum IntentAction {
    Allow,
    Block,
}

impl fmt::Display for IntentAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            IntentAction::Allow => "ALLOW",
            IntentAction::Block => "BLOCK",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentVerdict {
    pub action: IntentAction,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<u8>,
}

impl IntentVerdict {
    fn allow() -> Self {
        Self {
            action: IntentAction::Allow,
            reason: "intent verified".into(),
            score: None,
        }
    }

    fn block<S: Into<String>>(reason: S) -> Self {
        Self {
            action: IntentAction::Block,
            reason: reason.into(),
            score: None,
        }
    }

    pub fn is_block(&self) -> bool {
        self.action == IntentAction::Block
    }
}

/// Host of `url` that imitates a trusted site: a known lookalike, a
/// mixed-script root, or a root that spells a trusted brand once its
/// homoglyphs are folded.
fn phishing_host(url: &str) -> Option<String> {
    let lowered = url.to_lowercase();
    if let Some(fake) = LOOKALIKE_HOSTS.iter().find(|fake| lowered.contains(**fake)) {
        return Some((*fake).to_string());
    }

    let root = domain_root(url)?;
    let folded = sanitize(&root);
    if folded.homoglyphs_folded == 0 {
        return None;
    }
    let mixed_script = root.chars().any(|c| c.is_ascii_alphanumeric());
    (mixed_script || brand(&folded.text).is_some()).then_some(root)
}

/// Whole-word match, so "now" is not "no".
fn has_word(text: &str, words: &[&str]) -> bool {
    text.split(|c: char| !c.is_alphanumeric())
        .any(|word| words.contains(&word))
}

/// Decide whether the intercepted event at `url` may proceed.
pub fn judge_intent(url: &str, event: Option<&Value>) -> IntentVerdict {
    let field = |key: &str| event.and_then(|e| e.get(key)).and_then(Value::as_str).unwrap_or_default();

    if let Some(host) = phishing_host(url) {
        return IntentVerdict::block(format!("phishing domain detected ({host})"));
    }

    let label = field("innerText").to_lowercase();
    let action = field("action").to_lowercase();
    let posts = field("method").eq_ignore_ascii_case("POST");
    let risky = posts || RISKY_ACTIONS.iter().any(|w| action.contains(*w));
    if has_word(&label, SAFE_LABELS) && risky {
        let target = if action.is_empty() { "a POST" } else { action.as_str() };
        return IntentVerdict {
            score: Some(DECEPTION_SCORE),
            ..IntentVerdict::block(format!("deceptive UI: '{}' triggers '{}'", label.trim(), target))
        };
    }

    let overlay = event
        .and_then(|e| e.get("is_overlay"))
        .and_then(Value::as_bool)
        .unwrap_or(false);
    if overlay {
        return IntentVerdict::block("clickjacking overlay detected");
    }

    IntentVerdict::allow()
}

/// Interceptor for dark patterns. Blocks are reported as critical
/// DARK_PATTERN findings, so the fabric path confirms them like any other.
#[derive(Debug, Default)]
pub struct Inspector;

impl Inspector {
    pub fn new() -> Self {
        Self
    }

    fn judge(&self, packet: &JobPacket) -> ResultPacket {
        let event = packet.target.payload.as_ref();
        let verdict = judge_intent(&packet.target.url, event);
        debug!(url = %packet.target.url, action = %verdict.action, "intent judged");

        let data = serde_json::to_value(&verdict).unwrap_or(Value::Null);
        let result = ResultPacket::new(packet.id, self.id(), ResultStatus::Success).with_data(data);
        if !verdict.is_block() {
            return result;
        }

        info!(url = %packet.target.url, reason = %verdict.reason, "event blocked");
        let label = event
            .and_then(|e| e.get("innerText"))
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        result.with_finding(
            Vulnerability::new("DARK_PATTERN", Severity::Critical)
                .with_description(format!("blocked: {}", verdict.reason))
                .with_evidence(format!("button: {label}")),
        )
    }
}

#[async_trait]
impl Worker for Inspector {
    fn id(&self) -> WorkerId {
        WorkerId::Inspector
    }

    async fn execute_task(&self, ctx: &WorkerContext, packet: &JobPacket) -> ResultPacket {
        if packet.config.module == ArsenalKind::IntentCheck {
            self.judge(packet)
        } else {
            ctx.run_module(self.id(), packet).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hive_common::{Event, EventType, Finding, ModuleConfig, TaskTarget};
    use hive_fabric::MessageFabric;
    use serde_json::json;
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    fn intercepted(url: &str, event: Value) -> JobPacket {
        JobPacket::new(
            TaskTarget::new(url).with_payload(event),
            ModuleConfig::new(ArsenalKind::IntentCheck, WorkerId::Inspector),
        )
    }

    async fn judge(url: &str, event: Value) -> ResultPacket {
        let ctx = WorkerContext::new(MessageFabric::new());
        Inspector::new().execute_task(&ctx, &intercepted(url, event)).await
    }

    #[tokio::test]
    async fn lookalike_host_is_phishing() {
        let result = judge("https://login.paypa1.com/pay", json!({ "innerText": "Log in" })).await;
        assert_eq!(result.status, ResultStatus::VulnFound);
        assert_eq!(result.data["action"], "BLOCK");
        assert!(result.data["reason"].as_str().unwrap().contains("phishing domain detected (paypa1.com)"));
        assert_eq!(result.findings[0].name, "DARK_PATTERN");
        assert_eq!(result.findings[0].severity, Severity::Critical);
    }

    #[test]
    fn homoglyph_host_is_phishing() {
        let verdict = judge_intent("https://раураl.com/checkout", None);
        assert!(verdict.is_block());
        assert!(verdict.reason.starts_with("phishing domain detected"));

        let mixed = judge_intent("https://secure-bаnk.com/login", None);
        assert!(mixed.is_block());

        assert!(!judge_intent("https://paypal.com/checkout", None).is_block());
    }

    #[tokio::test]
    async fn cancel_button_that_pays_is_blocked() {
        let result = judge(
            "https://shop.example/cart",
            json!({ "innerText": "No thanks, cancel", "action": "/checkout/pay" }),
        )
        .await;
        assert_eq!(result.status, ResultStatus::VulnFound);
        assert_eq!(result.data["score"], 95);
        assert_eq!(result.findings[0].severity, Severity::Critical);
        assert_eq!(result.findings[0].evidence, "button: No thanks, cancel");
    }

    #[test]
    fn safe_label_with_post_is_blocked() {
        let verdict = judge_intent(
            "https://news.example/offer",
            Some(&json!({ "innerText": "Close", "method": "post" })),
        );
        assert!(verdict.is_block());
        assert_eq!(verdict.reason, "deceptive UI: 'close' triggers 'a POST'");
        assert_eq!(verdict.score, Some(95));
    }

    #[test]
    fn overlay_is_clickjacking() {
        let verdict = judge_intent(
            "https://video.example/watch",
            Some(&json!({ "innerText": "Play", "is_overlay": true })),
        );
        assert!(verdict.is_block());
        assert_eq!(verdict.reason, "clickjacking overlay detected");
    }

    #[tokio::test]
    async fn honest_buttons_are_allowed() {
        let result = judge(
            "https://shop.example/cart",
            json!({ "innerText": "Confirm now", "action": "/checkout/pay", "method": "POST" }),
        )
        .await;
        assert_eq!(result.status, ResultStatus::Success);
        assert!(result.findings.is_empty());
        assert_eq!(result.data["action"], "ALLOW");
        assert!(result.data.get("score").is_none());

        assert!(!judge_intent("https://shop.example", Some(&json!({ "innerText": "Back" }))).is_block());
    }

    #[tokio::test]
    async fn blocks_on_the_fabric_are_confirmed() {
        let fabric = MessageFabric::new();
        let (tx, mut confirmed) = mpsc::unbounded_channel();
        fabric.subscribe(EventType::VulnConfirmed, move |event| {
            let tx = tx.clone();
            async move {
                tx.send(event.decode::<Finding>()?)?;
                Ok::<(), anyhow::Error>(())
            }
        });
        let ctx = WorkerContext::new(fabric);
        let packet = intercepted(
            "https://shop.example/cart",
            json!({ "innerText": "Decline", "action": "subscribe" }),
        );
        let event = Event::job_assigned(WorkerId::Strategist, &packet).unwrap();

        crate::worker::run_assigned(&Inspector::new(), &ctx, &event).await.unwrap();
        let finding = timeout(Duration::from_secs(1), confirmed.recv()).await.unwrap().unwrap();
        assert_eq!(finding.worker, WorkerId::Inspector);
        assert_eq!(finding.url, "https://shop.example/cart");
        assert_eq!(finding.risk_score, Some(95));
    }
}
