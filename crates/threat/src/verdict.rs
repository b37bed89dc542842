//! Input, output and tuning types of the scoring pipeline

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Everything `analyze` accepts. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThreatInput {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub domain: Option<String>,
    /// Element reported hidden by the caller.
    #[serde(default)]
    pub hidden: bool,
    /// Raw DOM element description (styles), parsed leniently.
    #[serde(default)]
    pub element: Option<Value>,
}

impl ThreatInput {
    #[must_use]
    pub fn text<S: Into<String>>(text: S) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn domain<S: Into<String>>(domain: S) -> Self {
        Self {
            domain: Some(domain.into()),
            ..Self::default()
        }
    }

    #[inline]
    #[must_use]
    pub fn with_domain<S: Into<String>>(mut self, domain: S) -> Self {
        self.domain = Some(domain.into());
        self
    }

    #[inline]
    #[must_use]
    pub fn with_hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_element(mut self, element: Value) -> Self {
        self.element = Some(element);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Allow,
    Warn,
    Block,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Verdict::Allow => "ALLOW",
            Verdict::Warn => "WARN",
            Verdict::Block => "BLOCK",
        })
    }
}

/// Signal-producing pipeline stages, in the order they run and report.
/// Decoding only feeds candidates forward and has no stage of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Sanitize,
    Skeleton,
    Vector,
    Entropy,
    Syntax,
    Typosquat,
    Context,
}

/// One weighted contribution to the aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskSignal {
    pub stage: Stage,
    pub weight: f64,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreatVerdict {
    pub verdict: Verdict,
    /// 0..=100
    pub score: u8,
    /// Every signal that fired, in stage order.
    pub reasons: Vec<String>,
    pub signals: Vec<RiskSignal>,
    pub layer: String,
}

impl ThreatVerdict {
    #[must_use]
    pub fn summary(&self) -> String {
        if self.reasons.is_empty() {
            "no risk signals".to_string()
        } else {
            self.reasons.join(" | ")
        }
    }

    #[inline]
    #[must_use]
    pub fn fired(&self, stage: Stage) -> bool {
        self.signals.iter().any(|s| s.stage == stage)
    }
}

/// Fixed weights and thresholds of the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThreatConfig {
    pub max_decode_depth: usize,
    /// Decoded layers must be longer than this to count as new text.
    pub min_decoded_len: usize,
    pub entropy_threshold: f64,
    pub entropy_min_len: usize,
    pub syntax_threshold: f64,
    pub syntax_min_len: usize,
    pub logistic_steepness: f64,
    pub logistic_midpoint: f64,
    pub block_at: u8,
    pub warn_at: u8,
    pub weights: SignalWeights,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalWeights {
    pub invisible_chars: f64,
    pub homoglyphs: f64,
    pub injection_skeleton: f64,
    pub entropy: f64,
    pub syntax_density: f64,
    pub typosquat: f64,
    pub hidden: f64,
    pub low_opacity: f64,
    pub extreme_z_index: f64,
    pub zero_font: f64,
}

impl Default for SignalWeights {
    fn default() -> Self {
        Self {
            invisible_chars: 20.0,
            homoglyphs: 25.0,
            injection_skeleton: 100.0,
            entropy: 40.0,
            syntax_density: 50.0,
            typosquat: 95.0,
            hidden: 30.0,
            low_opacity: 40.0,
            extreme_z_index: 30.0,
            zero_font: 30.0,
        }
    }
}

impl Default for ThreatConfig {
    fn default() -> Self {
        Self {
            max_decode_depth: 3,
            min_decoded_len: 4,
            entropy_threshold: 4.85,
            entropy_min_len: 25,
            syntax_threshold: 0.25,
            syntax_min_len: 10,
            logistic_steepness: 0.1,
            logistic_midpoint: 40.0,
            block_at: 75,
            warn_at: 50,
            weights: SignalWeights::default(),
        }
    }
}
