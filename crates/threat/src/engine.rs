use crate::context::ElementStyle;
use crate::decode::{self, Candidate, Layer};
use crate::measures::{shannon_entropy, syntax_density};
use crate::sanitize::sanitize;
use crate::skeleton::match_injection;
use crate::typosquat;
use crate::vectors::{self, VectorMatch};
use crate::verdict::{RiskSignal, Stage, ThreatConfig, ThreatInput, ThreatVerdict, Verdict};
use tracing::debug;

const LAYER_TAG: &str = "HEURISTIC";

/// Stateless layered risk evaluator.
///
/// `analyze` is a pure function of its input and the fixed configuration, so
/// one engine may be shared freely across tasks.
#[derive(Debug, Clone, Default)]
pub struct ThreatScoringEngine {
    config: ThreatConfig,
}

impl ThreatScoringEngine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_config(config: ThreatConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ThreatConfig {
        &self.config
    }

    pub fn analyze(&self, input: &ThreatInput) -> ThreatVerdict {
        let mut signals = Vec::new();

        if let Some(text) = input.text.as_deref().filter(|t| !t.is_empty()) {
            self.score_text(text, &mut signals);
        }
        if let Some(domain) = input.domain.as_deref() {
            self.score_domain(domain, &mut signals);
        }
        self.score_context(input, &mut signals);

        let score = self.aggregate(&signals);
        let verdict = if score >= self.config.block_at {
            Verdict::Block
        } else if score >= self.config.warn_at {
            Verdict::Warn
        } else {
            Verdict::Allow
        };

        debug!(%verdict, score, signals = signals.len(), "threat analysis complete");

        ThreatVerdict {
            verdict,
            score,
            reasons: signals.iter().map(|s| s.reason.clone()).collect(),
            signals,
            layer: LAYER_TAG.to_string(),
        }
    }

    fn score_text(&self, raw: &str, signals: &mut Vec<RiskSignal>) {
        let weights = &self.config.weights;
        let clean = sanitize(raw);

        if clean.invisible_removed > 0 {
            signals.push(signal(
                Stage::Sanitize,
                weights.invisible_chars,
                format!("{} invisible characters stripped", clean.invisible_removed),
            ));
        }
        if clean.homoglyphs_folded > 0 {
            signals.push(signal(
                Stage::Sanitize,
                weights.homoglyphs,
                format!("{} homoglyphs normalized", clean.homoglyphs_folded),
            ));
        }

        let candidates = decode::expand(
            &clean.text,
            self.config.max_decode_depth,
            self.config.min_decoded_len,
        );

        for c in &candidates {
            if let Some(pattern) = match_injection(&c.text) {
                signals.push(signal(
                    Stage::Skeleton,
                    weights.injection_skeleton,
                    format!("injection skeleton '{pattern}' in {} layer", c.layer.as_str()),
                ));
            }
        }

        let mut best: Option<(VectorMatch, Layer)> = None;
        for c in &candidates {
            if let Some(m) = vectors::fingerprint(&c.text) {
                if best.map_or(true, |(b, _)| m.risk > b.risk) {
                    best = Some((m, c.layer));
                }
            }
        }
        if let Some((m, layer)) = best {
            signals.push(signal(
                Stage::Vector,
                f64::from(m.risk),
                format!(
                    "{} vector ({} indicators) in {} layer",
                    m.name,
                    m.hits,
                    layer.as_str()
                ),
            ));
        }

        // Reversal and rotation permute characters, so their statistics
        // duplicate the original's.
        let measured: Vec<&Candidate> = candidates
            .iter()
            .filter(|c| !matches!(c.layer, Layer::Reversed | Layer::Rot13))
            .collect();

        for c in &measured {
            if c.text.chars().count() < self.config.entropy_min_len {
                continue;
            }
            let entropy = shannon_entropy(&c.text);
            if entropy > self.config.entropy_threshold {
                signals.push(signal(
                    Stage::Entropy,
                    weights.entropy,
                    format!("high entropy {entropy:.2} in {} layer", c.layer.as_str()),
                ));
            }
        }

        for c in &measured {
            if c.text.chars().count() <= self.config.syntax_min_len {
                continue;
            }
            let density = syntax_density(&c.text);
            if density > self.config.syntax_threshold {
                signals.push(signal(
                    Stage::Syntax,
                    weights.syntax_density,
                    format!("code syntax density {density:.2} in {} layer", c.layer.as_str()),
                ));
            }
        }
    }

    fn score_domain(&self, domain: &str, signals: &mut Vec<RiskSignal>) {
        let folded = sanitize(domain);
        if folded.homoglyphs_folded > 0 {
            let spoofed = typosquat::domain_root(&folded.text).and_then(|root| typosquat::brand(&root));
            if let Some(trusted) = spoofed {
                signals.push(signal(
                    Stage::Typosquat,
                    self.config.weights.typosquat,
                    format!("homoglyph domain: '{}' spells {}", domain.trim(), trusted),
                ));
                return;
            }
        }
        if let Some(hit) = typosquat::detect(&folded.text) {
            signals.push(signal(
                Stage::Typosquat,
                self.config.weights.typosquat,
                format!(
                    "typosquatting: '{}' impersonates {} (distance {})",
                    hit.root, hit.trusted, hit.distance
                ),
            ));
        }
    }

    fn score_context(&self, input: &ThreatInput, signals: &mut Vec<RiskSignal>) {
        let weights = &self.config.weights;
        let style = input
            .element
            .as_ref()
            .map(ElementStyle::parse)
            .unwrap_or_default();

        if input.hidden || style.hidden {
            signals.push(signal(Stage::Context, weights.hidden, "hidden element".into()));
        }
        if let Some(opacity) = style.opacity.filter(|o| *o < 0.1) {
            signals.push(signal(
                Stage::Context,
                weights.low_opacity,
                format!("near-zero opacity {opacity}"),
            ));
        }
        if let Some(z) = style.z_index.filter(|z| *z > 9000.0 || *z < -1000.0) {
            signals.push(signal(
                Stage::Context,
                weights.extreme_z_index,
                format!("extreme z-index {z}"),
            ));
        }
        if style.font_size.is_some_and(|size| size == 0.0) {
            signals.push(signal(Stage::Context, weights.zero_font, "zero font size".into()));
        }
    }

    /// Logistic squash of the summed weights; no signals scores zero.
    fn aggregate(&self, signals: &[RiskSignal]) -> u8 {
        if signals.is_empty() {
            return 0;
        }
        let sum: f64 = signals.iter().map(|s| s.weight).sum();
        let k = self.config.logistic_steepness;
        let mid = self.config.logistic_midpoint;
        let score = 100.0 / (1.0 + (-k * (sum - mid)).exp());
        if score.is_nan() {
            return 0;
        }
        score.floor().clamp(0.0, 100.0) as u8
    }
}

#[inline]
fn signal(stage: Stage, weight: f64, reason: String) -> RiskSignal {
    RiskSignal {
        stage,
        weight,
        reason,
    }
}
