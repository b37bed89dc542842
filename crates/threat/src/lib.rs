//! Hive Threat - Layered risk scoring
//!
//! Turns untrusted text, DOM hints and domains into an explained verdict:
//! sanitize, decode, skeletonize, fingerprint, measure, then squash the
//! accumulated weights through a logistic curve.

pub mod context;
pub mod decode;
pub mod engine;
pub mod measures;
pub mod sanitize;
pub mod skeleton;
pub mod typosquat;
pub mod vectors;
pub mod verdict;

pub use engine::ThreatScoringEngine;
pub use typosquat::levenshtein;
pub use verdict::{RiskSignal, SignalWeights, Stage, ThreatConfig, ThreatInput, ThreatVerdict, Verdict};
