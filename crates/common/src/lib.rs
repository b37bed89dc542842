//! Hive Common - Shared types and traits
//!
//! This crate provides the data model, collaborator traits and configuration
//! used across the Hive swarm core.
//!
//! Key features:
//! - Closed enums for event types, worker identities and technique modules
//! - Typed packets that serialize into event payloads at the fabric boundary
//! - Collaborator seams (arsenal modules, archive, reporter, pre-flight gate)
//! - TOML-loadable mission configuration with presets

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

// Re-export commonly used types
pub use config::{AdmissionConfig, MissionConfig};
pub use error::{HiveError, HiveResult};
pub use traits::{
    Archive, ArchiveRecord, ArsenalModule, MissionReporter, NullArchive, OpenGate,
    PreflightDecision, PreflightGate,
};
pub use types::{
    ArsenalKind, Candidate, CandidateTag, ControlSignal, Event, EventType, Finding, JobPacket,
    JobTally, MissionReport, ModuleConfig, NextStep, Payload, Priority, ResultPacket,
    ResultStatus, Severity, SignalKind, StatusReport, TaskTarget, Vulnerability, WorkerId,
    WorkerState,
};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
