//! Deterministic transaction firewall and policy engine for agent-initiated
//! payments: structured-intent extraction, prompt-injection pattern matching,
//! origin-drift comparison, spend/limit policy, and a pluggable adapter port.

#![deny(unsafe_code)]

pub mod classifier;
pub mod drift;
pub mod error;
pub mod extractor;
pub mod firewall;
pub mod gate;
pub mod glob;
pub mod id;
pub mod policy;
pub mod port;
pub mod types;

pub use classifier::{
    ClassificationResult, ClassifierError, ClassifierRule, InjectionClassifier, PatternClassifier, Severity,
};
pub use drift::DriftComparator;
pub use error::GateError;
pub use firewall::{FirewallConfig, OnBlockCallback, TransactionFirewall};
pub use gate::{ApprovalCallback, CheckResult, Gate, GateConfig};
pub use glob::CompiledGlob;
pub use policy::PolicyEngine;
pub use port::{AdapterPort, AdapterRegistry};
pub use types::{
    DriftIndicator, DriftSeverity, EscrowConfig, EscrowMilestone, FirewallVerdict, IntentDiffResult,
    IntentRequest, MetadataValue, PaymentIntent, PaymentResult, PolicyConfig, PolicyVerdict, Protocol,
    StructuredIntent, VerdictLayer,
};
