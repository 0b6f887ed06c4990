use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Arbitrary scalar/string metadata value attached to an intent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    String(String),
    Number(f64),
    Bool(bool),
}

impl MetadataValue {
    /// Coerce to a string the way the injection scan's text concatenation requires.
    pub fn as_scan_text(&self) -> String {
        match self {
            MetadataValue::String(s) => s.clone(),
            MetadataValue::Number(n) => n.to_string(),
            MetadataValue::Bool(b) => b.to_string(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetadataValue::String(s) => Some(s),
            _ => None,
        }
    }
}

/// Closed set of payment rails the gate can route to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    X402,
    Ap2,
    Acp,
    Escrow,
}

impl Protocol {
    pub fn as_str(self) -> &'static str {
        match self {
            Protocol::X402 => "x402",
            Protocol::Ap2 => "ap2",
            Protocol::Acp => "acp",
            Protocol::Escrow => "escrow",
        }
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A milestone within an escrow schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscrowMilestone {
    pub description: String,
    pub amount: f64,
    pub deadline: String,
}

/// Escrow configuration carried by an intent that settles through an escrow contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscrowConfig {
    /// Duration string (e.g. "72h") or ISO-8601 timestamp.
    pub deadline: String,
    /// Address or the literal token "auto".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evaluator: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub milestones: Vec<EscrowMilestone>,
}

/// Caller-supplied request to pay, before identity/timestamp are stamped on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentRequest {
    pub recipient: String,
    pub amount: f64,
    pub currency: String,
    pub purpose: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<Protocol>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub escrow: Option<EscrowConfig>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, MetadataValue>,
}

/// A uniquely-identified request to pay, stamped with identity and time.
///
/// Once created, only the gate may mutate it, and only to fill a detected `protocol`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    pub recipient: String,
    pub amount: f64,
    pub currency: String,
    pub purpose: String,
    pub protocol: Option<Protocol>,
    pub escrow: Option<EscrowConfig>,
    pub metadata: BTreeMap<String, MetadataValue>,
    pub created_at_ms: i64,
}

impl PaymentIntent {
    pub fn from_request(id: impl Into<String>, request: IntentRequest, created_at_ms: i64) -> Self {
        Self {
            id: id.into(),
            recipient: request.recipient,
            amount: request.amount,
            currency: request.currency,
            purpose: request.purpose,
            protocol: request.protocol,
            escrow: request.escrow,
            metadata: request.metadata,
            created_at_ms,
        }
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.created_at_ms).unwrap_or_else(Utc::now)
    }
}

/// Bounds and allow/block lists the policy engine enforces. Every field is optional;
/// an absent field disables that check.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_per_transaction: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_daily: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_monthly: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub require_escrow_above: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub require_human_approval_above: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cooldown_ms: Option<i64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_recipients: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub blocked_recipients: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_categories: Option<Vec<String>>,
}

/// Fields the intent extractor pulls out of free text. Every field is nullable;
/// only fields the text actually mentions are populated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructuredIntent {
    pub amount: Option<f64>,
    pub currency: Option<String>,
    pub recipient: Option<String>,
    pub deadline: Option<String>,
    pub purpose: Option<String>,
    pub raw_text: String,
}

/// Pipeline layer that produced a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VerdictLayer {
    Classifier,
    Policy,
    IntentDiff,
    Human,
}

impl std::fmt::Display for VerdictLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            VerdictLayer::Classifier => "classifier",
            VerdictLayer::Policy => "policy",
            VerdictLayer::IntentDiff => "intent-diff",
            VerdictLayer::Human => "human",
        };
        f.write_str(s)
    }
}

/// Verdict emitted by the transaction firewall (C4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FirewallVerdict {
    pub allowed: bool,
    pub layer: VerdictLayer,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub detail: BTreeMap<String, String>,
}

impl FirewallVerdict {
    pub fn allow(reason: impl Into<String>, confidence: f64) -> Self {
        Self {
            allowed: true,
            layer: VerdictLayer::Classifier,
            reason: reason.into(),
            confidence: Some(confidence),
            detail: BTreeMap::new(),
        }
    }

    pub fn block(layer: VerdictLayer, reason: impl Into<String>, confidence: f64) -> Self {
        Self {
            allowed: false,
            layer,
            reason: reason.into(),
            confidence: Some(confidence),
            detail: BTreeMap::new(),
        }
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.detail.insert(key.into(), value.into());
        self
    }
}

/// Verdict emitted by the deterministic policy engine (C5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyVerdict {
    pub allowed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<f64>,
    pub reason: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub detail: BTreeMap<String, String>,
}

impl PolicyVerdict {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            policy: None,
            value: None,
            limit: None,
            reason: "no policy rule violated".to_string(),
            detail: BTreeMap::new(),
        }
    }

    pub fn block(rule: &str, reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            policy: Some(rule.to_string()),
            value: None,
            limit: None,
            reason: reason.into(),
            detail: BTreeMap::new(),
        }
    }

    pub fn with_value_limit(mut self, value: f64, limit: f64) -> Self {
        self.value = Some(value);
        self.limit = Some(limit);
        self
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.detail.insert(key.into(), value.into());
        self
    }
}

/// Drift severity for a single field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriftSeverity {
    Low,
    Medium,
    High,
}

/// A single field whose value diverged between the original instruction and the
/// current intent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriftIndicator {
    pub field: String,
    pub original_value: String,
    pub current_value: String,
    pub severity: DriftSeverity,
}

/// Aggregate result of comparing a current intent against the original instruction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentDiffResult {
    pub similarity: f64,
    pub indicators: Vec<DriftIndicator>,
}

/// Result returned by an adapter's `execute`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    pub protocol: String,
    pub amount: f64,
    pub currency: String,
    pub recipient: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub escrow_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PaymentResult {
    pub fn success(intent: &PaymentIntent, protocol: Protocol, transaction_id: impl Into<String>) -> Self {
        Self {
            success: true,
            transaction_id: Some(transaction_id.into()),
            protocol: protocol.as_str().to_string(),
            amount: intent.amount,
            currency: intent.currency.clone(),
            recipient: intent.recipient.clone(),
            timestamp: Utc::now(),
            escrow_id: None,
            error: None,
        }
    }

    pub fn failure(intent: &PaymentIntent, protocol: Protocol, error: impl Into<String>) -> Self {
        Self {
            success: false,
            transaction_id: None,
            protocol: protocol.as_str().to_string(),
            amount: intent.amount,
            currency: intent.currency.clone(),
            recipient: intent.recipient.clone(),
            timestamp: Utc::now(),
            escrow_id: None,
            error: Some(error.into()),
        }
    }
}
