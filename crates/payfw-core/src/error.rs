use thiserror::Error;

/// Errors raised by the gate orchestrator's pipeline.
///
/// Each variant's `Display` carries its stable identifier so callers that log or
/// alert on the string can match on the variant without re-parsing it.
#[derive(Debug, Error)]
pub enum GateError {
    #[error("POLICY_VIOLATION: rule '{policy}' (value={value}, limit={limit})")]
    PolicyViolation {
        policy: String,
        value: f64,
        limit: f64,
    },

    #[error("FIREWALL_BLOCKED: layer={layer} confidence={confidence:.2} ({reason})")]
    FirewallBlocked {
        layer: String,
        confidence: f64,
        reason: String,
    },

    #[error("NO_ADAPTER: no adapter registered for protocol '{protocol}'")]
    NoAdapter { protocol: String },

    #[error("PAYMENT_FAILED: protocol={protocol} ({message})")]
    PaymentFailed {
        protocol: String,
        transaction_id: Option<String>,
        message: String,
    },
}

impl GateError {
    pub fn firewall_blocked(layer: impl Into<String>, confidence: f64, reason: impl Into<String>) -> Self {
        Self::FirewallBlocked {
            layer: layer.into(),
            confidence,
            reason: reason.into(),
        }
    }

    pub fn policy_violation(policy: impl Into<String>, value: f64, limit: f64) -> Self {
        Self::PolicyViolation {
            policy: policy.into(),
            value,
            limit,
        }
    }
}
