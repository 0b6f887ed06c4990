//! Gate orchestrator (C6): the full `pay` pipeline — firewall, policy, human
//! approval, protocol detection, adapter execution, spend recording.

use crate::error::GateError;
use crate::firewall::TransactionFirewall;
use crate::id;
use crate::policy::PolicyEngine;
use crate::port::AdapterRegistry;
use crate::types::{IntentRequest, MetadataValue, PaymentIntent, PaymentResult, Protocol, VerdictLayer};
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Host-supplied human-in-the-loop gate. Consulted only when the policy engine's
/// `require_human_approval_above` threshold is crossed.
#[async_trait]
pub trait ApprovalCallback: Send + Sync {
    async fn approve(&self, intent: &PaymentIntent) -> bool;
}

/// Configuration for a [`Gate`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateConfig {
    /// Opaque wallet descriptor forwarded to adapters via `intent.metadata["wallet"]`.
    pub wallet: Option<String>,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self { wallet: None }
    }
}

/// Outcome of a dry-run `check` call: every field `pay` would have produced,
/// without ever touching the adapter or recording spend.
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub allowed: bool,
    pub layer: VerdictLayer,
    pub reason: String,
    pub requires_human_approval: bool,
}

/// Orchestrates the full transaction pipeline over a firewall, a policy engine,
/// and a registry of payment adapters.
pub struct Gate {
    config: GateConfig,
    firewall: Option<TransactionFirewall>,
    policy: PolicyEngine,
    adapters: AdapterRegistry,
    approval_callback: Option<Box<dyn ApprovalCallback>>,
}

impl Gate {
    pub fn new(
        config: GateConfig,
        firewall: Option<TransactionFirewall>,
        policy: PolicyEngine,
        adapters: AdapterRegistry,
    ) -> Self {
        Self {
            config,
            firewall,
            policy,
            adapters,
            approval_callback: None,
        }
    }

    pub fn with_approval_callback(mut self, callback: Box<dyn ApprovalCallback>) -> Self {
        self.approval_callback = Some(callback);
        self
    }

    fn build_intent(&self, request: IntentRequest) -> PaymentIntent {
        let mut intent = PaymentIntent::from_request(id::generate(), request, Utc::now().timestamp_millis());
        if let Some(wallet) = &self.config.wallet {
            intent
                .metadata
                .insert("wallet".to_string(), MetadataValue::String(wallet.clone()));
        }
        intent
    }

    /// The hot path: build the intent, run every gate, execute, and record spend
    /// only after a successful execution.
    pub async fn pay(&self, request: IntentRequest) -> Result<PaymentResult, GateError> {
        let mut intent = self.build_intent(request);

        if let Some(firewall) = &self.firewall {
            if firewall.is_enabled() {
                info!(intent_id = %intent.id, stage = "firewall", "evaluating firewall");
                let verdict = firewall.evaluate(&intent).await;
                if !verdict.allowed {
                    return Err(GateError::firewall_blocked(
                        verdict.layer.to_string(),
                        verdict.confidence.unwrap_or(0.0),
                        verdict.reason,
                    ));
                }
            }
        }

        info!(intent_id = %intent.id, stage = "policy", "evaluating policy");
        let policy_verdict = self.policy.evaluate(&intent);
        if !policy_verdict.allowed {
            let policy = policy_verdict.policy.unwrap_or_else(|| "unknown".to_string());
            warn!(intent_id = %intent.id, policy = %policy, reason = %policy_verdict.reason, "policy blocked intent");
            return Err(GateError::policy_violation(
                policy,
                policy_verdict.value.unwrap_or(0.0),
                policy_verdict.limit.unwrap_or(0.0),
            ));
        }

        if self.policy.requires_human_approval(&intent) {
            info!(intent_id = %intent.id, stage = "human-approval", "awaiting human approval");
            let callback = self.approval_callback.as_ref().ok_or_else(|| {
                GateError::firewall_blocked(
                    VerdictLayer::Human.to_string(),
                    0.0,
                    "amount requires human approval but no approval callback is configured",
                )
            })?;
            if !callback.approve(&intent).await {
                warn!(intent_id = %intent.id, "human approver rejected intent");
                return Err(GateError::firewall_blocked(
                    VerdictLayer::Human.to_string(),
                    0.0,
                    "rejected by human approver",
                ));
            }
        }

        info!(intent_id = %intent.id, stage = "protocol-detect", "resolving protocol");
        let protocol = match intent.protocol {
            Some(protocol) => protocol,
            None => {
                let detected = detect_protocol(&intent);
                intent.protocol = Some(detected);
                detected
            }
        };

        let adapter = self
            .adapters
            .resolve(protocol.as_str())
            .ok_or_else(|| GateError::NoAdapter {
                protocol: protocol.as_str().to_string(),
            })?;

        info!(intent_id = %intent.id, stage = "route", protocol = %protocol, "invoking adapter");
        let result = adapter.execute(&intent).await.map_err(|err| match err {
            GateError::PaymentFailed { .. } => err,
            other => GateError::PaymentFailed {
                protocol: protocol.as_str().to_string(),
                transaction_id: None,
                message: other.to_string(),
            },
        })?;

        if !result.success {
            warn!(intent_id = %intent.id, "adapter returned a soft failure");
        }

        if result.success {
            info!(intent_id = %intent.id, stage = "record", "recording spend");
            self.policy.record_transaction(&intent);
        }

        Ok(result)
    }

    /// Dry-run: runs firewall + policy + the approval/adapter checks without ever
    /// invoking the adapter or mutating spend state.
    pub async fn check(&self, request: IntentRequest) -> CheckResult {
        let mut intent = self.build_intent(request);

        if let Some(firewall) = &self.firewall {
            if firewall.is_enabled() {
                let verdict = firewall.evaluate(&intent).await;
                if !verdict.allowed {
                    return CheckResult {
                        allowed: false,
                        layer: verdict.layer,
                        reason: verdict.reason,
                        requires_human_approval: false,
                    };
                }
            }
        }

        let policy_verdict = self.policy.evaluate(&intent);
        if !policy_verdict.allowed {
            return CheckResult {
                allowed: false,
                layer: VerdictLayer::Policy,
                reason: policy_verdict.reason,
                requires_human_approval: false,
            };
        }

        if self.policy.requires_human_approval(&intent) {
            return CheckResult {
                allowed: true,
                layer: VerdictLayer::Human,
                reason: "amount requires human approval".to_string(),
                requires_human_approval: true,
            };
        }

        let protocol = intent.protocol.unwrap_or_else(|| detect_protocol(&intent));
        intent.protocol = Some(protocol);

        if !self.adapters.has(protocol.as_str()) {
            return CheckResult {
                allowed: false,
                layer: VerdictLayer::Policy,
                reason: format!("no adapter registered for protocol '{protocol}'"),
                requires_human_approval: false,
            };
        }

        CheckResult {
            allowed: true,
            layer: VerdictLayer::Classifier,
            reason: "dry run passed".to_string(),
            requires_human_approval: false,
        }
    }
}

/// First-match-wins protocol inference from recipient shape, used only when the
/// caller didn't stamp `intent.protocol` explicitly.
fn detect_protocol(intent: &PaymentIntent) -> Protocol {
    if intent.escrow.is_some() {
        return Protocol::Escrow;
    }

    let recipient = intent.recipient.trim();
    if recipient.starts_with("http://") || recipient.starts_with("https://") {
        return Protocol::X402;
    }

    let lower = recipient.to_ascii_lowercase();
    if lower.starts_with("merchant:")
        || lower.starts_with("shop:")
        || lower.starts_with("store:")
        || lower.ends_with(".merchant")
        || lower.ends_with(".shop")
    {
        return Protocol::Acp;
    }

    if recipient.starts_with("agent://") || recipient.starts_with("did:") {
        return Protocol::Ap2;
    }

    Protocol::X402
}
