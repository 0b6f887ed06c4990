//! Deterministic mock payment adapters for payfw-core's closed protocol set.
//!
//! These are test/demo fixtures, not production backend integrations: each
//! always succeeds (or, for the chaos-testing variant, always fails with a
//! configured reason) without touching any external rail.

#![deny(unsafe_code)]

use async_trait::async_trait;
use payfw_core::{AdapterPort, GateError, PaymentIntent, PaymentResult, Protocol};

fn mock_transaction_id(prefix: &str, _intent: &PaymentIntent) -> String {
    format!("{prefix}-{}", uuid::Uuid::new_v4().simple())
}

/// Mock x402 (HTTP 402 micropayment) adapter.
#[derive(Debug, Clone, Default)]
pub struct MockX402Adapter;

#[async_trait]
impl AdapterPort for MockX402Adapter {
    fn name(&self) -> &str {
        "x402"
    }

    fn can_handle(&self, intent: &PaymentIntent) -> bool {
        intent.recipient.starts_with("http://") || intent.recipient.starts_with("https://")
    }

    async fn execute(&self, intent: &PaymentIntent) -> Result<PaymentResult, GateError> {
        Ok(PaymentResult::success(
            intent,
            Protocol::X402,
            mock_transaction_id("x402", intent),
        ))
    }
}

/// Mock AP2 (agent-to-agent) adapter.
#[derive(Debug, Clone, Default)]
pub struct MockAp2Adapter;

#[async_trait]
impl AdapterPort for MockAp2Adapter {
    fn name(&self) -> &str {
        "ap2"
    }

    fn can_handle(&self, intent: &PaymentIntent) -> bool {
        intent.recipient.starts_with("agent://") || intent.recipient.starts_with("did:")
    }

    async fn execute(&self, intent: &PaymentIntent) -> Result<PaymentResult, GateError> {
        Ok(PaymentResult::success(
            intent,
            Protocol::Ap2,
            mock_transaction_id("ap2", intent),
        ))
    }
}

/// Mock ACP (agentic commerce protocol) adapter.
#[derive(Debug, Clone, Default)]
pub struct MockAcpAdapter;

#[async_trait]
impl AdapterPort for MockAcpAdapter {
    fn name(&self) -> &str {
        "acp"
    }

    fn can_handle(&self, intent: &PaymentIntent) -> bool {
        let lower = intent.recipient.to_ascii_lowercase();
        lower.starts_with("merchant:")
            || lower.starts_with("shop:")
            || lower.starts_with("store:")
            || lower.ends_with(".merchant")
            || lower.ends_with(".shop")
    }

    async fn execute(&self, intent: &PaymentIntent) -> Result<PaymentResult, GateError> {
        Ok(PaymentResult::success(
            intent,
            Protocol::Acp,
            mock_transaction_id("acp", intent),
        ))
    }
}

/// Mock escrow adapter. Stamps `escrow_id` alongside the usual transaction id.
#[derive(Debug, Clone, Default)]
pub struct MockEscrowAdapter;

#[async_trait]
impl AdapterPort for MockEscrowAdapter {
    fn name(&self) -> &str {
        "escrow"
    }

    fn can_handle(&self, intent: &PaymentIntent) -> bool {
        intent.escrow.is_some()
    }

    async fn execute(&self, intent: &PaymentIntent) -> Result<PaymentResult, GateError> {
        let mut result = PaymentResult::success(
            intent,
            Protocol::Escrow,
            mock_transaction_id("escrow", intent),
        );
        result.escrow_id = Some(format!("escrow-{}", uuid::Uuid::new_v4().simple()));
        Ok(result)
    }
}

/// Deterministic failing adapter useful for chaos testing a gate's error paths.
#[derive(Debug, Clone)]
pub struct AlwaysFailAdapter {
    protocol_name: &'static str,
    reason: String,
}

impl AlwaysFailAdapter {
    pub fn new(protocol_name: &'static str, reason: impl Into<String>) -> Self {
        Self {
            protocol_name,
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl AdapterPort for AlwaysFailAdapter {
    fn name(&self) -> &str {
        self.protocol_name
    }

    fn can_handle(&self, _intent: &PaymentIntent) -> bool {
        true
    }

    async fn execute(&self, _intent: &PaymentIntent) -> Result<PaymentResult, GateError> {
        Err(GateError::PaymentFailed {
            protocol: self.protocol_name.to_string(),
            transaction_id: None,
            message: self.reason.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use payfw_core::{EscrowConfig, IntentRequest, MetadataValue};
    use std::collections::BTreeMap;

    fn intent(recipient: &str, escrow: Option<EscrowConfig>) -> PaymentIntent {
        let request = IntentRequest {
            recipient: recipient.to_string(),
            amount: 10.0,
            currency: "USDC".to_string(),
            purpose: "test".to_string(),
            protocol: None,
            escrow,
            metadata: BTreeMap::<String, MetadataValue>::new(),
        };
        PaymentIntent::from_request("pay_test", request, 0)
    }

    #[tokio::test]
    async fn x402_adapter_succeeds_for_http_recipient() {
        let adapter = MockX402Adapter;
        let i = intent("https://vendor.example", None);
        assert!(adapter.can_handle(&i));
        let result = adapter.execute(&i).await.unwrap();
        assert!(result.success);
        assert_eq!(result.protocol, "x402");
    }

    #[tokio::test]
    async fn ap2_adapter_succeeds_for_agent_uri() {
        let adapter = MockAp2Adapter;
        let i = intent("agent://vendor", None);
        assert!(adapter.can_handle(&i));
        let result = adapter.execute(&i).await.unwrap();
        assert_eq!(result.protocol, "ap2");
    }

    #[tokio::test]
    async fn acp_adapter_succeeds_for_merchant_prefix() {
        let adapter = MockAcpAdapter;
        let i = intent("merchant:acme", None);
        assert!(adapter.can_handle(&i));
        let result = adapter.execute(&i).await.unwrap();
        assert_eq!(result.protocol, "acp");
    }

    #[tokio::test]
    async fn escrow_adapter_stamps_escrow_id() {
        let adapter = MockEscrowAdapter;
        let escrow = EscrowConfig {
            deadline: "72h".to_string(),
            evaluator: None,
            milestones: Vec::new(),
        };
        let i = intent("agent://vendor", Some(escrow));
        let result = adapter.execute(&i).await.unwrap();
        assert!(result.escrow_id.is_some());
    }

    #[tokio::test]
    async fn always_fail_adapter_returns_payment_failed() {
        let adapter = AlwaysFailAdapter::new("x402", "simulated outage");
        let err = adapter.execute(&intent("https://vendor.example", None)).await.unwrap_err();
        assert!(matches!(err, GateError::PaymentFailed { .. }));
    }
}
