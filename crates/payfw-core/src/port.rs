//! Adapter port (C7): the shape external payment backends implement, plus the
//! registry the gate uses to resolve one by protocol name.

use crate::error::GateError;
use crate::types::{PaymentIntent, PaymentResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// Pluggable payment backend. `name` is the routing key the gate matches against
/// `intent.protocol`; `can_handle` is informational only — the gate never calls it.
#[async_trait]
pub trait AdapterPort: Send + Sync {
    fn name(&self) -> &str;

    fn can_handle(&self, intent: &PaymentIntent) -> bool;

    async fn execute(&self, intent: &PaymentIntent) -> Result<PaymentResult, GateError>;
}

/// Registry of adapters keyed by lowercased name. Lookup is case-insensitive
/// exact match; there is no `can_handle`-based fallback. If two adapters
/// register under the same name, the earlier registration wins.
#[derive(Default, Clone)]
pub struct AdapterRegistry {
    adapters: HashMap<String, Arc<dyn AdapterPort>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self {
            adapters: HashMap::new(),
        }
    }

    pub fn register(&mut self, adapter: Arc<dyn AdapterPort>) {
        self.adapters
            .entry(adapter.name().to_ascii_lowercase())
            .or_insert(adapter);
    }

    pub fn resolve(&self, protocol: &str) -> Option<Arc<dyn AdapterPort>> {
        self.adapters.get(&protocol.to_ascii_lowercase()).cloned()
    }

    pub fn has(&self, protocol: &str) -> bool {
        self.adapters.contains_key(&protocol.to_ascii_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Protocol;
    use std::collections::BTreeMap;

    struct EchoAdapter;

    #[async_trait]
    impl AdapterPort for EchoAdapter {
        fn name(&self) -> &str {
            "x402"
        }

        fn can_handle(&self, _intent: &PaymentIntent) -> bool {
            true
        }

        async fn execute(&self, intent: &PaymentIntent) -> Result<PaymentResult, GateError> {
            Ok(PaymentResult::success(intent, Protocol::X402, "tx-1"))
        }
    }

    struct NamedAdapter {
        name: &'static str,
        transaction_id: &'static str,
    }

    #[async_trait]
    impl AdapterPort for NamedAdapter {
        fn name(&self) -> &str {
            self.name
        }

        fn can_handle(&self, _intent: &PaymentIntent) -> bool {
            true
        }

        async fn execute(&self, intent: &PaymentIntent) -> Result<PaymentResult, GateError> {
            Ok(PaymentResult::success(intent, Protocol::X402, self.transaction_id))
        }
    }

    fn intent() -> PaymentIntent {
        PaymentIntent {
            id: "pay_test".to_string(),
            recipient: "https://vendor.example".to_string(),
            amount: 10.0,
            currency: "USD".to_string(),
            purpose: "test".to_string(),
            protocol: None,
            escrow: None,
            metadata: BTreeMap::new(),
            created_at_ms: 0,
        }
    }

    #[test]
    fn resolve_is_case_insensitive() {
        let mut registry = AdapterRegistry::new();
        registry.register(Arc::new(EchoAdapter));
        assert!(registry.resolve("X402").is_some());
        assert!(registry.resolve("x402").is_some());
        assert!(registry.resolve("ap2").is_none());
    }

    #[tokio::test]
    async fn resolved_adapter_executes() {
        let mut registry = AdapterRegistry::new();
        registry.register(Arc::new(EchoAdapter));
        let adapter = registry.resolve("x402").unwrap();
        let result = adapter.execute(&intent()).await.unwrap();
        assert!(result.success);
    }

    #[tokio::test]
    async fn earlier_registration_wins_on_name_collision() {
        let mut registry = AdapterRegistry::new();
        registry.register(Arc::new(NamedAdapter {
            name: "x402",
            transaction_id: "first",
        }));
        registry.register(Arc::new(NamedAdapter {
            name: "x402",
            transaction_id: "second",
        }));

        let adapter = registry.resolve("x402").unwrap();
        let result = adapter.execute(&intent()).await.unwrap();
        assert_eq!(result.transaction_id.as_deref(), Some("first"));
    }
}
