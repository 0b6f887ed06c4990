//! Transaction firewall (C4): composes the pattern classifier, the structured
//! mismatch check, and the origin-drift comparator into one verdict per intent.

use crate::classifier::{InjectionClassifier, PatternClassifier};
use crate::drift::DriftComparator;
use crate::extractor;
use crate::types::{FirewallVerdict, PaymentIntent, VerdictLayer};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

/// Configuration for the transaction firewall.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FirewallConfig {
    pub enabled: bool,
    pub injection_threshold: f64,
    pub intent_diff_threshold: f64,
    pub enable_pattern_detection: bool,
    pub original_instruction: Option<String>,
    /// Fail-open on a classifier error: the request is allowed, relying on the
    /// policy engine as the hard floor.
    pub fail_open: bool,
}

impl Default for FirewallConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            injection_threshold: 0.7,
            intent_diff_threshold: 0.6,
            enable_pattern_detection: true,
            original_instruction: None,
            fail_open: true,
        }
    }
}

/// Callback invoked as a side effect whenever `evaluate` returns a blocked verdict.
pub type OnBlockCallback = Box<dyn Fn(&FirewallVerdict) + Send + Sync>;

pub struct TransactionFirewall {
    classifier: Arc<dyn InjectionClassifier>,
    enabled: bool,
    injection_threshold: f64,
    intent_diff_threshold: f64,
    fail_open: bool,
    drift: Mutex<Option<DriftComparator>>,
    on_block: Option<OnBlockCallback>,
}

impl TransactionFirewall {
    pub fn new(config: FirewallConfig) -> Self {
        let enable_pattern_detection = config.enable_pattern_detection;
        Self::with_classifier(config, default_classifier(enable_pattern_detection))
    }

    pub fn with_classifier(config: FirewallConfig, classifier: Arc<dyn InjectionClassifier>) -> Self {
        let drift = config
            .original_instruction
            .as_deref()
            .map(DriftComparator::new);

        Self {
            classifier,
            enabled: config.enabled,
            injection_threshold: config.injection_threshold,
            intent_diff_threshold: config.intent_diff_threshold,
            fail_open: config.fail_open,
            drift: Mutex::new(drift),
            on_block: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn with_on_block(mut self, callback: OnBlockCallback) -> Self {
        self.on_block = Some(callback);
        self
    }

    pub fn set_original_instruction(&self, original_instruction: &str) {
        let mut guard = self.drift.lock().expect("drift comparator lock poisoned");
        *guard = Some(DriftComparator::new(original_instruction));
    }

    pub async fn evaluate(&self, intent: &PaymentIntent) -> FirewallVerdict {
        let verdict = self.evaluate_inner(intent).await;
        if !verdict.allowed {
            warn!(
                layer = %verdict.layer,
                reason = %verdict.reason,
                intent_id = %intent.id,
                "firewall blocked intent"
            );
            if let Some(callback) = &self.on_block {
                callback(&verdict);
            }
        } else {
            info!(intent_id = %intent.id, "firewall passed intent");
        }
        verdict
    }

    async fn evaluate_inner(&self, intent: &PaymentIntent) -> FirewallVerdict {
        // Layer 1: injection scan over purpose + recipient + metadata values.
        let scan_text = build_scan_text(intent);
        let classification = match self.classifier.classify(&scan_text).await {
            Ok(result) => result,
            Err(err) => {
                if self.fail_open {
                    warn!(
                        intent_id = %intent.id,
                        error = %err,
                        "classifier errored, failing open per configuration"
                    );
                    return FirewallVerdict::allow(
                        format!("classifier unavailable, failed open: {err}"),
                        0.0,
                    );
                }
                return FirewallVerdict::block(
                    VerdictLayer::Classifier,
                    format!("classifier unavailable, failing closed: {err}"),
                    1.0,
                );
            }
        };

        if classification.injection_probability >= self.injection_threshold {
            return FirewallVerdict::block(
                VerdictLayer::Classifier,
                format!(
                    "injection probability {:.2} at/above threshold {:.2}: {}",
                    classification.injection_probability,
                    self.injection_threshold,
                    classification.details.join("; ")
                ),
                classification.injection_probability,
            );
        }

        // Layer 2: structured mismatch between the free-text purpose and the
        // intent's own structured fields.
        let extracted = extractor::extract(&intent.purpose);
        let mut mismatches = Vec::new();

        if let Some(extracted_amount) = extracted.amount {
            if (extracted_amount - intent.amount).abs() > 0.01 {
                mismatches.push(format!(
                    "amount mismatch: purpose says {extracted_amount}, intent says {}",
                    intent.amount
                ));
            }
        }
        if let Some(extracted_recipient) = &extracted.recipient {
            if !extracted_recipient.eq_ignore_ascii_case(&intent.recipient) {
                mismatches.push(format!(
                    "recipient mismatch: purpose says {extracted_recipient}, intent says {}",
                    intent.recipient
                ));
            }
        }
        if let Some(extracted_currency) = &extracted.currency {
            if !extracted_currency.eq_ignore_ascii_case(&intent.currency) {
                mismatches.push(format!(
                    "currency mismatch: purpose says {extracted_currency}, intent says {}",
                    intent.currency
                ));
            }
        }

        if !mismatches.is_empty() {
            return FirewallVerdict::block(VerdictLayer::IntentDiff, mismatches.join("; "), 0.8);
        }

        // Layer 3: origin drift, only if an original instruction was configured.
        let drift_result = {
            let guard = self.drift.lock().expect("drift comparator lock poisoned");
            guard.as_ref().map(|comparator| comparator.check(intent))
        };

        if let Some(diff) = drift_result {
            if diff.similarity < self.intent_diff_threshold {
                return FirewallVerdict::block(
                    VerdictLayer::IntentDiff,
                    format!(
                        "similarity {:.3} below threshold {:.2}",
                        diff.similarity, self.intent_diff_threshold
                    ),
                    1.0 - diff.similarity,
                );
            }
        }

        FirewallVerdict::allow(
            "no injection, mismatch, or drift detected",
            1.0 - classification.injection_probability,
        )
    }
}

fn build_scan_text(intent: &PaymentIntent) -> String {
    let mut parts = vec![intent.purpose.clone(), intent.recipient.clone()];
    parts.extend(intent.metadata.values().map(|v| v.as_scan_text()));
    parts.join(" ")
}

// So `TransactionFirewall::new` can build a default `PatternClassifier` that
// respects `enable_pattern_detection` without forcing every caller through
// `with_classifier`.
fn default_classifier(enable_pattern_detection: bool) -> Arc<dyn InjectionClassifier> {
    if enable_pattern_detection {
        Arc::new(PatternClassifier::new())
    } else {
        Arc::new(PatternClassifier::disabled())
    }
}
