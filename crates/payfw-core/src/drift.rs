//! Intent-drift comparator (C3): measures similarity between the current intent
//! and the user's original stated instruction.

use crate::extractor;
use crate::types::{DriftIndicator, DriftSeverity, IntentDiffResult, PaymentIntent, StructuredIntent};
use std::collections::HashSet;

const STOP_WORDS: &[&str] = &[
    "a", "an", "the", "to", "for", "of", "in", "on", "at", "is", "it", "and", "or", "but", "with",
    "from", "by", "as", "this", "that", "pay", "send", "transfer", "please", "i", "my", "me",
    "want",
];

/// Compares every new intent against a single original instruction, memoizing
/// the instruction's extraction so repeated `check` calls don't re-run C1.
pub struct DriftComparator {
    original: StructuredIntent,
}

impl DriftComparator {
    pub fn new(original_instruction: &str) -> Self {
        Self {
            original: extractor::extract(original_instruction),
        }
    }

    pub fn set_original_instruction(&mut self, original_instruction: &str) {
        self.original = extractor::extract(original_instruction);
    }

    pub fn original(&self) -> &StructuredIntent {
        &self.original
    }

    pub fn check(&self, intent: &PaymentIntent) -> IntentDiffResult {
        let mut scores = Vec::new();
        let mut indicators = Vec::new();

        if let Some(original_amount) = self.original.amount {
            let score = amount_similarity(original_amount, intent.amount);
            scores.push(score);
            if score < 0.8 {
                indicators.push(DriftIndicator {
                    field: "amount".to_string(),
                    original_value: original_amount.to_string(),
                    current_value: intent.amount.to_string(),
                    severity: severity_for(score, 0.3),
                });
            }
        }

        if let Some(original_recipient) = &self.original.recipient {
            let score = recipient_similarity(original_recipient, &intent.recipient);
            scores.push(score);
            if score < 0.8 {
                indicators.push(DriftIndicator {
                    field: "recipient".to_string(),
                    original_value: original_recipient.clone(),
                    current_value: intent.recipient.clone(),
                    severity: severity_for(score, 0.3),
                });
            }
        }

        if let Some(original_currency) = &self.original.currency {
            let score = currency_similarity(original_currency, &intent.currency);
            scores.push(score);
            if score < 0.8 {
                // Currency drift is always medium severity, regardless of score.
                indicators.push(DriftIndicator {
                    field: "currency".to_string(),
                    original_value: original_currency.clone(),
                    current_value: intent.currency.clone(),
                    severity: DriftSeverity::Medium,
                });
            }
        }

        if let Some(original_purpose) = &self.original.purpose {
            let current_purpose = intent.purpose.as_str();
            let score = purpose_similarity(original_purpose, current_purpose);
            scores.push(score);
            if score < 0.5 {
                indicators.push(DriftIndicator {
                    field: "purpose".to_string(),
                    original_value: original_purpose.clone(),
                    current_value: current_purpose.to_string(),
                    severity: severity_for(score, 0.2),
                });
            }
        }

        let similarity = if scores.is_empty() {
            1.0
        } else {
            round3(scores.iter().sum::<f64>() / scores.len() as f64)
        };

        IntentDiffResult {
            similarity,
            indicators,
        }
    }
}

fn severity_for(score: f64, high_threshold: f64) -> DriftSeverity {
    if score < high_threshold {
        DriftSeverity::High
    } else {
        DriftSeverity::Medium
    }
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

fn amount_similarity(original: f64, current: f64) -> f64 {
    if original == 0.0 && current == 0.0 {
        return 1.0;
    }
    if original == 0.0 || current == 0.0 {
        return 0.0;
    }
    let (min, max) = if original < current {
        (original, current)
    } else {
        (current, original)
    };
    let ratio = min / max;
    if ratio >= 0.99 {
        1.0
    } else if ratio >= 0.9 {
        0.8
    } else if ratio >= 0.5 {
        0.5
    } else {
        ratio
    }
}

fn extract_host(value: &str) -> Option<&str> {
    for prefix in ["https://", "http://", "agent://"] {
        if let Some(rest) = value.strip_prefix(prefix) {
            return Some(rest.split(['/', '?', '#']).next().unwrap_or(rest));
        }
    }
    None
}

fn recipient_similarity(original: &str, current: &str) -> f64 {
    let a = original.trim().to_ascii_lowercase();
    let b = current.trim().to_ascii_lowercase();

    if a == b {
        return 1.0;
    }
    if a.contains(&b) || b.contains(&a) {
        return 0.7;
    }
    match (extract_host(&a), extract_host(&b)) {
        (Some(host_a), Some(host_b)) if host_a == host_b => 0.6,
        _ => 0.0,
    }
}

fn currency_similarity(original: &str, current: &str) -> f64 {
    if original.eq_ignore_ascii_case(current) {
        1.0
    } else {
        0.0
    }
}

fn tokenize(text: &str) -> HashSet<String> {
    text.split_whitespace()
        .map(|word| {
            word.chars()
                .filter(|c| c.is_alphanumeric())
                .collect::<String>()
                .to_ascii_lowercase()
        })
        .filter(|word| word.len() > 1 && !STOP_WORDS.contains(&word.as_str()))
        .collect()
}

fn purpose_similarity(original: &str, current: &str) -> f64 {
    let a = tokenize(original);
    let b = tokenize(current);

    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let intersection = a.intersection(&b).count();
    let union = a.union(&b).count();
    intersection as f64 / union as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn intent(amount: f64, currency: &str, recipient: &str, purpose: &str) -> PaymentIntent {
        PaymentIntent {
            id: "pay_test".to_string(),
            recipient: recipient.to_string(),
            amount,
            currency: currency.to_string(),
            purpose: purpose.to_string(),
            protocol: None,
            escrow: None,
            metadata: BTreeMap::new(),
            created_at_ms: 0,
        }
    }

    #[test]
    fn identical_intent_has_perfect_similarity_and_no_drift() {
        let comparator = DriftComparator::new("Pay 50 USDC to agent://api-provider for API usage");
        let result = comparator.check(&intent(
            50.0,
            "USDC",
            "agent://api-provider",
            "API usage",
        ));
        assert_eq!(result.similarity, 1.0);
        assert!(result.indicators.is_empty());
    }

    #[test]
    fn amount_doubling_drifts() {
        let comparator = DriftComparator::new("Pay 50 USDC to agent://api-provider for API usage");
        let result = comparator.check(&intent(
            100.0,
            "USDC",
            "agent://api-provider",
            "API usage",
        ));
        assert!(result.similarity < 1.0);
        assert!(result.indicators.iter().any(|i| i.field == "amount"));
    }

    #[test]
    fn different_recipient_host_drifts_to_zero() {
        let comparator = DriftComparator::new("Pay 50 USDC to agent://api-provider for API usage");
        let result = comparator.check(&intent(
            50.0,
            "USDC",
            "agent://attacker",
            "API usage",
        ));
        assert!(result.indicators.iter().any(|i| i.field == "recipient"));
    }

    #[test]
    fn currency_drift_is_always_medium() {
        let comparator = DriftComparator::new("Pay 50 USDC to agent://api-provider for API usage");
        let result = comparator.check(&intent(
            50.0,
            "ETH",
            "agent://api-provider",
            "API usage",
        ));
        let currency_indicator = result
            .indicators
            .iter()
            .find(|i| i.field == "currency")
            .expect("currency drift expected");
        assert_eq!(currency_indicator.severity, DriftSeverity::Medium);
    }

    #[test]
    fn fields_absent_from_original_are_not_scored() {
        let comparator = DriftComparator::new("send some funds please");
        let result = comparator.check(&intent(9999.0, "BTC", "agent://anyone", "anything"));
        assert_eq!(result.similarity, 1.0);
    }
}
