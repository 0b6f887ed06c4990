//! Deterministic policy engine (C5): fixed-order rule evaluation plus rolling
//! spend/cooldown state, free of probabilistic side effects.

use crate::glob::{self, CompiledGlob};
use crate::types::{PaymentIntent, PolicyConfig, PolicyVerdict};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Mutex;

struct CompiledLists {
    blocked_recipients: Vec<CompiledGlob>,
    allowed_recipients: Vec<CompiledGlob>,
}

fn compile_lists(config: &PolicyConfig) -> CompiledLists {
    CompiledLists {
        blocked_recipients: config
            .blocked_recipients
            .iter()
            .map(|p| CompiledGlob::compile(p))
            .collect(),
        allowed_recipients: config
            .allowed_recipients
            .iter()
            .map(|p| CompiledGlob::compile(p))
            .collect(),
    }
}

/// Rolling spend/cooldown state, mutated only by `record_transaction` and `reset`.
#[derive(Default)]
struct SpendState {
    daily: BTreeMap<String, f64>,
    monthly: BTreeMap<String, f64>,
    last_transaction_ms: Option<i64>,
}

/// Deterministic risk/limits policy engine.
///
/// Evaluation is rule-based and side-effect-free; the same input always yields
/// the same verdict. Spend accounting is the only mutable state, and is not
/// internally serialized — see the crate's concurrency notes for why that is a
/// deliberate, documented tradeoff rather than an oversight.
pub struct PolicyEngine {
    config: PolicyConfig,
    lists: CompiledLists,
    state: Mutex<SpendState>,
}

impl PolicyEngine {
    pub fn new(config: PolicyConfig) -> Self {
        let lists = compile_lists(&config);
        Self {
            config,
            lists,
            state: Mutex::new(SpendState::default()),
        }
    }

    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }

    pub fn evaluate(&self, intent: &PaymentIntent) -> PolicyVerdict {
        if let Some(max) = self.config.max_per_transaction {
            if intent.amount > max {
                return PolicyVerdict::block(
                    "maxPerTransaction",
                    format!("amount {} exceeds per-transaction cap {}", intent.amount, max),
                )
                .with_value_limit(intent.amount, max);
            }
        }

        let day_key = day_key(intent.created_at());
        let month_key = month_key(intent.created_at());

        let state = self.state.lock().expect("policy state lock poisoned");

        if let Some(max) = self.config.max_daily {
            let current = state.daily.get(&day_key).copied().unwrap_or(0.0);
            let projected = current + intent.amount;
            if projected > max {
                return PolicyVerdict::block(
                    "maxDaily",
                    format!("projected daily spend {projected} exceeds cap {max}"),
                )
                .with_value_limit(projected, max);
            }
        }

        if let Some(max) = self.config.max_monthly {
            let current = state.monthly.get(&month_key).copied().unwrap_or(0.0);
            let projected = current + intent.amount;
            if projected > max {
                return PolicyVerdict::block(
                    "maxMonthly",
                    format!("projected monthly spend {projected} exceeds cap {max}"),
                )
                .with_value_limit(projected, max);
            }
        }

        if let Some(idx) = glob::any_match(&self.lists.blocked_recipients, &intent.recipient) {
            let pattern = self.lists.blocked_recipients[idx].source().to_string();
            return PolicyVerdict::block(
                "blockedRecipients",
                format!("recipient '{}' matches blocked pattern '{pattern}'", intent.recipient),
            )
            .with_detail("matchedPattern", pattern);
        }

        if !self.lists.allowed_recipients.is_empty()
            && glob::any_match(&self.lists.allowed_recipients, &intent.recipient).is_none()
        {
            return PolicyVerdict::block(
                "allowedRecipients",
                format!("recipient '{}' matches no allowed pattern", intent.recipient),
            );
        }

        if let Some(allowed_categories) = &self.config.allowed_categories {
            let category = intent
                .metadata
                .get("category")
                .and_then(|v| v.as_str());
            match category {
                Some(category) if allowed_categories.iter().any(|c| c == category) => {}
                _ => {
                    return PolicyVerdict::block(
                        "allowedCategories",
                        format!(
                            "category {:?} is not in the allowed list",
                            category.unwrap_or("<absent>")
                        ),
                    );
                }
            }
        }

        if let Some(cooldown_ms) = self.config.cooldown_ms {
            if let Some(last) = state.last_transaction_ms {
                let elapsed = Utc::now().timestamp_millis() - last;
                if elapsed < cooldown_ms {
                    return PolicyVerdict::block(
                        "cooldownMs",
                        format!("{elapsed}ms since last transaction, cooldown requires {cooldown_ms}ms"),
                    )
                    .with_value_limit(elapsed as f64, cooldown_ms as f64);
                }
            }
        }

        if let Some(threshold) = self.config.require_escrow_above {
            if intent.amount > threshold && intent.escrow.is_none() {
                return PolicyVerdict::block(
                    "requireEscrowAbove",
                    format!("amount {} exceeds escrow threshold {threshold} with no escrow configured", intent.amount),
                )
                .with_value_limit(intent.amount, threshold);
            }
        }

        PolicyVerdict::allow()
    }

    pub fn requires_human_approval(&self, intent: &PaymentIntent) -> bool {
        match self.config.require_human_approval_above {
            Some(threshold) => intent.amount > threshold,
            None => false,
        }
    }

    pub fn record_transaction(&self, intent: &PaymentIntent) {
        let day_key = day_key(intent.created_at());
        let month_key = month_key(intent.created_at());
        let mut state = self.state.lock().expect("policy state lock poisoned");

        *state.daily.entry(day_key).or_insert(0.0) += intent.amount;
        *state.monthly.entry(month_key).or_insert(0.0) += intent.amount;
        state.last_transaction_ms = Some(intent.created_at_ms);

        // Bound memory: drop daily buckets older than roughly one month. The
        // month-key map is already naturally small since it has one entry per
        // calendar month the engine has been alive.
        let retention_floor = month_key_floor(intent.created_at());
        state.daily.retain(|key, _| key.as_str() >= retention_floor.as_str());
    }

    pub fn reset(&self) {
        let mut state = self.state.lock().expect("policy state lock poisoned");
        state.daily.clear();
        state.monthly.clear();
        state.last_transaction_ms = None;
    }
}

fn day_key(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d").to_string()
}

fn month_key(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m").to_string()
}

/// The first day-key of a month roughly one calendar month before `ts`, used as
/// the retention floor for the daily spend map.
fn month_key_floor(ts: DateTime<Utc>) -> String {
    let one_month_ago = ts - chrono::Duration::days(31);
    day_key(one_month_ago)
}
