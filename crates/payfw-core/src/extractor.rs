//! Rule-based, deterministic extraction of structured fields from free text (C1).

use crate::types::StructuredIntent;
use once_cell::sync::Lazy;
use regex::Regex;

static DOLLAR_AMOUNT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\s?([0-9][0-9,]*(?:\.[0-9]+)?)").unwrap());

static AMOUNT_THEN_CURRENCY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b([0-9][0-9,]*(?:\.[0-9]+)?)\s*(usdc|usd|eth|ether|ethereum|sol|solana|btc|bitcoin|dai|matic|avax|dollars?)\b").unwrap()
});

static CURRENCY_THEN_AMOUNT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(usdc|usd|eth|ether|ethereum|sol|solana|btc|bitcoin|dai|matic|avax)\s*([0-9][0-9,]*(?:\.[0-9]+)?)\b").unwrap()
});

static AGENT_URI: Lazy<Regex> = Lazy::new(|| Regex::new(r"agent://[^\s,]+").unwrap());
static HEX_ADDRESS: Lazy<Regex> = Lazy::new(|| Regex::new(r"0x[0-9a-fA-F]{40}").unwrap());
static ENS_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Za-z0-9-]+\.eth\b").unwrap());
static HTTP_URL: Lazy<Regex> = Lazy::new(|| Regex::new(r"https?://[^\s,]+").unwrap());

static WITHIN_DURATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bwithin\s+([0-9]+)\s*(minutes?|mins?|hours?|hrs?|days?|weeks?|m|h|d|w)\b").unwrap());
static BY_NAMED_TIME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bby\s+(tomorrow|tonight|monday|tuesday|wednesday|thursday|friday|saturday|sunday|end of day|end of week|end of month)\b").unwrap()
});
static BARE_DURATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b([0-9]+)\s*(minutes?|mins?|hours?|hrs?|days?|weeks?|m|h|d|w)\b").unwrap());

const FILLER_WORDS: &[&str] = &["pay", "send", "transfer", "to", "for", "within", "by"];

fn normalize_unit(unit: &str) -> char {
    let lower = unit.to_ascii_lowercase();
    if lower.starts_with('m') && !lower.starts_with("min") {
        // bare "m" already means minutes in this table; "month" never appears alone here
        return 'm';
    }
    match lower.as_str() {
        u if u.starts_with("min") || u == "m" => 'm',
        u if u.starts_with('h') => 'h',
        u if u.starts_with('d') => 'd',
        u if u.starts_with('w') => 'w',
        _ => 'm',
    }
}

fn normalize_currency_alias(token: &str) -> &'static str {
    match token.to_ascii_lowercase().as_str() {
        "usdc" => "USDC",
        "eth" | "ether" | "ethereum" => "ETH",
        "sol" | "solana" => "SOL",
        "btc" | "bitcoin" => "BTC",
        "dai" => "DAI",
        "matic" => "MATIC",
        "avax" => "AVAX",
        "dollar" | "dollars" | "usd" => "USD",
        _ => "USD",
    }
}

fn parse_numeral(raw: &str) -> Option<f64> {
    raw.replace(',', "").parse::<f64>().ok()
}

/// Parse free text into a [`StructuredIntent`]. Every rule is a deterministic regex;
/// the same input always yields the same output.
pub fn extract(text: &str) -> StructuredIntent {
    let mut result = StructuredIntent {
        raw_text: text.to_string(),
        ..Default::default()
    };

    let mut matched_spans: Vec<(usize, usize)> = Vec::new();

    // (a) bare dollar form.
    if let Some(m) = DOLLAR_AMOUNT.captures(text) {
        if let Some(amount) = parse_numeral(&m[1]) {
            result.amount = Some(amount);
            result.currency = Some("USD".to_string());
        }
        let whole = m.get(0).unwrap();
        matched_spans.push((whole.start(), whole.end()));
    }

    // (b) amount followed by a known currency code/alias overrides (a), unless the
    // token is the word "dollar(s)" (which just reaffirms USD).
    if let Some(m) = AMOUNT_THEN_CURRENCY.captures(text) {
        let token = &m[2];
        if let Some(amount) = parse_numeral(&m[1]) {
            if !token.to_ascii_lowercase().starts_with("dollar") {
                result.amount = Some(amount);
                result.currency = Some(normalize_currency_alias(token).to_string());
            } else if result.amount.is_none() {
                result.amount = Some(amount);
                result.currency = Some("USD".to_string());
            }
        }
        let whole = m.get(0).unwrap();
        matched_spans.push((whole.start(), whole.end()));
    }

    // (c) currency code preceding an amount only fills in what (a)/(b) left blank.
    if result.amount.is_none() {
        if let Some(m) = CURRENCY_THEN_AMOUNT.captures(text) {
            if let Some(amount) = parse_numeral(&m[2]) {
                result.amount = Some(amount);
                result.currency = Some(normalize_currency_alias(&m[1]).to_string());
            }
            let whole = m.get(0).unwrap();
            matched_spans.push((whole.start(), whole.end()));
        }
    }

    // Recipient resolution: agent:// > hex address > ENS > HTTP(S) URL.
    if let Some(m) = AGENT_URI.find(text) {
        result.recipient = Some(m.as_str().to_string());
        matched_spans.push((m.start(), m.end()));
    } else if let Some(m) = HEX_ADDRESS.find(text) {
        result.recipient = Some(m.as_str().to_string());
        matched_spans.push((m.start(), m.end()));
    } else if let Some(m) = ENS_NAME.find(text) {
        result.recipient = Some(m.as_str().to_string());
        matched_spans.push((m.start(), m.end()));
    } else if let Some(m) = HTTP_URL.find(text) {
        result.recipient = Some(m.as_str().to_string());
        matched_spans.push((m.start(), m.end()));
    }

    // Deadline resolution: "within N unit" > "by <named time>" > bare "N unit".
    if let Some(m) = WITHIN_DURATION.captures(text) {
        let amount = &m[1];
        let unit = normalize_unit(&m[2]);
        result.deadline = Some(format!("{amount}{unit}"));
        let whole = m.get(0).unwrap();
        matched_spans.push((whole.start(), whole.end()));
    } else if let Some(m) = BY_NAMED_TIME.captures(text) {
        result.deadline = Some(m[1].to_ascii_lowercase());
        let whole = m.get(0).unwrap();
        matched_spans.push((whole.start(), whole.end()));
    } else if let Some(m) = BARE_DURATION.captures(text) {
        let amount = &m[1];
        let unit = normalize_unit(&m[2]);
        result.deadline = Some(format!("{amount}{unit}"));
        let whole = m.get(0).unwrap();
        matched_spans.push((whole.start(), whole.end()));
    }

    result.purpose = residual_purpose(text, &matched_spans);
    result
}

fn residual_purpose(text: &str, matched_spans: &[(usize, usize)]) -> Option<String> {
    let mut chars: Vec<char> = text.chars().collect();
    for &(start, end) in matched_spans {
        // Spans are byte offsets; text is ASCII-heavy but guard against non-ASCII
        // by operating on a byte buffer instead of the char vec when mismatched.
        if text.is_char_boundary(start) && text.is_char_boundary(end) {
            let start_idx = text[..start].chars().count();
            let end_idx = text[..end].chars().count();
            for c in chars.iter_mut().take(end_idx).skip(start_idx) {
                *c = ' ';
            }
        }
    }
    let blanked: String = chars.into_iter().collect();

    let words: Vec<&str> = blanked
        .split_whitespace()
        .filter(|w| {
            let stripped = w.trim_start_matches('$');
            !FILLER_WORDS.contains(&stripped.to_ascii_lowercase().as_str())
        })
        .collect();

    let joined = words.join(" ").replace('$', "");
    let collapsed = joined.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.is_empty() {
        None
    } else {
        Some(collapsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_dollar_form() {
        let s = extract("pay $50 for api usage");
        assert_eq!(s.amount, Some(50.0));
        assert_eq!(s.currency.as_deref(), Some("USD"));
    }

    #[test]
    fn amount_then_currency_overrides_dollar_form() {
        let s = extract("pay $50 worth, actually send 50 usdc instead");
        assert_eq!(s.amount, Some(50.0));
        assert_eq!(s.currency.as_deref(), Some("USDC"));
    }

    #[test]
    fn commas_in_numerals_are_ignored() {
        let s = extract("transfer $10,000 to agent://vendor");
        assert_eq!(s.amount, Some(10000.0));
    }

    #[test]
    fn currency_then_amount_only_fills_blank() {
        let s = extract("send usdc 75 to agent://vendor");
        assert_eq!(s.amount, Some(75.0));
        assert_eq!(s.currency.as_deref(), Some("USDC"));
    }

    #[test]
    fn recipient_priority_agent_uri_wins() {
        let s = extract("pay agent://vendor or https://fallback.example for api access");
        assert_eq!(s.recipient.as_deref(), Some("agent://vendor"));
    }

    #[test]
    fn hex_address_recipient() {
        let s = extract("send 10 usdc to 0x1234567890123456789012345678901234567890");
        assert_eq!(
            s.recipient.as_deref(),
            Some("0x1234567890123456789012345678901234567890")
        );
    }

    #[test]
    fn ens_recipient() {
        let s = extract("pay vitalik.eth 5 eth for consulting");
        assert_eq!(s.recipient.as_deref(), Some("vitalik.eth"));
    }

    #[test]
    fn deadline_within_duration() {
        let s = extract("pay $20 within 3 days for hosting");
        assert_eq!(s.deadline.as_deref(), Some("3d"));
    }

    #[test]
    fn deadline_by_named_time() {
        let s = extract("pay $20 by tomorrow for hosting");
        assert_eq!(s.deadline.as_deref(), Some("tomorrow"));
    }

    #[test]
    fn residual_purpose_strips_fillers_and_matches() {
        let s = extract("pay $50 to agent://vendor for api usage this month");
        assert_eq!(s.purpose.as_deref(), Some("api usage this month"));
    }

    #[test]
    fn empty_residual_purpose_is_null() {
        let s = extract("pay $50 to agent://vendor");
        assert_eq!(s.purpose, None);
    }
}
