//! Process-unique, monotonic-within-process id generation for payment intents.

use chrono::Utc;
use std::sync::atomic::{AtomicU32, Ordering};

static COUNTER: AtomicU32 = AtomicU32::new(0);

/// Generate an id of shape `pay_<hex-time>_<hex-rand>`. The counter is folded
/// into the suffix so two ids requested within the same millisecond still differ.
pub fn generate() -> String {
    let now_ms = Utc::now().timestamp_millis().max(0) as u64;
    let counter = COUNTER.fetch_add(1, Ordering::Relaxed);
    let salted = now_ms ^ (u64::from(counter) << 20) ^ u64::from(blake3_seed(counter));
    format!("pay_{now_ms:x}_{salted:x}")
}

fn blake3_seed(counter: u32) -> u32 {
    let hash = blake3::hash(&counter.to_le_bytes());
    u32::from_le_bytes(hash.as_bytes()[0..4].try_into().unwrap())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn ids_are_unique_within_the_same_millisecond() {
        let ids: HashSet<String> = (0..1000).map(|_| generate()).collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn ids_have_the_expected_shape() {
        let id = generate();
        assert!(id.starts_with("pay_"));
        let mut parts = id.trim_start_matches("pay_").split('_');
        let time_part = parts.next().unwrap();
        let rand_part = parts.next().unwrap();
        assert!(u64::from_str_radix(time_part, 16).is_ok());
        assert!(u64::from_str_radix(rand_part, 16).is_ok());
    }
}
