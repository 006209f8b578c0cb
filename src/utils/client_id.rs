use rand::distributions::Alphanumeric;
use rand::Rng;
use std::time::{SystemTime, UNIX_EPOCH};

/// Generates client order ids within an exchange's length and charset limits.
///
/// Ids are `<required prefix><broker prefix><millis in base36><random>`,
/// alphanumeric apart from the required prefix, and truncated to `max_len`.
#[derive(Debug, Clone)]
pub struct ClientOrderIdGenerator {
    required_prefix: &'static str,
    broker_prefix: String,
    max_len: usize,
}

impl ClientOrderIdGenerator {
    pub fn new(max_len: usize) -> Self {
        Self {
            required_prefix: "",
            broker_prefix: String::new(),
            max_len,
        }
    }

    /// Broker tag from config; non-alphanumeric characters are dropped.
    #[must_use]
    pub fn with_broker_prefix(mut self, prefix: Option<&str>) -> Self {
        self.broker_prefix = prefix
            .unwrap_or_default()
            .chars()
            .filter(char::is_ascii_alphanumeric)
            .collect();
        self
    }

    /// Prefix the exchange insists on (Gate's `t-`).
    #[must_use]
    pub const fn with_required_prefix(mut self, prefix: &'static str) -> Self {
        self.required_prefix = prefix;
        self
    }

    pub fn generate(&self) -> String {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();
        let random: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(8)
            .map(char::from)
            .collect();

        let mut id = format!(
            "{}{}{}{}",
            self.required_prefix,
            self.broker_prefix,
            to_base36(millis),
            random
        );
        id.truncate(self.max_len);
        id
    }

    /// Use `existing` when present, otherwise generate a fresh id.
    pub fn resolve(&self, existing: Option<&str>) -> String {
        match existing {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => self.generate(),
        }
    }
}

fn to_base36(mut value: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_respect_limits() {
        let generator = ClientOrderIdGenerator::new(32).with_broker_prefix(Some("my-bot_1"));
        let id = generator.generate();
        assert!(id.len() <= 32);
        assert!(id.starts_with("mybot1"));
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(id, generator.generate());
    }

    #[test]
    fn test_required_prefix_survives_truncation() {
        let generator = ClientOrderIdGenerator::new(10)
            .with_required_prefix("t-")
            .with_broker_prefix(Some("verylongbrokerprefix"));
        let id = generator.generate();
        assert!(id.starts_with("t-"));
        assert_eq!(id.len(), 10);
    }

    #[test]
    fn test_resolve_keeps_caller_id() {
        let generator = ClientOrderIdGenerator::new(36);
        assert_eq!(generator.resolve(Some("abc")), "abc");
        assert!(!generator.resolve(Some("")).is_empty());
        assert!(!generator.resolve(None).is_empty());
    }

    #[test]
    fn test_base36() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
    }
}
