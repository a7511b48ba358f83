use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::event::Event;
use crate::market::MarketContext;

/// Canonical cache key derived from an event and its market snapshot.
///
/// The key material is `{event_id, source, market_snapshot: {btc_price, total_market_cap}}`
/// serialized with object keys sorted at every level, then hashed with SHA-256.
/// Field order in the inputs never affects the result, and decimal prices are
/// normalized so `64250.5` and `64250.50` produce the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn compute(event: &Event, market: &MarketContext) -> Self {
        let key_data = serde_json::json!({
            "event_id": event.id.to_string(),
            "source": event.source,
            "market_snapshot": {
                "btc_price": market.btc_price.normalize().to_string(),
                "total_market_cap": market.total_market_cap.normalize().to_string(),
            },
        });
        Self::from_value(&key_data)
    }

    /// Hash an arbitrary JSON value in canonical (sorted-key) form.
    pub fn from_value(value: &Value) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(canonical_json(value).as_bytes());
        Self(format!("{:x}", hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 hex characters, for log lines.
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(12)]
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Serialize a JSON value with object keys sorted at every level.
///
/// `serde_json::Map` is a `BTreeMap` unless the `preserve_order` feature is
/// enabled, so plain serialization already emits sorted keys.
pub fn canonical_json(value: &Value) -> String {
    value.to_string()
}
