use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Snapshot of market indicators taken when the event was observed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MarketContext {
    pub btc_price: Decimal,
    #[serde(default)]
    pub eth_price: Option<Decimal>,
    pub total_market_cap: Decimal,
    #[serde(default)]
    pub btc_dominance: Option<Decimal>,
    /// Fear & greed sentiment index, 0 to 100.
    #[serde(default)]
    pub fear_greed_index: Option<u8>,
    #[serde(default)]
    pub volume_24h: Option<Decimal>,
    pub timestamp: DateTime<Utc>,
}
