use serde::{Deserialize, Serialize};

/// Canonical lowercase product name used as the catalog primary key.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CatalogKey(pub String);

impl CatalogKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CatalogKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A reference price record keyed by canonical product name.
///
/// `reference_price` is held in whole INR so band arithmetic never drifts;
/// `variation` bounds how far any generated point may stray from it
/// (0.08 = ±8%).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub key: CatalogKey,
    pub reference_price: i64,
    pub variation: f64,
    pub image_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
}

/// Inclusive integer price bounds derived from an entry's variation band.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceBand {
    pub low: i64,
    pub high: i64,
}

impl PriceBand {
    pub fn contains(&self, price: i64) -> bool {
        (self.low..=self.high).contains(&price)
    }

    pub fn clamp(&self, price: i64) -> i64 {
        price.clamp(self.low, self.high)
    }
}

impl CatalogEntry {
    /// `[ceil(ref * (1 - v)), floor(ref * (1 + v))]`, never empty for a valid entry.
    pub fn band(&self) -> PriceBand {
        let reference = self.reference_price as f64;
        let low = (reference * (1.0 - self.variation)).ceil() as i64;
        let high = (reference * (1.0 + self.variation)).floor() as i64;
        let low = low.clamp(0, self.reference_price);
        let high = high.max(self.reference_price);
        PriceBand { low, high }
    }
}
