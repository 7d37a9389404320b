use async_trait::async_trait;
use chrono::NaiveDate;
use pricelens_core::domain::product::{CatalogEntry, PriceBand};
use pricelens_core::domain::query::Query;
use pricelens_core::errors::ApplicationError;
use pricelens_core::pricing::record::ProductPriceRecord;
use pricelens_core::pricing::resolver::ResolutionResult;
use pricelens_core::pricing::synthesis::{month_labels, PriceSeries, SeriesSynthesizer};
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("gateway rate limit exceeded")]
    RateLimited,
    #[error("gateway requires payment")]
    PaymentRequired,
    #[error("gateway returned status {status}: {message}")]
    Upstream { status: u16, message: String },
    #[error("gateway transport failure: {0}")]
    Transport(String),
    #[error("gateway response could not be parsed: {0}")]
    MalformedResponse(String),
}

impl OracleError {
    /// Quota failures are reported to the caller instead of falling back.
    pub fn is_quota(&self) -> bool {
        matches!(self, Self::RateLimited | Self::PaymentRequired)
    }
}

impl From<OracleError> for ApplicationError {
    fn from(value: OracleError) -> Self {
        match value {
            OracleError::RateLimited => Self::RateLimited(value.to_string()),
            OracleError::PaymentRequired => Self::PaymentRequired(value.to_string()),
            other => Self::Integration(other.to_string()),
        }
    }
}

/// Everything the gateway needs to produce a series anchored on the catalog.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OracleRequest {
    pub product_name: String,
    pub category: Option<String>,
    pub matched_key: String,
    pub reference_price: i64,
    pub band: PriceBand,
    pub history_months: Vec<String>,
    pub forecast_months: Vec<String>,
}

impl OracleRequest {
    pub fn new(query: &Query, resolution: &ResolutionResult, anchor: NaiveDate) -> Self {
        let (history_months, forecast_months) = month_labels(anchor);
        Self {
            product_name: query.text().to_string(),
            category: query.category_hint().map(str::to_string),
            matched_key: resolution.matched_key.clone(),
            reference_price: resolution.entry.reference_price,
            band: resolution.entry.band(),
            history_months,
            forecast_months,
        }
    }
}

/// One price point from a gateway reply. Any `month` label in the reply is
/// skipped; labels always come from the request anchor.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct OraclePoint {
    #[serde(default, rename = "priceINR")]
    pub price_inr: Option<f64>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct OracleSpecifications {
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Price payload as returned by the gateway. Every field is optional; gaps
/// are filled locally when the quote is normalized.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OracleQuote {
    #[serde(default)]
    pub price_history: Vec<OraclePoint>,
    #[serde(default)]
    pub predicted_prices: Vec<OraclePoint>,
    #[serde(default)]
    pub specifications: Option<OracleSpecifications>,
}

impl OracleQuote {
    /// Clamps the supplied prices into the entry's band, recomputing labels
    /// and trend locally.
    pub fn into_series<R: Rng>(
        &self,
        synthesizer: &SeriesSynthesizer,
        entry: &CatalogEntry,
        anchor: NaiveDate,
        rng: &mut R,
    ) -> PriceSeries {
        let prices = |points: &[OraclePoint]| -> Vec<f64> {
            points.iter().map(|point| point.price_inr.unwrap_or(f64::NAN)).collect()
        };

        synthesizer.normalize(
            entry,
            anchor,
            &prices(&self.price_history),
            &prices(&self.predicted_prices),
            rng,
        )
    }

    /// Copies non-blank brand and description onto the record.
    pub fn apply_specifications(&self, record: &mut ProductPriceRecord) {
        let Some(specifications) = &self.specifications else {
            return;
        };

        let non_blank = |value: &Option<String>| {
            value.as_deref().map(str::trim).filter(|text| !text.is_empty()).map(str::to_string)
        };

        if let Some(brand) = non_blank(&specifications.brand) {
            record.specifications.brand = brand;
        }
        if let Some(description) = non_blank(&specifications.description) {
            record.specifications.description = description;
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identification {
    pub product_name: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub description: Option<String>,
}

#[async_trait]
pub trait PricingOracle: Send + Sync {
    async fn quote(&self, request: &OracleRequest) -> Result<OracleQuote, OracleError>;

    /// `image` is a `data:image/...` or `http(s)://` URL.
    async fn identify(&self, image: &str) -> Result<Identification, OracleError>;

    fn model_name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::NaiveDate;
    use pricelens_core::domain::query::Query;
    use pricelens_core::errors::ApplicationError;
    use pricelens_core::pricing::catalog::Catalog;
    use pricelens_core::pricing::currency::UsdConverter;
    use pricelens_core::pricing::record::build_record;
    use pricelens_core::pricing::resolver::{FuzzyResolver, PriceResolver};
    use pricelens_core::pricing::synthesis::SeriesSynthesizer;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::{OracleError, OracleQuote, OracleRequest};

    fn anchor() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 1).expect("date")
    }

    fn resolver() -> FuzzyResolver {
        FuzzyResolver::new(Arc::new(Catalog::embedded().expect("catalog")))
    }

    #[test]
    fn request_carries_band_and_month_labels() {
        let query = Query::new("iphone 16 pro", Some("electronics")).expect("query");
        let resolution = resolver().resolve(&query);

        let request = OracleRequest::new(&query, &resolution, anchor());

        assert_eq!(request.matched_key, "iphone 16 pro");
        assert_eq!(request.band, resolution.entry.band());
        assert_eq!(request.history_months.len(), 12);
        assert_eq!(request.history_months.last().map(String::as_str), Some("Jun 2025"));
        assert_eq!(request.forecast_months.first().map(String::as_str), Some("Jul 2025"));
    }

    #[test]
    fn wild_gateway_prices_are_clamped_into_band() {
        let query = Query::new("tata salt 1kg", None).expect("query");
        let resolution = resolver().resolve(&query);
        let quote: OracleQuote = serde_json::from_value(serde_json::json!({
            "priceHistory": [
                {"month": "Jan 1999", "priceINR": 1_000_000},
                {"month": "Feb 1999", "priceINR": -5},
                {"month": "Mar 1999"}
            ],
            "predictedPrices": [{"priceINR": 0}]
        }))
        .expect("quote");

        let series = quote.into_series(
            &SeriesSynthesizer::default(),
            &resolution.entry,
            anchor(),
            &mut StdRng::seed_from_u64(3),
        );

        let band = resolution.entry.band();
        assert_eq!(series.history.len(), 12);
        assert_eq!(series.forecast.len(), 6);
        assert_eq!(series.history[0].price, band.high);
        assert_eq!(series.history[1].price, band.low);
        assert_eq!(series.forecast[0].price, band.low);
        assert_eq!(series.history[0].month, "Jul 2024");
        assert!(series.history.iter().chain(&series.forecast).all(|p| band.contains(p.price)));
    }

    #[test]
    fn specifications_override_only_non_blank_fields() {
        let query = Query::new("sg cricket bat", Some("sports")).expect("query");
        let resolution = resolver().resolve(&query);
        let series = SeriesSynthesizer::default().synthesize(
            &resolution.entry,
            anchor(),
            &mut StdRng::seed_from_u64(9),
        );
        let mut record = build_record(&query, &resolution, &series, &UsdConverter::default());
        let original_brand = record.specifications.brand.clone();
        let quote: OracleQuote = serde_json::from_value(serde_json::json!({
            "specifications": {"brand": "  ", "description": "English willow, full size"}
        }))
        .expect("quote");

        quote.apply_specifications(&mut record);

        assert_eq!(record.specifications.brand, original_brand);
        assert_eq!(record.specifications.description, "English willow, full size");
    }

    #[test]
    fn quota_errors_map_to_their_application_class() {
        assert!(OracleError::RateLimited.is_quota());
        assert!(OracleError::PaymentRequired.is_quota());
        assert!(!OracleError::Transport("reset".to_string()).is_quota());

        assert!(matches!(
            ApplicationError::from(OracleError::RateLimited),
            ApplicationError::RateLimited(_)
        ));
        assert!(matches!(
            ApplicationError::from(OracleError::MalformedResponse("empty".to_string())),
            ApplicationError::Integration(_)
        ));
    }
}
