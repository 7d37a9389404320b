//! Client-facing product price record.
//!
//! Field names follow the JSON contract consumed by the web client, hence the
//! explicit renames for the INR/USD suffixes.

use serde::{Deserialize, Serialize};

use crate::domain::query::Query;
use crate::pricing::currency::UsdConverter;
use crate::pricing::resolver::{MatchSource, ResolutionResult};
use crate::pricing::synthesis::{PricePoint, PriceSeries, Trend};

const DEFAULT_CATEGORY: &str = "general";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecordPricePoint {
    pub month: String,
    #[serde(rename = "priceINR")]
    pub price_inr: i64,
    #[serde(rename = "priceUSD")]
    pub price_usd: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceAnalysis {
    pub trend: Trend,
    pub percent_change: f64,
    pub best_time_to_buy: String,
    pub recommendation: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSpecifications {
    pub brand: String,
    pub model: String,
    pub description: String,
    pub image_url: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductPriceRecord {
    pub product_name: String,
    pub category: String,
    #[serde(rename = "currentPriceINR")]
    pub current_price_inr: i64,
    #[serde(rename = "currentPriceUSD")]
    pub current_price_usd: f64,
    pub price_history: Vec<RecordPricePoint>,
    pub predicted_prices: Vec<RecordPricePoint>,
    pub price_analysis: PriceAnalysis,
    pub specifications: ProductSpecifications,
}

/// Assembles the outbound record from a resolution and its synthesized series.
pub fn build_record(
    query: &Query,
    resolution: &ResolutionResult,
    series: &PriceSeries,
    converter: &UsdConverter,
) -> ProductPriceRecord {
    let convert = |points: &[PricePoint]| -> Vec<RecordPricePoint> {
        points
            .iter()
            .map(|point| RecordPricePoint {
                month: point.month.clone(),
                price_inr: point.price,
                price_usd: converter.to_usd_f64(point.price),
            })
            .collect()
    };

    let current_price = series.current_price();
    let category = query.category_hint().unwrap_or(DEFAULT_CATEGORY).to_string();

    ProductPriceRecord {
        product_name: query.text().to_string(),
        current_price_inr: current_price,
        current_price_usd: converter.to_usd_f64(current_price),
        price_history: convert(&series.history),
        predicted_prices: convert(&series.forecast),
        price_analysis: analyze(series),
        specifications: ProductSpecifications {
            brand: resolution.entry.brand.clone().unwrap_or_else(|| brand_from_name(query.text())),
            model: query.text().to_string(),
            description: describe(resolution, &category),
            image_url: resolution.entry.image_url.clone(),
        },
        category,
    }
}

pub fn analyze(series: &PriceSeries) -> PriceAnalysis {
    let current = series.current_price();
    let cheapest = series.forecast.iter().min_by_key(|point| point.price);

    let best_time_to_buy = match cheapest {
        Some(point) if point.price < current => point.month.clone(),
        _ => "Now".to_string(),
    };

    let recommendation = match series.trend {
        Trend::Increasing => "Prices are trending up; buying soon is recommended.",
        Trend::Decreasing => "Prices are trending down; waiting may get you a better deal.",
        Trend::Stable => "Prices are stable; buy whenever it suits you.",
    };

    PriceAnalysis {
        trend: series.trend,
        percent_change: series.percent_change,
        best_time_to_buy,
        recommendation: recommendation.to_string(),
    }
}

fn describe(resolution: &ResolutionResult, category: &str) -> String {
    let entry = &resolution.entry;
    let variation_pct = (entry.variation * 100.0).round();

    match resolution.source {
        MatchSource::Catalog => format!(
            "Matched catalog product `{}` (confidence {}): reference price ₹{} with ±{}% expected variation.",
            resolution.matched_key, resolution.score, entry.reference_price, variation_pct
        ),
        MatchSource::CategoryDefault => format!(
            "No confident catalog match; estimated from {} category defaults around ₹{} (±{}%).",
            category, entry.reference_price, variation_pct
        ),
    }
}

fn brand_from_name(name: &str) -> String {
    let Some(first) = name.split_whitespace().next() else {
        return String::new();
    };

    let mut chars = first.chars();
    match chars.next() {
        Some(initial) => initial.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
