//! Synthetic monthly price series seeded from a resolved catalog entry.
//!
//! Every point, whether generated here or supplied by a generative backend,
//! passes through [`clamp_to_band`] before it leaves this module.

use chrono::{Datelike, Months, NaiveDate};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::domain::product::CatalogEntry;

pub const HISTORY_MONTHS: usize = 12;
pub const FORECAST_MONTHS: usize = 6;

const MONTH_LABEL_FORMAT: &str = "%b %Y";

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SynthesisSettings {
    /// Absolute first-to-last change (percent) below which a series is stable.
    pub stable_threshold_pct: f64,
    /// Pull of each step back toward the reference price, in `[0, 1]`.
    pub mean_reversion: f64,
}

impl Default for SynthesisSettings {
    fn default() -> Self {
        Self { stable_threshold_pct: 2.0, mean_reversion: 0.2 }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricePoint {
    pub month: String,
    pub price: i64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Increasing,
    Decreasing,
    Stable,
}

impl Trend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Increasing => "increasing",
            Self::Decreasing => "decreasing",
            Self::Stable => "stable",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    pub history: Vec<PricePoint>,
    pub forecast: Vec<PricePoint>,
    pub trend: Trend,
    pub percent_change: f64,
}

impl PriceSeries {
    /// The latest historical point.
    pub fn current_price(&self) -> i64 {
        self.history.last().map(|point| point.price).unwrap_or_default()
    }
}

#[derive(Clone, Debug, Default)]
pub struct SeriesSynthesizer {
    settings: SynthesisSettings,
}

impl SeriesSynthesizer {
    pub fn new(settings: SynthesisSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &SynthesisSettings {
        &self.settings
    }

    /// Random walk around the reference price: twelve months ending at
    /// `anchor`, then six forecast months.
    pub fn synthesize<R: Rng>(
        &self,
        entry: &CatalogEntry,
        anchor: NaiveDate,
        rng: &mut R,
    ) -> PriceSeries {
        let reference = entry.reference_price as f64;
        let spread = reference * entry.variation;
        let step = spread / 3.0;
        let reversion = self.settings.mean_reversion.clamp(0.0, 1.0);

        let mut current = reference + rng.gen_range(-0.5..=0.5) * spread;
        let mut prices = Vec::with_capacity(HISTORY_MONTHS + FORECAST_MONTHS);
        for _ in 0..HISTORY_MONTHS + FORECAST_MONTHS {
            let clamped = clamp_to_band(entry, current);
            prices.push(clamped);
            let previous = clamped as f64;
            current = previous + (reference - previous) * reversion + rng.gen_range(-step..=step);
        }

        let forecast = prices.split_off(HISTORY_MONTHS);
        self.assemble(anchor, prices, forecast)
    }

    /// Forces externally supplied prices into the contract: exact lengths,
    /// finite values, every point inside the entry's band, and month labels
    /// recomputed from `anchor`. Missing points are filled from a local walk.
    pub fn normalize<R: Rng>(
        &self,
        entry: &CatalogEntry,
        anchor: NaiveDate,
        history: &[f64],
        forecast: &[f64],
        rng: &mut R,
    ) -> PriceSeries {
        let fallback = self.synthesize(entry, anchor, rng);

        let overlay = |supplied: &[f64], local: &[PricePoint]| -> Vec<i64> {
            local
                .iter()
                .enumerate()
                .map(|(index, point)| match supplied.get(index) {
                    Some(price) if price.is_finite() => clamp_to_band(entry, *price),
                    _ => point.price,
                })
                .collect()
        };

        let history = overlay(history, &fallback.history);
        let forecast = overlay(forecast, &fallback.forecast);
        self.assemble(anchor, history, forecast)
    }

    fn assemble(&self, anchor: NaiveDate, history: Vec<i64>, forecast: Vec<i64>) -> PriceSeries {
        let (history_labels, forecast_labels) = month_labels(anchor);
        let (trend, percent_change) = classify_trend(&history, self.settings.stable_threshold_pct);

        PriceSeries {
            history: label(history_labels, history),
            forecast: label(forecast_labels, forecast),
            trend,
            percent_change,
        }
    }
}

/// Rounds to whole INR and clamps into the entry's band. Non-finite input
/// collapses to the reference price.
pub fn clamp_to_band(entry: &CatalogEntry, price: f64) -> i64 {
    let band = entry.band();
    if !price.is_finite() {
        return band.clamp(entry.reference_price);
    }

    let rounded = price.round();
    if rounded <= band.low as f64 {
        band.low
    } else if rounded >= band.high as f64 {
        band.high
    } else {
        rounded as i64
    }
}

/// Trend from the first and last history points, with the percent change
/// rounded to one decimal place.
pub fn classify_trend(history: &[i64], stable_threshold_pct: f64) -> (Trend, f64) {
    let (Some(first), Some(last)) = (history.first(), history.last()) else {
        return (Trend::Stable, 0.0);
    };
    if *first <= 0 {
        return (Trend::Stable, 0.0);
    }

    let change = (*last - *first) as f64 / *first as f64 * 100.0;
    let percent_change = (change * 10.0).round() / 10.0;

    let trend = if percent_change.abs() < stable_threshold_pct {
        Trend::Stable
    } else if percent_change > 0.0 {
        Trend::Increasing
    } else {
        Trend::Decreasing
    };

    (trend, percent_change)
}

/// History labels for the twelve months ending at `anchor`, oldest first,
/// and forecast labels for the six months after it.
pub fn month_labels(anchor: NaiveDate) -> (Vec<String>, Vec<String>) {
    let anchor = anchor.with_day(1).unwrap_or(anchor);
    let shift = |offset: i64| {
        let month = if offset < 0 {
            anchor.checked_sub_months(Months::new(offset.unsigned_abs() as u32))
        } else {
            anchor.checked_add_months(Months::new(offset as u32))
        };
        month.unwrap_or(anchor).format(MONTH_LABEL_FORMAT).to_string()
    };

    let oldest = 1 - HISTORY_MONTHS as i64;
    let history = (oldest..=0).map(&shift).collect();
    let forecast = (1..=FORECAST_MONTHS as i64).map(shift).collect();
    (history, forecast)
}

fn label(labels: Vec<String>, prices: Vec<i64>) -> Vec<PricePoint> {
    labels.into_iter().zip(prices).map(|(month, price)| PricePoint { month, price }).collect()
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::{
        clamp_to_band, classify_trend, month_labels, SeriesSynthesizer, Trend, FORECAST_MONTHS,
        HISTORY_MONTHS,
    };
    use crate::domain::product::{CatalogEntry, CatalogKey};

    fn entry(reference_price: i64, variation: f64) -> CatalogEntry {
        CatalogEntry {
            key: CatalogKey("royal enfield classic 350".to_string()),
            reference_price,
            variation,
            image_url: "https://example.test/bike.png".to_string(),
            brand: Some("Royal Enfield".to_string()),
        }
    }

    fn anchor() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 15).expect("valid date")
    }

    #[test]
    fn synthesized_series_has_fixed_lengths() {
        let mut rng = StdRng::seed_from_u64(7);
        let series = SeriesSynthesizer::default().synthesize(&entry(193_000, 0.04), anchor(), &mut rng);

        assert_eq!(series.history.len(), HISTORY_MONTHS);
        assert_eq!(series.forecast.len(), FORECAST_MONTHS);
        assert_eq!(series.current_price(), series.history[11].price);
    }

    #[test]
    fn every_point_stays_inside_variation_band() {
        let synthesizer = SeriesSynthesizer::default();

        for (reference_price, variation) in [(28, 0.05), (193_000, 0.04), (5_000, 0.10), (350, 1.0)] {
            let item = entry(reference_price, variation);
            let low = reference_price as f64 * (1.0 - variation);
            let high = reference_price as f64 * (1.0 + variation);

            for seed in 0..50 {
                let mut rng = StdRng::seed_from_u64(seed);
                let series = synthesizer.synthesize(&item, anchor(), &mut rng);
                for point in series.history.iter().chain(series.forecast.iter()) {
                    let price = point.price as f64;
                    assert!(price >= low && price <= high, "{price} outside [{low}, {high}]");
                }
            }
        }
    }

    #[test]
    fn same_seed_reproduces_series() {
        let synthesizer = SeriesSynthesizer::default();
        let item = entry(5_000, 0.1);

        let first = synthesizer.synthesize(&item, anchor(), &mut StdRng::seed_from_u64(42));
        let second = synthesizer.synthesize(&item, anchor(), &mut StdRng::seed_from_u64(42));

        assert_eq!(first, second);
    }

    #[test]
    fn month_labels_end_at_anchor_and_continue_forward() {
        let (history, forecast) = month_labels(anchor());

        assert_eq!(history.first().map(String::as_str), Some("Jul 2024"));
        assert_eq!(history.last().map(String::as_str), Some("Jun 2025"));
        assert_eq!(forecast.first().map(String::as_str), Some("Jul 2025"));
        assert_eq!(forecast.last().map(String::as_str), Some("Dec 2025"));
    }

    #[test]
    fn clamp_pulls_outliers_into_band() {
        let item = entry(1_000, 0.1);

        assert_eq!(clamp_to_band(&item, 5_000.0), 1_100);
        assert_eq!(clamp_to_band(&item, -3.0), 900);
        assert_eq!(clamp_to_band(&item, 1_049.6), 1_050);
        assert_eq!(clamp_to_band(&item, f64::NAN), 1_000);
    }

    #[test]
    fn normalize_clamps_pads_and_truncates_supplied_prices() {
        let item = entry(1_000, 0.1);
        let supplied_history = vec![2_000.0, 950.0, f64::INFINITY];
        let supplied_forecast = vec![500.0; FORECAST_MONTHS + 4];
        let mut rng = StdRng::seed_from_u64(3);

        let series = SeriesSynthesizer::default().normalize(
            &item,
            anchor(),
            &supplied_history,
            &supplied_forecast,
            &mut rng,
        );

        assert_eq!(series.history.len(), HISTORY_MONTHS);
        assert_eq!(series.forecast.len(), FORECAST_MONTHS);
        assert_eq!(series.history[0].price, 1_100);
        assert_eq!(series.history[1].price, 950);
        assert!(item.band().contains(series.history[2].price));
        assert!(series.forecast.iter().all(|point| point.price == 900));
        assert_eq!(series.history[0].month, "Jul 2024");
    }

    #[test]
    fn trend_classification_uses_first_and_last_points() {
        assert_eq!(classify_trend(&[1_000, 1_200, 1_050], 2.0), (Trend::Increasing, 5.0));
        assert_eq!(classify_trend(&[1_000, 900, 950], 2.0), (Trend::Decreasing, -5.0));
        assert_eq!(classify_trend(&[1_000, 1_300, 1_010], 2.0), (Trend::Stable, 1.0));
        assert_eq!(classify_trend(&[], 2.0), (Trend::Stable, 0.0));
    }
}
