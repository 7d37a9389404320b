use chrono::{NaiveDate, Utc};
use pricelens_core::domain::query::Query;
use pricelens_core::pricing::PricingRuntime;
use rand::rngs::StdRng;
use rand::SeedableRng;

use super::{load_catalog, CommandResult, EXIT_CONFIG, EXIT_INVALID_QUERY};

const COMMAND: &str = "quote";

/// Same seed and anchor month always print the same record.
pub fn run(
    text: &str,
    category: Option<&str>,
    seed: Option<u64>,
    anchor: Option<NaiveDate>,
) -> CommandResult {
    let (config, catalog) = match load_catalog(COMMAND) {
        Ok(loaded) => loaded,
        Err(failure) => return failure,
    };

    let query = match Query::new(text, category) {
        Ok(query) => query,
        Err(error) => {
            return CommandResult::failure(
                COMMAND,
                "invalid_query",
                error.to_string(),
                EXIT_INVALID_QUERY,
            )
        }
    };

    let Some(converter) = config.pricing.converter() else {
        return CommandResult::failure(
            COMMAND,
            "config_validation",
            "pricing.usd_rate must be greater than zero",
            EXIT_CONFIG,
        );
    };

    let runtime = PricingRuntime::from_catalog(
        catalog,
        config.resolver,
        config.pricing.synthesis_settings(),
        converter,
    );
    let anchor = anchor.unwrap_or_else(|| Utc::now().date_naive());
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let quote = runtime.quote(&query, anchor, &mut rng);
    let message = format!(
        "{} at ₹{} via `{}`",
        quote.record.product_name, quote.record.current_price_inr, quote.resolution.matched_key
    );

    match serde_json::to_value(&quote.record) {
        Ok(data) => CommandResult::success_with_data(COMMAND, message, Some(data)),
        Err(error) => CommandResult::failure(COMMAND, "serialization", error.to_string(), 1),
    }
}
