use pricelens_core::domain::query::Query;
use pricelens_core::pricing::resolver::FuzzyResolver;
use pricelens_core::pricing::resolver::PriceResolver;
use serde_json::json;

use super::{load_catalog, CommandResult, EXIT_INVALID_QUERY};

const COMMAND: &str = "resolve";

pub fn run(text: &str, category: Option<&str>) -> CommandResult {
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

    let resolution = FuzzyResolver::with_settings(catalog, config.resolver).resolve(&query);
    let band = resolution.entry.band();
    let message = if resolution.is_catalog_hit() {
        format!("matched `{}` with score {}", resolution.matched_key, resolution.score)
    } else {
        format!("no confident match; using `{}` defaults", resolution.entry.key)
    };

    let data = json!({
        "query": query.text(),
        "category": query.category_hint(),
        "matchedKey": resolution.matched_key,
        "entryKey": resolution.entry.key,
        "score": resolution.score,
        "source": resolution.source,
        "referencePrice": resolution.entry.reference_price,
        "variation": resolution.entry.variation,
        "band": band,
    });

    CommandResult::success_with_data(COMMAND, message, Some(data))
}
