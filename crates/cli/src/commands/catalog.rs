use serde_json::json;

use super::{load_catalog, CommandResult};

const COMMAND: &str = "catalog";

pub fn run() -> CommandResult {
    let (config, catalog) = match load_catalog(COMMAND) {
        Ok(loaded) => loaded,
        Err(failure) => return failure,
    };

    let source = config
        .catalog
        .path
        .as_ref()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "embedded".to_string());
    let patterns: Vec<&str> =
        catalog.category_defaults().iter().map(|default| default.pattern.as_str()).collect();

    let data = json!({
        "source": source,
        "entries": catalog.len(),
        "fingerprint": catalog.fingerprint(),
        "categoryPatterns": patterns,
        "genericDefault": catalog.generic_default().key,
    });

    CommandResult::success_with_data(
        COMMAND,
        format!("{} entries loaded from {source}", catalog.len()),
        Some(data),
    )
}
