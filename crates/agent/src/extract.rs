//! Pulls a JSON object out of free-form model output.

use serde_json::Value;

const FENCE: &str = "```";

/// Returns the first JSON object found in `content`.
///
/// Lookup order: a ```json fenced block, any fenced block, the span from the
/// first `{` to the last `}`, then the whole trimmed text.
pub fn extract_json_object(content: &str) -> Option<Value> {
    let candidates = [
        fenced_block(content, "```json"),
        fenced_block(content, FENCE),
        brace_span(content),
        Some(content.trim()),
    ];

    candidates
        .into_iter()
        .flatten()
        .filter_map(|candidate| serde_json::from_str::<Value>(candidate.trim()).ok())
        .find(Value::is_object)
}

fn fenced_block<'a>(content: &'a str, opener: &str) -> Option<&'a str> {
    let start = content.find(opener)? + opener.len();
    let rest = &content[start..];
    let end = rest.find(FENCE)?;
    Some(&rest[..end])
}

fn brace_span(content: &str) -> Option<&str> {
    let start = content.find('{')?;
    let end = content.rfind('}')?;
    (end > start).then(|| &content[start..=end])
}

#[cfg(test)]
mod tests {
    use super::extract_json_object;

    #[test]
    fn reads_json_fenced_block() {
        let content = "Here you go:\n```json\n{\"productName\": \"Boat Airdopes 141\"}\n```\nThanks";

        let value = extract_json_object(content).expect("object");

        assert_eq!(value["productName"], "Boat Airdopes 141");
    }

    #[test]
    fn reads_unlabelled_fence() {
        let content = "```\n{\"category\": \"electronics\"}\n```";

        let value = extract_json_object(content).expect("object");

        assert_eq!(value["category"], "electronics");
    }

    #[test]
    fn reads_object_embedded_in_prose() {
        let content = "The estimate is {\"currentPriceINR\": 1999, \"nested\": {\"a\": 1}} as of today.";

        let value = extract_json_object(content).expect("object");

        assert_eq!(value["currentPriceINR"], 1999);
        assert_eq!(value["nested"]["a"], 1);
    }

    #[test]
    fn bare_object_is_accepted() {
        let value = extract_json_object("  {\"ok\": true}  ").expect("object");

        assert_eq!(value["ok"], true);
    }

    #[test]
    fn non_object_or_garbage_yields_none() {
        assert!(extract_json_object("no json here").is_none());
        assert!(extract_json_object("[1, 2, 3]").is_none());
        assert!(extract_json_object("} backwards {").is_none());
    }
}
