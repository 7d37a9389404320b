//! Fuzzy resolution of free-text product queries against the reference catalog.
//!
//! Every catalog key is scored against the query and the best candidate wins
//! when it clears the confidence floor. Scoring tiers, highest first:
//!
//! - exact match (default 100)
//! - query contains key (default 80)
//! - key contains query (default 70)
//! - word overlap, scaled to at most the overlap weight (default 60)
//!
//! Equal scores prefer the longer key, then the lexicographically smaller one,
//! so results never depend on catalog definition order.

use std::cmp::Ordering;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::product::CatalogEntry;
use crate::domain::query::Query;
use crate::pricing::catalog::Catalog;

/// Tunable scoring constants. The defaults reproduce the historical behaviour;
/// none of them has been validated against real match quality.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolverSettings {
    pub exact_score: u8,
    pub query_contains_key_score: u8,
    pub key_contains_query_score: u8,
    pub word_overlap_score: u8,
    /// Query words shorter than this are ignored by the overlap tier.
    pub min_word_len: usize,
    pub confidence_floor: u8,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            exact_score: 100,
            query_contains_key_score: 80,
            key_contains_query_score: 70,
            word_overlap_score: 60,
            min_word_len: 3,
            confidence_floor: 20,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchSource {
    Catalog,
    CategoryDefault,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResolutionResult {
    /// Catalog key of the hit, or the sanitized query text for a default.
    pub matched_key: String,
    pub score: u8,
    pub entry: CatalogEntry,
    pub source: MatchSource,
}

impl ResolutionResult {
    pub fn is_catalog_hit(&self) -> bool {
        self.source == MatchSource::Catalog
    }
}

/// A catalog entry paired with its score for the current query.
#[derive(Clone, Copy, Debug)]
pub struct ScoredCandidate<'a> {
    pub entry: &'a CatalogEntry,
    pub score: u8,
}

impl ScoredCandidate<'_> {
    /// Higher score first, then longer key, then lexicographically smaller key.
    fn rank(&self, other: &Self) -> Ordering {
        let key = self.entry.key.as_str();
        let other_key = other.entry.key.as_str();

        self.score
            .cmp(&other.score)
            .then_with(|| key.len().cmp(&other_key.len()))
            .then_with(|| other_key.cmp(key))
    }
}

pub trait PriceResolver: Send + Sync {
    fn resolve(&self, query: &Query) -> ResolutionResult;
}

#[derive(Clone, Debug)]
pub struct FuzzyResolver {
    catalog: Arc<Catalog>,
    settings: ResolverSettings,
}

impl FuzzyResolver {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self::with_settings(catalog, ResolverSettings::default())
    }

    pub fn with_settings(catalog: Arc<Catalog>, settings: ResolverSettings) -> Self {
        Self { catalog, settings }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn settings(&self) -> &ResolverSettings {
        &self.settings
    }

    /// Best-ranked candidate over the whole catalog, if the catalog has entries.
    pub fn best_candidate(&self, query_text: &str) -> Option<ScoredCandidate<'_>> {
        let query_lower = query_text.trim().to_lowercase();

        self.catalog
            .entries()
            .iter()
            .map(|entry| ScoredCandidate {
                entry,
                score: score_key(&query_lower, &entry.key.as_str().to_lowercase(), &self.settings),
            })
            .max_by(|left, right| left.rank(right))
    }
}

impl PriceResolver for FuzzyResolver {
    fn resolve(&self, query: &Query) -> ResolutionResult {
        let best = self.best_candidate(query.text());
        let best_score = best.map(|candidate| candidate.score).unwrap_or(0);

        let result = match best {
            Some(candidate) if candidate.score >= self.settings.confidence_floor => {
                ResolutionResult {
                    matched_key: candidate.entry.key.0.clone(),
                    score: candidate.score,
                    entry: candidate.entry.clone(),
                    source: MatchSource::Catalog,
                }
            }
            _ => ResolutionResult {
                matched_key: query.text().to_string(),
                score: best_score,
                entry: self.catalog.category_default(query.category_hint()).clone(),
                source: MatchSource::CategoryDefault,
            },
        };

        debug!(
            event_name = "pricing.resolver.decision",
            query = query.text(),
            category_hint = query.category_hint().unwrap_or("none"),
            matched_key = %result.matched_key,
            score = result.score,
            source = ?result.source,
            "resolved product query"
        );

        result
    }
}

/// Scores one lowercase query against one lowercase catalog key.
pub fn score_key(query_lower: &str, key_lower: &str, settings: &ResolverSettings) -> u8 {
    if query_lower == key_lower {
        return settings.exact_score;
    }
    if query_lower.contains(key_lower) {
        return settings.query_contains_key_score;
    }
    if key_lower.contains(query_lower) {
        return settings.key_contains_query_score;
    }

    word_overlap_score(query_lower, key_lower, settings)
}

fn word_overlap_score(query_lower: &str, key_lower: &str, settings: &ResolverSettings) -> u8 {
    let key_words: Vec<&str> = key_lower.split_whitespace().collect();
    let query_words: Vec<&str> = query_lower
        .split_whitespace()
        .filter(|word| word.chars().count() >= settings.min_word_len)
        .collect();

    let matching = query_words
        .iter()
        .filter(|query_word| {
            key_words
                .iter()
                .any(|key_word| key_word.contains(**query_word) || query_word.contains(key_word))
        })
        .count();

    let denominator = query_words.len().max(1);
    let score = matching * usize::from(settings.word_overlap_score) / denominator;
    u8::try_from(score).unwrap_or(u8::MAX)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{score_key, FuzzyResolver, MatchSource, PriceResolver, ResolverSettings};
    use crate::domain::product::{CatalogEntry, CatalogKey};
    use crate::domain::query::Query;
    use crate::pricing::catalog::{Catalog, CategoryDefault};

    fn entry(key: &str, reference_price: i64) -> CatalogEntry {
        CatalogEntry {
            key: CatalogKey(key.to_string()),
            reference_price,
            variation: 0.08,
            image_url: format!("https://example.test/{}.png", key.replace(' ', "-")),
            brand: None,
        }
    }

    fn resolver(keys: &[&str]) -> FuzzyResolver {
        let catalog = Catalog::new(
            keys.iter().map(|key| entry(key, 10_000)).collect(),
            vec![
                CategoryDefault { pattern: "vehicle".to_string(), entry: entry("vehicle", 550_000) },
                CategoryDefault { pattern: "shoe".to_string(), entry: entry("footwear", 3_500) },
            ],
            entry("product", 5_000),
        )
        .expect("fixture catalog is valid");
        FuzzyResolver::new(Arc::new(catalog))
    }

    fn query(text: &str, hint: Option<&str>) -> Query {
        Query::new(text, hint).expect("valid query")
    }

    #[test]
    fn resolution_is_deterministic() {
        let resolver = resolver(&["nike air max", "nike air max 90", "adidas ultraboost"]);
        let q = query("nike air max 90 shoes", Some("shoes"));

        let first = resolver.resolve(&q);
        let second = resolver.resolve(&q);

        assert_eq!(first.matched_key, second.matched_key);
        assert_eq!(first.score, second.score);
    }

    #[test]
    fn exact_match_scores_100_over_other_substring_hits() {
        let resolver = resolver(&["iphone 16", "iphone 16 pro", "iphone 16 pro max"]);

        let result = resolver.resolve(&query("iPhone 16 Pro", None));

        assert_eq!(result.score, 100);
        assert_eq!(result.matched_key, "iphone 16 pro");
        assert_eq!(result.source, MatchSource::Catalog);
    }

    #[test]
    fn containment_tie_prefers_longer_key() {
        let resolver = resolver(&["nike air max", "nike air max 90"]);

        let result = resolver.resolve(&query("nike air max 90 shoes", None));

        assert_eq!(result.score, 80);
        assert_eq!(result.matched_key, "nike air max 90");
    }

    #[test]
    fn tie_break_ignores_definition_order() {
        let forward = resolver(&["oneplus 12", "pixel 12"]);
        let reverse = resolver(&["pixel 12", "oneplus 12"]);
        let q = query("12", None);

        assert_eq!(forward.resolve(&q).matched_key, reverse.resolve(&q).matched_key);
    }

    #[test]
    fn equal_length_tie_takes_lexicographically_smallest_key() {
        let resolver = resolver(&["zeta phone", "alfa phone"]);

        let result = resolver.resolve(&query("phone", None));

        assert_eq!(result.score, 70);
        assert_eq!(result.matched_key, "alfa phone");
    }

    #[test]
    fn nonsense_query_falls_back_to_category_default() {
        let resolver = resolver(&["royal enfield classic 350", "nike air max"]);

        let result = resolver.resolve(&query("qwxz plorp", Some("Vehicles")));

        assert_eq!(result.score, 0);
        assert_eq!(result.source, MatchSource::CategoryDefault);
        assert_eq!(result.matched_key, "qwxz plorp");
        assert_eq!(result.entry.key.as_str(), "vehicle");
    }

    #[test]
    fn unknown_category_falls_back_to_generic_default() {
        let resolver = resolver(&["nike air max"]);

        let result = resolver.resolve(&query("qwxz", Some("toys")));

        assert_eq!(result.entry.key.as_str(), "product");
    }

    #[test]
    fn word_overlap_scores_proportionally() {
        let resolver = resolver(&["royal enfield classic 350"]);

        let result = resolver.resolve(&query("enfield classic bike", Some("vehicles")));

        assert_eq!(result.score, 40);
        assert_eq!(result.matched_key, "royal enfield classic 350");
        assert!(result.is_catalog_hit());
    }

    #[test]
    fn short_query_words_do_not_count() {
        let settings = ResolverSettings::default();

        assert_eq!(score_key("an of to", "royal enfield classic 350", &settings), 0);
        assert_eq!(score_key("the enfield", "royal enfield classic 350", &settings), 30);
    }

    #[test]
    fn word_overlap_is_bidirectional_per_word() {
        let settings = ResolverSettings::default();

        // "classics" contains key word "classic"; "enf" is contained in "enfield".
        assert_eq!(score_key("classics enf", "royal enfield classic 350", &settings), 60);
    }

    #[test]
    fn sanitized_query_matches_case_insensitively() {
        let resolver = resolver(&["iphone 16 pro"]);

        let result = resolver.resolve(&query("iPhone <16> Pro", None));

        assert!(result.score >= 70);
        assert_eq!(result.matched_key, "iphone 16 pro");
    }

    #[test]
    fn score_below_floor_uses_default_but_keeps_score() {
        let resolver = resolver(&["royal enfield classic 350"]);

        // one of four qualifying words overlaps: 60 / 4 = 15
        let result = resolver.resolve(&query("enfield bullet cruiser motorbike", None));

        assert_eq!(result.score, 15);
        assert_eq!(result.source, MatchSource::CategoryDefault);
    }

    #[test]
    fn custom_floor_is_honoured() {
        let catalog = resolver(&["royal enfield classic 350"]).catalog().clone();
        let strict = FuzzyResolver::with_settings(
            Arc::new(catalog),
            ResolverSettings { confidence_floor: 50, ..ResolverSettings::default() },
        );

        let result = strict.resolve(&query("enfield classic bike", None));

        assert_eq!(result.score, 40);
        assert_eq!(result.source, MatchSource::CategoryDefault);
    }

    #[test]
    fn embedded_catalog_resolves_known_products() {
        let catalog = Catalog::embedded().expect("embedded catalog");
        let resolver = FuzzyResolver::new(Arc::new(catalog));

        let bike = resolver.resolve(&query("enfield classic bike", Some("vehicles")));
        assert_eq!(bike.matched_key, "royal enfield classic 350");

        let phone = resolver.resolve(&query("Apple iPhone 16 Pro 256GB", Some("electronics")));
        assert_eq!(phone.matched_key, "iphone 16 pro");
        assert_eq!(phone.score, 80);
    }
}
