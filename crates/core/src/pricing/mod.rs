pub mod catalog;
pub mod currency;
pub mod record;
pub mod resolver;
pub mod synthesis;

use std::sync::Arc;

use chrono::NaiveDate;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::domain::query::Query;

use self::{
    catalog::Catalog,
    currency::UsdConverter,
    record::{build_record, ProductPriceRecord},
    resolver::{FuzzyResolver, PriceResolver, ResolutionResult, ResolverSettings},
    synthesis::{PriceSeries, SeriesSynthesizer, SynthesisSettings},
};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub resolution: ResolutionResult,
    pub series: PriceSeries,
    pub record: ProductPriceRecord,
}

/// Resolve → synthesize → assemble, with the resolver behind a trait so
/// callers and tests can swap the matching strategy.
pub struct PricingRuntime<P = FuzzyResolver> {
    resolver: P,
    synthesizer: SeriesSynthesizer,
    converter: UsdConverter,
}

impl<P> PricingRuntime<P> {
    pub fn new(resolver: P, synthesizer: SeriesSynthesizer, converter: UsdConverter) -> Self {
        Self { resolver, synthesizer, converter }
    }

    pub fn resolver(&self) -> &P {
        &self.resolver
    }

    pub fn synthesizer(&self) -> &SeriesSynthesizer {
        &self.synthesizer
    }

    pub fn converter(&self) -> &UsdConverter {
        &self.converter
    }
}

impl PricingRuntime<FuzzyResolver> {
    pub fn from_catalog(
        catalog: Arc<Catalog>,
        resolver_settings: ResolverSettings,
        synthesis_settings: SynthesisSettings,
        converter: UsdConverter,
    ) -> Self {
        Self::new(
            FuzzyResolver::with_settings(catalog, resolver_settings),
            SeriesSynthesizer::new(synthesis_settings),
            converter,
        )
    }
}

impl<P: PriceResolver> PricingRuntime<P> {
    pub fn resolve(&self, query: &Query) -> ResolutionResult {
        self.resolver.resolve(query)
    }

    /// Full local pipeline with a locally synthesized series.
    pub fn quote<R: Rng>(&self, query: &Query, anchor: NaiveDate, rng: &mut R) -> PriceQuote {
        let resolution = self.resolver.resolve(query);
        let series = self.synthesizer.synthesize(&resolution.entry, anchor, rng);
        self.assemble(query, resolution, series)
    }

    /// Assembles a quote around an already produced series.
    pub fn assemble(
        &self,
        query: &Query,
        resolution: ResolutionResult,
        series: PriceSeries,
    ) -> PriceQuote {
        let record = build_record(query, &resolution, &series, &self.converter);
        PriceQuote { resolution, series, record }
    }
}
