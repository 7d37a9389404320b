pub mod config;
pub mod domain;
pub mod errors;
pub mod pricing;

pub use domain::product::{CatalogEntry, CatalogKey, PriceBand};
pub use domain::query::{Query, QueryError};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use pricing::catalog::{Catalog, CatalogError};
pub use pricing::currency::UsdConverter;
pub use pricing::record::{ProductPriceRecord, RecordPricePoint};
pub use pricing::resolver::{
    FuzzyResolver, MatchSource, PriceResolver, ResolutionResult, ResolverSettings,
};
pub use pricing::synthesis::{PricePoint, PriceSeries, SeriesSynthesizer, SynthesisSettings, Trend};
pub use pricing::{PriceQuote, PricingRuntime};
