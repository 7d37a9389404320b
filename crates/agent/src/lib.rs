//! Generative pricing backend.
//!
//! The gateway is only ever a source of candidate numbers and product
//! identifications. Prices it returns are clamped into the resolved catalog
//! band by the core synthesizer before anything reaches a caller.

pub mod extract;
pub mod gateway;
pub mod oracle;

pub use gateway::GatewayOracle;
pub use oracle::{
    Identification, OracleError, OracleQuote, OracleRequest, OracleSpecifications, PricingOracle,
};
