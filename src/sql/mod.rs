//! SQL generation from the resolved model. Identifiers come from the catalog only; values
//! are always bound parameters.

mod builder;
pub mod params;

pub use builder::*;
pub use params::PgBindValue;
