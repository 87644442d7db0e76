//! Data acquisition and aggregation.
//!
//! - `open_meteo`: historical archive over HTTP, one request per location
//! - `synthetic`: seeded offline generator
//! - `aggregate`: national averaging, cleaning and the yearly rollup
//!
//! Local CSV ingest lives in `io::ingest`.

pub mod aggregate;
pub mod open_meteo;
pub mod synthetic;

pub use aggregate::*;
pub use open_meteo::*;
pub use synthetic::*;
