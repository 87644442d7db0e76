//! Input/output helpers.
//!
//! - daily CSV ingest + row validation (`ingest`)
//! - metrics, dataset and text exports (`export`)
//! - saved model JSON read/write (`model_file`)
//! - run configuration JSON (`config_file`)

pub mod config_file;
pub mod export;
pub mod ingest;
pub mod model_file;

pub use config_file::*;
pub use export::*;
pub use ingest::*;
pub use model_file::*;
