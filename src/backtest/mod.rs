//! Expanding-window validation and ensemble weight selection.
//!
//! Responsibilities:
//!
//! - hold out each test year, train on strictly earlier rows, score the prediction
//! - summarize a run as mean absolute error
//! - turn the two strategies' errors into blending weights

pub mod runner;
pub mod weights;

pub use runner::*;
pub use weights::*;
