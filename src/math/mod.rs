//! Mathematical utilities: least squares, robust estimators, trend basis.

pub mod basis;
pub mod ols;
pub mod robust;

pub use basis::*;
pub use ols::*;
pub use robust::*;
