//! `wx-outlook` library crate.
//!
//! The binary (`wx`) is a thin wrapper around this library so that:
//!
//! - the forecasting core is testable without spawning processes
//! - strategies, backtesting and reporting can be reused on their own
//! - the network client stays at the edge, behind `data::open_meteo`

pub mod app;
pub mod backtest;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod io;
pub mod math;
pub mod models;
pub mod report;
