//! # Earnings Vol Scanner
//!
//! A Rust scanner for earnings volatility-crush candidates: tickers whose
//! options price in more movement than the stock historically delivers
//! around its report.
//!
//! ## Architecture
//!
//! - `config`: Configuration management and validation
//! - `provider`: Market data providers (Yahoo chart/options feed + mock)
//! - `filter`: Per-criterion evaluation, pipeline, and tier classification
//! - `ironfly`: Iron-fly structure pricing from the option chain
//! - `scan`: Batch orchestration, retries, and the earnings universe
//! - `export`: CSV/JSON export and terminal rendering

pub mod config;
pub mod error;
pub mod export;
pub mod filter;
pub mod ironfly;
pub mod provider;
pub mod scan;

pub use config::Config;
pub use error::ScanError;
