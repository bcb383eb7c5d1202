//! Market data providers.
//!
//! `MarketDataProvider` is the only surface the scan core sees; the
//! `yahoo` client implements it over public REST endpoints, and the
//! `mock` provider scripts it for tests and dry runs.

pub mod mock;
mod traits;
mod types;
mod yahoo;

pub use mock::MockProvider;
pub use traits::MarketDataProvider;
pub use types::*;
pub use yahoo::{YahooClient, DEFAULT_BASE_URL};
