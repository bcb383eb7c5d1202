//! Error taxonomy for the scanner.
//!
//! Only `Config` and `MalformedInput` abort a run. `DataUnavailable` is
//! recovered per ticker (tier=Error) and `StrikeUnavailable` is recovered
//! locally by omitting the iron-fly plan.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScanError {
    /// Malformed or missing threshold/concurrency settings. Fatal at startup.
    #[error("configuration error: {0}")]
    Config(String),

    /// Market data could not be retrieved for a ticker.
    #[error("market data unavailable for {ticker}: {reason}")]
    DataUnavailable { ticker: String, reason: String },

    /// Invalid date or ticker argument. Surfaced as a usage error.
    #[error("invalid input: {0}")]
    MalformedInput(String),

    /// The options chain lacks strikes spanning the required wing width.
    #[error("no usable strikes for {ticker}: {detail}")]
    StrikeUnavailable { ticker: String, detail: String },
}

impl ScanError {
    /// Whether this error aborts the whole run (vs. being reported inline).
    pub fn is_fatal(&self) -> bool {
        matches!(self, ScanError::Config(_) | ScanError::MalformedInput(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatality_split() {
        assert!(ScanError::Config("x".into()).is_fatal());
        assert!(ScanError::MalformedInput("x".into()).is_fatal());
        assert!(!ScanError::DataUnavailable {
            ticker: "AAPL".into(),
            reason: "timeout".into()
        }
        .is_fatal());
        assert!(!ScanError::StrikeUnavailable {
            ticker: "AAPL".into(),
            detail: "no wings".into()
        }
        .is_fatal());
    }
}
