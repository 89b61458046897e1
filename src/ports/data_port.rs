//! Data access port trait.

use crate::domain::bar::SignalBar;
use crate::domain::error::SignalsimError;
use chrono::NaiveDateTime;

pub trait DataPort {
    /// Fetch the signal-annotated bar series for one symbol, optionally
    /// clipped to a time range.
    fn fetch_series(
        &self,
        symbol: &str,
        start: Option<NaiveDateTime>,
        end: Option<NaiveDateTime>,
    ) -> Result<Vec<SignalBar>, SignalsimError>;

    fn list_symbols(&self) -> Result<Vec<String>, SignalsimError>;

    /// First timestamp, last timestamp and bar count for a symbol, or None
    /// when the symbol is absent.
    fn data_range(
        &self,
        symbol: &str,
    ) -> Result<Option<(NaiveDateTime, NaiveDateTime, usize)>, SignalsimError>;
}
