//! Price bar and signal representation.

use chrono::NaiveDateTime;

/// Directional signal attached to a bar. Produced by an external signal
/// generator; the simulation only reacts to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// Enter long / bullish (+1).
    Bullish,
    /// Enter short / bearish, or exit long (-1).
    Bearish,
    /// No action (0).
    Neutral,
}

impl Signal {
    pub fn from_int(value: i64) -> Option<Signal> {
        match value {
            1 => Some(Signal::Bullish),
            -1 => Some(Signal::Bearish),
            0 => Some(Signal::Neutral),
            _ => None,
        }
    }

    pub fn as_int(&self) -> i64 {
        match self {
            Signal::Bullish => 1,
            Signal::Bearish => -1,
            Signal::Neutral => 0,
        }
    }

    pub fn is_active(&self) -> bool {
        !matches!(self, Signal::Neutral)
    }
}

/// One OHLCV bar for one symbol at one timestamp, annotated with the
/// externally produced signal.
#[derive(Debug, Clone)]
pub struct SignalBar {
    pub symbol: String,
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
    pub signal: Signal,
}

impl SignalBar {
    /// low <= open, close <= high; all prices positive; volume non-negative.
    pub fn is_well_formed(&self) -> bool {
        self.low > 0.0
            && self.low <= self.open
            && self.low <= self.close
            && self.open <= self.high
            && self.close <= self.high
            && self.volume >= 0
    }
}
