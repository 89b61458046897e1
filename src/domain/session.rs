//! Per-day session state for intraday rule sets.

use chrono::{NaiveDate, NaiveTime};
use std::collections::HashMap;

use super::series::SymbolSeries;

/// Directional conviction for the trading day, derived from the morning
/// window's open-to-close move. Selects the risk fraction for sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bias {
    Bullish,
    Bearish,
    Neutral,
}

impl Bias {
    pub fn is_directional(&self) -> bool {
        !matches!(self, Bias::Neutral)
    }
}

/// An intraday time window during which entries are permitted. Exits are
/// always allowed, window or not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TradingWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TradingWindow {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        TradingWindow { start, end }
    }

    pub fn contains(&self, time: NaiveTime) -> bool {
        time >= self.start && time <= self.end
    }
}

/// Previous-day references and bias for one symbol.
#[derive(Debug, Clone, Copy)]
pub struct DayRefs {
    pub bias: Bias,
    pub prev_day_high: Option<f64>,
    pub prev_day_low: Option<f64>,
}

/// State the engine rolls at every day boundary and threads through the
/// entry/exit phases. Mutated only inside the engine's controlled phases.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub date: NaiveDate,
    /// Losing trades closed so far today; entries stop once the daily cap
    /// is reached and the counter resets at the next day boundary.
    pub losses: u32,
    refs: HashMap<String, DayRefs>,
}

impl SessionState {
    pub fn new(date: NaiveDate) -> Self {
        SessionState {
            date,
            losses: 0,
            refs: HashMap::new(),
        }
    }

    pub fn record_loss(&mut self) {
        self.losses += 1;
    }

    pub fn set_refs(&mut self, symbol: &str, refs: DayRefs) {
        self.refs.insert(symbol.to_string(), refs);
    }

    pub fn refs(&self, symbol: &str) -> Option<&DayRefs> {
        self.refs.get(symbol)
    }

    pub fn bias(&self, symbol: &str) -> Bias {
        self.refs
            .get(symbol)
            .map(|r| r.bias)
            .unwrap_or(Bias::Neutral)
    }
}

/// Classify the day from the morning window's percentage move. Returns
/// Neutral when the window has no bars yet.
pub fn determine_bias(
    series: &SymbolSeries,
    date: NaiveDate,
    window: &TradingWindow,
    threshold_pct: f64,
) -> Bias {
    match series.window_change_pct(date, window.start, window.end) {
        Some(change) if change > threshold_pct => Bias::Bullish,
        Some(change) if change < -threshold_pct => Bias::Bearish,
        Some(_) => Bias::Neutral,
        None => Bias::Neutral,
    }
}
