#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime};
use signalsim::domain::bar::{Signal, SignalBar};
use signalsim::domain::config::{
    EquityParams, FuturesParams, OptionsParams, SimulationConfig, Variant,
};
use signalsim::domain::error::SignalsimError;
use signalsim::domain::series::{SymbolSeries, group_by_symbol};
use signalsim::ports::data_port::DataPort;
use std::collections::HashMap;

pub fn date(year: i32, month: u32, day: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(year, month, day)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

pub fn time(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(year, month, day)
        .unwrap()
        .and_hms_opt(hour, minute, 0)
        .unwrap()
}

pub fn make_bar(symbol: &str, ts: NaiveDateTime, close: f64, signal: i64) -> SignalBar {
    SignalBar {
        symbol: symbol.to_string(),
        timestamp: ts,
        open: close,
        high: close,
        low: close,
        close,
        volume: 10_000,
        signal: Signal::from_int(signal).unwrap(),
    }
}

pub fn make_ohlc_bar(
    symbol: &str,
    ts: NaiveDateTime,
    (open, high, low, close): (f64, f64, f64, f64),
    signal: i64,
) -> SignalBar {
    SignalBar {
        symbol: symbol.to_string(),
        timestamp: ts,
        open,
        high,
        low,
        close,
        volume: 10_000,
        signal: Signal::from_int(signal).unwrap(),
    }
}

/// `closes[i].1 != 0` attaches a signal to that day's bar.
pub fn daily_series(symbol: &str, start_day: u32, closes: &[(f64, i64)]) -> SymbolSeries {
    let bars = closes
        .iter()
        .enumerate()
        .map(|(i, &(close, signal))| {
            make_bar(symbol, date(2024, 1, start_day + i as u32), close, signal)
        })
        .collect();
    SymbolSeries::new(symbol.to_string(), bars)
}

pub fn equity_config(initial_capital: f64) -> SimulationConfig {
    SimulationConfig {
        initial_capital,
        transaction_cost_pct: 0.001,
        variant: Variant::Equity(EquityParams::default()),
    }
}

pub fn costless_equity_config(initial_capital: f64) -> SimulationConfig {
    SimulationConfig {
        initial_capital,
        transaction_cost_pct: 0.0,
        variant: Variant::Equity(EquityParams::default()),
    }
}

pub fn options_config(initial_capital: f64) -> SimulationConfig {
    SimulationConfig {
        initial_capital,
        transaction_cost_pct: 0.0,
        variant: Variant::OptionsProxy(OptionsParams::default()),
    }
}

pub fn futures_config(initial_capital: f64) -> SimulationConfig {
    SimulationConfig {
        initial_capital,
        transaction_cost_pct: 0.0,
        variant: Variant::Futures(FuturesParams::default()),
    }
}

pub struct MockDataPort {
    pub data: HashMap<String, Vec<SignalBar>>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, symbol: &str, bars: Vec<SignalBar>) -> Self {
        self.data.insert(symbol.to_string(), bars);
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        // Listed, but every fetch fails.
        self.data.entry(symbol.to_string()).or_default();
        self
    }
}

impl DataPort for MockDataPort {
    fn fetch_series(
        &self,
        symbol: &str,
        _start: Option<NaiveDateTime>,
        _end: Option<NaiveDateTime>,
    ) -> Result<Vec<SignalBar>, SignalsimError> {
        if let Some(reason) = self.errors.get(symbol) {
            return Err(SignalsimError::Data {
                reason: reason.clone(),
            });
        }
        match self.data.get(symbol) {
            Some(bars) if !bars.is_empty() => Ok(bars.clone()),
            _ => Err(SignalsimError::NoData {
                symbol: symbol.to_string(),
            }),
        }
    }

    fn list_symbols(&self) -> Result<Vec<String>, SignalsimError> {
        let mut symbols: Vec<String> = self.data.keys().cloned().collect();
        symbols.sort();
        Ok(symbols)
    }

    fn data_range(
        &self,
        symbol: &str,
    ) -> Result<Option<(NaiveDateTime, NaiveDateTime, usize)>, SignalsimError> {
        Ok(self.data.get(symbol).and_then(|bars| {
            let first = bars.iter().map(|b| b.timestamp).min()?;
            let last = bars.iter().map(|b| b.timestamp).max()?;
            Some((first, last, bars.len()))
        }))
    }
}

/// Wrap an ad-hoc bar list for one symbol into a series.
pub fn series_from_bars(bars: Vec<SignalBar>) -> SymbolSeries {
    let symbol = bars[0].symbol.clone();
    SymbolSeries::new(symbol, bars)
}

/// Flatten per-symbol fixtures into engine-ready series.
pub fn series_from(port: &MockDataPort) -> Vec<SymbolSeries> {
    let mut bars = Vec::new();
    for symbol in port.list_symbols().unwrap() {
        if let Ok(mut symbol_bars) = port.fetch_series(&symbol, None, None) {
            bars.append(&mut symbol_bars);
        }
    }
    group_by_symbol(bars)
}
