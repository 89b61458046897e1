//! CSV file data adapter.
//!
//! Reads a single CSV of signal-annotated bars with columns
//! `timestamp,symbol,open,high,low,close,volume,signal`, pre-sorted and
//! pre-cleaned by the upstream data pipeline. Timestamps accept either
//! `YYYY-MM-DD HH:MM:SS` or a bare `YYYY-MM-DD` for daily data.

use crate::domain::bar::{Signal, SignalBar};
use crate::domain::error::SignalsimError;
use crate::ports::data_port::DataPort;
use chrono::{NaiveDate, NaiveDateTime};
use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;

pub struct CsvDataAdapter {
    path: PathBuf,
}

impl CsvDataAdapter {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn read_all(&self) -> Result<Vec<SignalBar>, SignalsimError> {
        let content = fs::read_to_string(&self.path).map_err(|e| SignalsimError::Data {
            reason: format!("failed to read {}: {}", self.path.display(), e),
        })?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut bars = Vec::new();

        for (row, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| SignalsimError::Data {
                reason: format!("CSV parse error: {}", e),
            })?;
            let line = row + 2; // header is line 1

            let timestamp = parse_timestamp(field(&record, 0, "timestamp", line)?)
                .map_err(|reason| SignalsimError::Data { reason })?;
            let symbol = field(&record, 1, "symbol", line)?.to_string();
            let open = parse_f64(&record, 2, "open", line)?;
            let high = parse_f64(&record, 3, "high", line)?;
            let low = parse_f64(&record, 4, "low", line)?;
            let close = parse_f64(&record, 5, "close", line)?;
            let volume = parse_i64(&record, 6, "volume", line)?;
            let signal_value = parse_i64(&record, 7, "signal", line)?;

            let signal = Signal::from_int(signal_value).ok_or_else(|| SignalsimError::Data {
                reason: format!("line {line}: signal must be -1, 0 or 1, got {signal_value}"),
            })?;

            let bar = SignalBar {
                symbol,
                timestamp,
                open,
                high,
                low,
                close,
                volume,
                signal,
            };
            if !bar.is_well_formed() {
                log::warn!(
                    "skipping malformed bar for {} at {} (line {line})",
                    bar.symbol,
                    bar.timestamp
                );
                continue;
            }
            bars.push(bar);
        }

        Ok(bars)
    }
}

fn field<'r>(
    record: &'r csv::StringRecord,
    index: usize,
    name: &str,
    line: usize,
) -> Result<&'r str, SignalsimError> {
    record.get(index).ok_or_else(|| SignalsimError::Data {
        reason: format!("line {line}: missing {name} column"),
    })
}

fn parse_f64(
    record: &csv::StringRecord,
    index: usize,
    name: &str,
    line: usize,
) -> Result<f64, SignalsimError> {
    field(record, index, name, line)?
        .trim()
        .parse()
        .map_err(|e| SignalsimError::Data {
            reason: format!("line {line}: invalid {name} value: {e}"),
        })
}

fn parse_i64(
    record: &csv::StringRecord,
    index: usize,
    name: &str,
    line: usize,
) -> Result<i64, SignalsimError> {
    field(record, index, name, line)?
        .trim()
        .parse()
        .map_err(|e| SignalsimError::Data {
            reason: format!("line {line}: invalid {name} value: {e}"),
        })
}

fn parse_timestamp(raw: &str) -> Result<NaiveDateTime, String> {
    let raw = raw.trim();
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .map(|d| d.and_hms_opt(0, 0, 0).expect("midnight is valid"))
        })
        .map_err(|_| format!("invalid timestamp '{raw}'"))
}

impl DataPort for CsvDataAdapter {
    fn fetch_series(
        &self,
        symbol: &str,
        start: Option<NaiveDateTime>,
        end: Option<NaiveDateTime>,
    ) -> Result<Vec<SignalBar>, SignalsimError> {
        let mut bars: Vec<SignalBar> = self
            .read_all()?
            .into_iter()
            .filter(|b| b.symbol == symbol)
            .filter(|b| start.is_none_or(|s| b.timestamp >= s))
            .filter(|b| end.is_none_or(|e| b.timestamp <= e))
            .collect();
        if bars.is_empty() {
            return Err(SignalsimError::NoData {
                symbol: symbol.to_string(),
            });
        }
        bars.sort_by_key(|b| b.timestamp);
        Ok(bars)
    }

    fn list_symbols(&self) -> Result<Vec<String>, SignalsimError> {
        let symbols: BTreeSet<String> = self
            .read_all()?
            .into_iter()
            .map(|b| b.symbol)
            .collect();
        Ok(symbols.into_iter().collect())
    }

    fn data_range(
        &self,
        symbol: &str,
    ) -> Result<Option<(NaiveDateTime, NaiveDateTime, usize)>, SignalsimError> {
        let bars: Vec<SignalBar> = self
            .read_all()?
            .into_iter()
            .filter(|b| b.symbol == symbol)
            .collect();
        let first = bars.iter().map(|b| b.timestamp).min();
        let last = bars.iter().map(|b| b.timestamp).max();
        match (first, last) {
            (Some(first), Some(last)) => Ok(Some((first, last, bars.len()))),
            _ => Ok(None),
        }
    }
}
