//! Per-symbol bar series and the unified simulation timeline.

use crate::domain::bar::SignalBar;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// All bars for one symbol, sorted by timestamp, with a timestamp index
/// for O(1) lookup during the simulation walk.
#[derive(Debug, Clone)]
pub struct SymbolSeries {
    pub symbol: String,
    pub bars: Vec<SignalBar>,
    time_index: HashMap<NaiveDateTime, usize>,
}

impl SymbolSeries {
    pub fn new(symbol: String, mut bars: Vec<SignalBar>) -> Self {
        bars.sort_by_key(|b| b.timestamp);
        let time_index = bars
            .iter()
            .enumerate()
            .map(|(i, bar)| (bar.timestamp, i))
            .collect();
        Self {
            symbol,
            bars,
            time_index,
        }
    }

    pub fn bar_count(&self) -> usize {
        self.bars.len()
    }

    pub fn bar_at(&self, timestamp: NaiveDateTime) -> Option<&SignalBar> {
        self.time_index.get(&timestamp).map(|&i| &self.bars[i])
    }

    pub fn bar_index(&self, timestamp: NaiveDateTime) -> Option<usize> {
        self.time_index.get(&timestamp).copied()
    }

    /// Aggregate high/low per calendar day, used for previous-day level
    /// references in intraday rule sets.
    pub fn daily_levels(&self) -> BTreeMap<NaiveDate, (f64, f64)> {
        let mut levels: BTreeMap<NaiveDate, (f64, f64)> = BTreeMap::new();
        for bar in &self.bars {
            let day = bar.timestamp.date();
            levels
                .entry(day)
                .and_modify(|(high, low)| {
                    *high = high.max(bar.high);
                    *low = low.min(bar.low);
                })
                .or_insert((bar.high, bar.low));
        }
        levels
    }

    /// Open-to-close percentage change over a time window within one day.
    /// Returns None when the window holds no bars.
    pub fn window_change_pct(
        &self,
        date: NaiveDate,
        start: NaiveTime,
        end: NaiveTime,
    ) -> Option<f64> {
        let in_window: Vec<&SignalBar> = self
            .bars
            .iter()
            .filter(|b| {
                b.timestamp.date() == date
                    && b.timestamp.time() >= start
                    && b.timestamp.time() <= end
            })
            .collect();
        let first = in_window.first()?;
        let last = in_window.last()?;
        Some((last.close - first.open) / first.open * 100.0)
    }
}

/// Merge the timestamps of every series into one sorted, de-duplicated
/// timeline the engine walks.
pub fn build_unified_timeline(series: &[SymbolSeries]) -> Vec<NaiveDateTime> {
    let unique: BTreeSet<NaiveDateTime> = series
        .iter()
        .flat_map(|s| s.bars.iter().map(|b| b.timestamp))
        .collect();
    unique.into_iter().collect()
}

/// Split a flat (timestamp, symbol)-keyed bar stream into per-symbol series.
pub fn group_by_symbol(bars: Vec<SignalBar>) -> Vec<SymbolSeries> {
    let mut grouped: BTreeMap<String, Vec<SignalBar>> = BTreeMap::new();
    for bar in bars {
        grouped.entry(bar.symbol.clone()).or_default().push(bar);
    }
    grouped
        .into_iter()
        .map(|(symbol, bars)| SymbolSeries::new(symbol, bars))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::bar::Signal;

    fn make_bar(symbol: &str, ts: &str, close: f64) -> SignalBar {
        let timestamp = NaiveDateTime::parse_from_str(ts, "%Y-%m-%d %H:%M:%S")
            .or_else(|_| {
                NaiveDate::parse_from_str(ts, "%Y-%m-%d")
                    .map(|d| d.and_hms_opt(0, 0, 0).unwrap())
            })
            .unwrap();
        SignalBar {
            symbol: symbol.to_string(),
            timestamp,
            open: close,
            high: close + 5.0,
            low: close - 5.0,
            close,
            volume: 1_000,
            signal: Signal::Neutral,
        }
    }

    #[test]
    fn series_sorts_and_indexes() {
        let series = SymbolSeries::new(
            "TCS".into(),
            vec![
                make_bar("TCS", "2024-01-03", 102.0),
                make_bar("TCS", "2024-01-01", 100.0),
                make_bar("TCS", "2024-01-02", 101.0),
            ],
        );

        assert_eq!(series.bar_count(), 3);
        assert_eq!(series.bars[0].close, 100.0);
        assert_eq!(series.bars[2].close, 102.0);

        let ts = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(series.bar_at(ts).unwrap().close, 101.0);
        assert_eq!(series.bar_index(ts), Some(1));
    }

    #[test]
    fn bar_at_missing_timestamp() {
        let series = SymbolSeries::new("TCS".into(), vec![make_bar("TCS", "2024-01-01", 100.0)]);
        let ts = NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert!(series.bar_at(ts).is_none());
    }

    #[test]
    fn unified_timeline_merges_and_dedupes() {
        let a = SymbolSeries::new(
            "A".into(),
            vec![
                make_bar("A", "2024-01-01", 100.0),
                make_bar("A", "2024-01-02", 101.0),
            ],
        );
        let b = SymbolSeries::new(
            "B".into(),
            vec![
                make_bar("B", "2024-01-02", 50.0),
                make_bar("B", "2024-01-03", 51.0),
            ],
        );

        let timeline = build_unified_timeline(&[a, b]);
        assert_eq!(timeline.len(), 3);
        assert!(timeline.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn group_by_symbol_splits_stream() {
        let bars = vec![
            make_bar("B", "2024-01-01", 50.0),
            make_bar("A", "2024-01-01", 100.0),
            make_bar("A", "2024-01-02", 101.0),
        ];
        let series = group_by_symbol(bars);

        assert_eq!(series.len(), 2);
        assert_eq!(series[0].symbol, "A");
        assert_eq!(series[0].bar_count(), 2);
        assert_eq!(series[1].symbol, "B");
        assert_eq!(series[1].bar_count(), 1);
    }

    #[test]
    fn daily_levels_aggregates_intraday_bars() {
        let series = SymbolSeries::new(
            "NIFTY".into(),
            vec![
                make_bar("NIFTY", "2024-01-01 09:15:00", 100.0),
                make_bar("NIFTY", "2024-01-01 10:15:00", 110.0),
                make_bar("NIFTY", "2024-01-02 09:15:00", 90.0),
            ],
        );

        let levels = series.daily_levels();
        let day1 = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let day2 = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        assert_eq!(levels[&day1], (115.0, 95.0));
        assert_eq!(levels[&day2], (95.0, 85.0));
    }

    #[test]
    fn window_change_pct_uses_first_open_last_close() {
        let series = SymbolSeries::new(
            "NIFTY".into(),
            vec![
                make_bar("NIFTY", "2024-01-01 09:15:00", 100.0),
                make_bar("NIFTY", "2024-01-01 10:30:00", 101.0),
                make_bar("NIFTY", "2024-01-01 14:00:00", 250.0),
            ],
        );

        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let start = NaiveTime::from_hms_opt(9, 15, 0).unwrap();
        let end = NaiveTime::from_hms_opt(10, 30, 0).unwrap();

        // (101 - 100) / 100 * 100 = 1%
        let change = series.window_change_pct(date, start, end).unwrap();
        assert!((change - 1.0).abs() < 1e-9);
    }

    #[test]
    fn window_change_pct_empty_window() {
        let series = SymbolSeries::new(
            "NIFTY".into(),
            vec![make_bar("NIFTY", "2024-01-01 14:00:00", 100.0)],
        );

        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let start = NaiveTime::from_hms_opt(9, 15, 0).unwrap();
        let end = NaiveTime::from_hms_opt(10, 30, 0).unwrap();
        assert!(series.window_change_pct(date, start, end).is_none());
    }
}
