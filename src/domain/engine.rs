//! Simulation engine: drives the bar-by-bar replay.
//!
//! Fixed per-step order: roll the day session, evaluate protective exits,
//! process discretionary sell-signal exits, attempt entries, record the
//! valuation. After the final bar every remaining position is force-closed.

use chrono::{NaiveDate, NaiveDateTime};
use std::collections::{BTreeMap, HashMap};

use super::bar::{Signal, SignalBar};
use super::config::{FuturesParams, SimulationConfig, Variant};
use super::exit_rules::{self, ExitRules};
use super::ledger::{EntryOrder, Ledger, Sizing};
use super::position::{Direction, ExitReason, Funding, Payoff};
use super::series::{SymbolSeries, build_unified_timeline};
use super::session::{DayRefs, SessionState, determine_bias};

/// Everything a completed run hands to the metrics and reporting layers.
#[derive(Debug, Clone)]
pub struct BacktestResult {
    pub ledger: Ledger,
    pub initial_capital: f64,
    pub final_capital: f64,
    /// Symbols that could not be force-closed for lack of a final price.
    pub unclosed_symbols: Vec<String>,
}

pub fn run_backtest(series: &[SymbolSeries], config: &SimulationConfig) -> BacktestResult {
    Engine::new(series, config).run()
}

struct Engine<'a> {
    series: &'a [SymbolSeries],
    config: &'a SimulationConfig,
    ledger: Ledger,
    rules: ExitRules,
    session: Option<SessionState>,
    daily_levels: HashMap<String, BTreeMap<NaiveDate, (f64, f64)>>,
}

impl<'a> Engine<'a> {
    fn new(series: &'a [SymbolSeries], config: &'a SimulationConfig) -> Self {
        let ledger = Ledger::new(
            config.initial_capital,
            config.max_positions(),
            config.min_trade_value(),
            config.transaction_cost_pct,
        );
        let rules = match &config.variant {
            Variant::Equity(_) => ExitRules::equity(),
            Variant::OptionsProxy(p) => ExitRules::options_proxy(
                p.profit_target_pct,
                p.stop_loss_pct,
                p.expiry_days - p.exit_days_before_expiry,
            ),
            Variant::Futures(p) => ExitRules::futures(p.time_exit_hours),
        };
        let daily_levels = match &config.variant {
            Variant::Futures(_) => series
                .iter()
                .map(|s| (s.symbol.clone(), s.daily_levels()))
                .collect(),
            _ => HashMap::new(),
        };
        Engine {
            series,
            config,
            ledger,
            rules,
            session: None,
            daily_levels,
        }
    }

    fn run(mut self) -> BacktestResult {
        let timeline = build_unified_timeline(self.series);

        for &timestamp in &timeline {
            let bars: HashMap<&str, &SignalBar> = self
                .series
                .iter()
                .filter_map(|s| s.bar_at(timestamp).map(|b| (s.symbol.as_str(), b)))
                .collect();

            self.roll_session(timestamp);
            self.exit_phase(timestamp, &bars);
            self.signal_exit_phase(timestamp, &bars);
            self.entry_phase(timestamp, &bars);

            let closes: HashMap<String, f64> = bars
                .iter()
                .map(|(symbol, bar)| (symbol.to_string(), bar.close))
                .collect();
            self.ledger.mark_and_record(timestamp, &closes);
        }

        let mut unclosed_symbols = Vec::new();
        if let Some(&last_timestamp) = timeline.last() {
            let final_prices: HashMap<String, f64> = self
                .series
                .iter()
                .filter_map(|s| s.bars.last().map(|b| (s.symbol.clone(), b.close)))
                .collect();
            self.ledger
                .force_close_all(last_timestamp, &final_prices, ExitReason::BacktestEnd);
            unclosed_symbols = self.ledger.open_symbols();
            for symbol in &unclosed_symbols {
                log::warn!("position in {symbol} left open: no final price available");
            }
        }

        let final_capital = self.ledger.cash;
        BacktestResult {
            initial_capital: self.ledger.initial_capital,
            final_capital,
            unclosed_symbols,
            ledger: self.ledger,
        }
    }

    /// Reset the per-day state at day boundaries. For the futures rule set
    /// this also recomputes previous-day levels and the morning bias.
    fn roll_session(&mut self, timestamp: NaiveDateTime) {
        let date = timestamp.date();
        if self.session.as_ref().map(|s| s.date) == Some(date) {
            return;
        }
        let mut session = SessionState::new(date);

        if let Variant::Futures(params) = &self.config.variant {
            for series in self.series {
                let levels = &self.daily_levels[&series.symbol];
                // Previous trading day, falling back to today on the first
                // day of the series.
                let prev = levels
                    .range(..date)
                    .next_back()
                    .or_else(|| levels.get_key_value(&date))
                    .map(|(_, &hl)| hl);
                session.set_refs(
                    &series.symbol,
                    DayRefs {
                        bias: determine_bias(
                            series,
                            date,
                            &params.bias_window,
                            params.bias_threshold_pct,
                        ),
                        prev_day_high: prev.map(|(high, _)| high),
                        prev_day_low: prev.map(|(_, low)| low),
                    },
                );
            }
        }

        self.session = Some(session);
    }

    fn exit_phase(&mut self, timestamp: NaiveDateTime, bars: &HashMap<&str, &SignalBar>) {
        let is_futures = matches!(self.config.variant, Variant::Futures(_));
        for symbol in self.ledger.open_symbols() {
            // A held symbol with no bar this step is skipped, not closed.
            let Some(bar) = bars.get(symbol.as_str()) else {
                continue;
            };
            let Some(position) = self.ledger.position(&symbol) else {
                continue;
            };
            let elapsed = timestamp - position.entry_time;
            if let Some(decision) = exit_rules::evaluate(position, bar, elapsed, &self.rules) {
                let trade =
                    self.ledger
                        .close(&symbol, timestamp, decision.price, decision.reason);
                if is_futures {
                    if let (Some(trade), Some(session)) = (trade, self.session.as_mut()) {
                        if trade.pnl < 0.0 {
                            session.record_loss();
                        }
                    }
                }
            }
        }
    }

    /// Equity rule set only: a sell signal closes the position at the bar's
    /// close. Runs after the protective exit phase so stops and targets win
    /// the same bar.
    fn signal_exit_phase(&mut self, timestamp: NaiveDateTime, bars: &HashMap<&str, &SignalBar>) {
        if !matches!(self.config.variant, Variant::Equity(_)) {
            return;
        }
        for symbol in self.ledger.open_symbols() {
            let Some(bar) = bars.get(symbol.as_str()) else {
                continue;
            };
            if bar.signal == Signal::Bearish {
                self.ledger
                    .close(&symbol, timestamp, bar.close, ExitReason::SellSignal);
            }
        }
    }

    fn entry_phase(&mut self, timestamp: NaiveDateTime, bars: &HashMap<&str, &SignalBar>) {
        for series in self.series {
            let Some(bar) = bars.get(series.symbol.as_str()) else {
                continue;
            };
            if !bar.signal.is_active() || self.ledger.has_position(&series.symbol) {
                continue;
            }

            let order = match &self.config.variant {
                Variant::Equity(params) => {
                    if bar.signal != Signal::Bullish {
                        continue;
                    }
                    if !self
                        .ledger
                        .can_open(&series.symbol, self.ledger.cash * params.position_size)
                    {
                        continue;
                    }
                    EntryOrder {
                        symbol: series.symbol.clone(),
                        timestamp,
                        price: bar.close,
                        direction: Direction::Long,
                        stop: Some(bar.close * (1.0 - params.stop_loss_pct)),
                        target: Some(bar.close * (1.0 + params.take_profit_pct)),
                        payoff: Payoff::Linear,
                        funding: Funding::Paid,
                        sizing: Sizing::FixedFraction {
                            fraction: params.position_size,
                        },
                    }
                }
                Variant::OptionsProxy(params) => {
                    if !self
                        .ledger
                        .can_open(&series.symbol, self.ledger.cash * params.position_size)
                    {
                        continue;
                    }
                    // A bullish signal buys the call proxy, a bearish one
                    // the put proxy; both are long premium.
                    let direction = match bar.signal {
                        Signal::Bullish => Direction::Long,
                        Signal::Bearish => Direction::Short,
                        Signal::Neutral => continue,
                    };
                    EntryOrder {
                        symbol: series.symbol.clone(),
                        timestamp,
                        price: bar.close * params.premium_pct,
                        direction,
                        stop: None,
                        target: None,
                        payoff: Payoff::LeveragedProxy {
                            underlying_entry: bar.close,
                            leverage: params.leverage,
                            min_premium: params.min_premium,
                        },
                        funding: Funding::Paid,
                        sizing: Sizing::FixedFraction {
                            fraction: params.position_size,
                        },
                    }
                }
                Variant::Futures(params) => {
                    match self.futures_entry(series, bar, timestamp, params) {
                        Some(order) => order,
                        None => continue,
                    }
                }
            };

            self.ledger.open(order);
        }
    }

    /// Build a risk-sized futures entry, or None when an entry filter
    /// rejects it. Filter rejections are strategy outcomes, not errors.
    fn futures_entry(
        &self,
        series: &SymbolSeries,
        bar: &SignalBar,
        timestamp: NaiveDateTime,
        params: &FuturesParams,
    ) -> Option<EntryOrder> {
        let session = self.session.as_ref()?;
        if session.losses >= params.max_daily_losses {
            return None;
        }
        if !params
            .sessions
            .iter()
            .any(|w| w.contains(timestamp.time()))
        {
            return None;
        }

        let direction = match bar.signal {
            Signal::Bullish => Direction::Long,
            Signal::Bearish => Direction::Short,
            Signal::Neutral => return None,
        };

        let refs = session.refs(&series.symbol)?;
        let entry = bar.close;
        let stop = structural_stop(series, timestamp, direction, params.stop_lookback_bars)?;
        let target = match direction {
            Direction::Long => refs.prev_day_high?,
            Direction::Short => refs.prev_day_low?,
        };

        let stop_distance = (entry - stop).abs();
        if stop_distance < params.min_stop_distance {
            return None;
        }
        let risk_reward = (target - entry).abs() / stop_distance;
        if risk_reward < params.min_risk_reward {
            return None;
        }

        let risk_pct = if refs.bias.is_directional() {
            params.risk_pct_biased
        } else {
            params.risk_pct_neutral
        };

        Some(EntryOrder {
            symbol: series.symbol.clone(),
            timestamp,
            price: entry,
            direction,
            stop: Some(stop),
            target: Some(target),
            payoff: Payoff::Linear,
            funding: Funding::Margined,
            sizing: Sizing::RiskBased {
                risk_pct,
                max_quantity: params.max_quantity,
            },
        })
    }
}

/// Structural stop from the extremes of the bars preceding entry: the
/// lowest low for a long, the highest high for a short. None when there is
/// no preceding history yet.
fn structural_stop(
    series: &SymbolSeries,
    timestamp: NaiveDateTime,
    direction: Direction,
    lookback: usize,
) -> Option<f64> {
    let index = series.bar_index(timestamp)?;
    if index == 0 {
        return None;
    }
    let start = index.saturating_sub(lookback);
    let window = &series.bars[start..index];
    match direction {
        Direction::Long => window.iter().map(|b| b.low).min_by(f64::total_cmp),
        Direction::Short => window.iter().map(|b| b.high).max_by(f64::total_cmp),
    }
}
