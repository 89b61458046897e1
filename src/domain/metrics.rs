//! Performance metrics over the closed-trade ledger and valuation series.
//! Pure and stateless; downstream of the simulation core.

use super::ledger::ValuationRecord;
use super::position::ClosedTrade;
use std::collections::BTreeMap;

const TRADING_DAYS_PER_YEAR: f64 = 252.0;
const CALENDAR_DAYS_PER_YEAR: f64 = 365.25;

#[derive(Debug, Clone, PartialEq)]
pub struct Metrics {
    pub total_return: f64,
    pub annualized_return: f64,
    pub volatility: f64,
    pub sharpe_ratio: f64,
    pub max_drawdown: f64,
    /// Bars from the running peak to the deepest trough.
    pub max_drawdown_duration: i64,
    pub calmar_ratio: f64,
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub avg_trade_pct: f64,
    pub best_trade_pct: f64,
    pub worst_trade_pct: f64,
    pub avg_holding_days: f64,
}

impl Metrics {
    pub fn compute(
        trades: &[ClosedTrade],
        valuations: &[ValuationRecord],
        initial_capital: f64,
        final_capital: f64,
    ) -> Self {
        let total_return = if initial_capital > 0.0 {
            (final_capital - initial_capital) / initial_capital
        } else {
            0.0
        };

        let annualized_return = match (valuations.first(), valuations.last()) {
            (Some(first), Some(last)) => {
                let days = (last.timestamp - first.timestamp).num_days() as f64;
                let years = days / CALENDAR_DAYS_PER_YEAR;
                if years > 0.0 {
                    (1.0 + total_return).powf(1.0 / years) - 1.0
                } else {
                    0.0
                }
            }
            _ => 0.0,
        };

        let (volatility, sharpe_ratio) = risk_adjusted(valuations);
        let (max_drawdown, max_drawdown_duration) = max_drawdown(valuations);
        let calmar_ratio = if max_drawdown > 0.0 {
            annualized_return / max_drawdown
        } else {
            0.0
        };

        let mut winning_trades = 0usize;
        let mut losing_trades = 0usize;
        let mut total_wins = 0.0;
        let mut total_losses = 0.0;
        let mut pct_sum = 0.0;
        let mut best_trade_pct = f64::NEG_INFINITY;
        let mut worst_trade_pct = f64::INFINITY;
        let mut holding_days_sum = 0.0;

        for trade in trades {
            if trade.pnl > 0.0 {
                winning_trades += 1;
                total_wins += trade.pnl;
            } else if trade.pnl < 0.0 {
                losing_trades += 1;
                total_losses += trade.pnl.abs();
            }
            pct_sum += trade.pnl_pct;
            best_trade_pct = best_trade_pct.max(trade.pnl_pct);
            worst_trade_pct = worst_trade_pct.min(trade.pnl_pct);
            holding_days_sum += trade.duration.num_seconds() as f64 / 86_400.0;
        }

        let total_trades = trades.len();
        let win_rate = if total_trades > 0 {
            winning_trades as f64 / total_trades as f64
        } else {
            0.0
        };
        let profit_factor = if total_losses > 0.0 {
            total_wins / total_losses
        } else if total_wins > 0.0 {
            f64::INFINITY
        } else {
            0.0
        };
        let (avg_trade_pct, best_trade_pct, worst_trade_pct, avg_holding_days) =
            if total_trades > 0 {
                (
                    pct_sum / total_trades as f64,
                    best_trade_pct,
                    worst_trade_pct,
                    holding_days_sum / total_trades as f64,
                )
            } else {
                (0.0, 0.0, 0.0, 0.0)
            };

        Metrics {
            total_return,
            annualized_return,
            volatility,
            sharpe_ratio,
            max_drawdown,
            max_drawdown_duration,
            calmar_ratio,
            total_trades,
            winning_trades,
            losing_trades,
            win_rate,
            profit_factor,
            avg_trade_pct,
            best_trade_pct,
            worst_trade_pct,
            avg_holding_days,
        }
    }
}

/// Annualized volatility and Sharpe ratio (zero risk-free rate) from
/// step-over-step valuation returns. Both zero when the series is too short
/// or the deviation vanishes.
fn risk_adjusted(valuations: &[ValuationRecord]) -> (f64, f64) {
    if valuations.len() < 2 {
        return (0.0, 0.0);
    }

    let returns: Vec<f64> = valuations
        .windows(2)
        .map(|w| {
            if w[0].total_value > 0.0 {
                (w[1].total_value - w[0].total_value) / w[0].total_value
            } else {
                0.0
            }
        })
        .collect();

    if returns.len() < 2 {
        return (0.0, 0.0);
    }
    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0);
    let stddev = variance.sqrt();

    let volatility = stddev * TRADING_DAYS_PER_YEAR.sqrt();
    let sharpe = if stddev > 0.0 {
        mean / stddev * TRADING_DAYS_PER_YEAR.sqrt()
    } else {
        0.0
    };
    (volatility, sharpe)
}

/// Deepest peak-to-trough decline as a positive fraction, and its length in
/// bars from the running peak to the trough.
fn max_drawdown(valuations: &[ValuationRecord]) -> (f64, i64) {
    if valuations.is_empty() {
        return (0.0, 0);
    }

    let mut peak = valuations[0].total_value;
    let mut peak_index = 0usize;
    let mut max_dd = 0.0;
    let mut max_dd_duration = 0i64;

    for (i, record) in valuations.iter().enumerate() {
        if record.total_value > peak {
            peak = record.total_value;
            peak_index = i;
        } else if peak > 0.0 {
            let dd = (peak - record.total_value) / peak;
            if dd > max_dd {
                max_dd = dd;
                max_dd_duration = (i - peak_index) as i64;
            }
        }
    }

    (max_dd, max_dd_duration)
}

/// Per-symbol trade rollup for the run summary.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolSummary {
    pub symbol: String,
    pub total_trades: usize,
    pub winning_trades: usize,
    pub win_rate: f64,
    pub total_pnl: f64,
}

impl SymbolSummary {
    pub fn compute_per_symbol(trades: &[ClosedTrade]) -> Vec<SymbolSummary> {
        let mut grouped: BTreeMap<&str, (usize, usize, f64)> = BTreeMap::new();
        for trade in trades {
            let entry = grouped.entry(&trade.symbol).or_default();
            entry.0 += 1;
            if trade.pnl > 0.0 {
                entry.1 += 1;
            }
            entry.2 += trade.pnl;
        }
        grouped
            .into_iter()
            .map(|(symbol, (total, wins, pnl))| SymbolSummary {
                symbol: symbol.to_string(),
                total_trades: total,
                winning_trades: wins,
                win_rate: wins as f64 / total as f64,
                total_pnl: pnl,
            })
            .collect()
    }
}
