//! Exit-rule evaluation for open positions.
//!
//! One rule set per strategy variant, evaluated in strict priority order:
//! fixed stop-loss, fixed take-profit, opposite signal, holding-time limit,
//! percentage stop/target. The first rule that fires wins and later rules
//! are never consulted. When one bar touches both the stop and the target,
//! the stop fills.

use chrono::Duration;

use super::bar::{Signal, SignalBar};
use super::position::{Direction, ExitReason, Position};

/// Per-variant exit configuration. Constructed once per run; the evaluator
/// itself is stateless.
#[derive(Debug, Clone)]
pub struct ExitRules {
    /// Check intrabar extremes against the position's fixed stop/target.
    pub use_fixed_levels: bool,
    /// Close when the bar's signal opposes the position's direction.
    pub exit_on_opposite_signal: bool,
    /// Maximum holding duration before a forced time exit.
    pub max_holding: Option<Duration>,
    /// Reason attached to a holding-time exit.
    pub time_exit_reason: ExitReason,
    /// Mark-to-market profit threshold in percent (proxy rule set).
    pub profit_target_pct: Option<f64>,
    /// Mark-to-market loss threshold in percent, negative (proxy rule set).
    pub stop_loss_pct: Option<f64>,
}

impl ExitRules {
    /// Equity rule set: fixed stop/target only. Discretionary sell-signal
    /// exits happen in the engine's own phase, after protective exits.
    pub fn equity() -> Self {
        ExitRules {
            use_fixed_levels: true,
            exit_on_opposite_signal: false,
            max_holding: None,
            time_exit_reason: ExitReason::TimeExit,
            profit_target_pct: None,
            stop_loss_pct: None,
        }
    }

    /// Options-proxy rule set: percentage thresholds, signal reversal and a
    /// near-expiry horizon; no fixed price levels.
    pub fn options_proxy(
        profit_target_pct: f64,
        stop_loss_pct: f64,
        holding_days: i64,
    ) -> Self {
        ExitRules {
            use_fixed_levels: false,
            exit_on_opposite_signal: true,
            max_holding: Some(Duration::days(holding_days)),
            time_exit_reason: ExitReason::NearExpiry,
            profit_target_pct: Some(profit_target_pct),
            stop_loss_pct: Some(stop_loss_pct),
        }
    }

    /// Futures rule set: structural stop/target, signal reversal and a
    /// wall-clock holding limit.
    pub fn futures(time_exit_hours: i64) -> Self {
        ExitRules {
            use_fixed_levels: true,
            exit_on_opposite_signal: true,
            max_holding: Some(Duration::hours(time_exit_hours)),
            time_exit_reason: ExitReason::TimeExit,
            profit_target_pct: None,
            stop_loss_pct: None,
        }
    }
}

/// A firing exit rule: the instrument-terms fill price and the reason.
#[derive(Debug, Clone, PartialEq)]
pub struct ExitDecision {
    pub price: f64,
    pub reason: ExitReason,
}

fn signal_direction(signal: Signal) -> Option<Direction> {
    match signal {
        Signal::Bullish => Some(Direction::Long),
        Signal::Bearish => Some(Direction::Short),
        Signal::Neutral => None,
    }
}

/// Evaluate the rule set against one bar. `elapsed` is the wall time since
/// entry. Returns the first firing rule, or None to keep holding.
pub fn evaluate(
    position: &Position,
    bar: &SignalBar,
    elapsed: Duration,
    rules: &ExitRules,
) -> Option<ExitDecision> {
    if rules.use_fixed_levels {
        if let Some((price, reason)) = position.check_fixed_levels(bar.high, bar.low) {
            return Some(ExitDecision { price, reason });
        }
    }

    if rules.exit_on_opposite_signal {
        if let Some(direction) = signal_direction(bar.signal) {
            if direction == position.direction.opposite() {
                return Some(ExitDecision {
                    price: position.current_price(bar.close),
                    reason: ExitReason::OppositeSignal,
                });
            }
        }
    }

    if let Some(max_holding) = rules.max_holding {
        if elapsed >= max_holding {
            return Some(ExitDecision {
                price: position.current_price(bar.close),
                reason: rules.time_exit_reason,
            });
        }
    }

    let mark = position.current_price(bar.close);
    let pnl_pct = position.pnl_pct(mark) * 100.0;
    if let Some(stop_loss_pct) = rules.stop_loss_pct {
        if pnl_pct <= stop_loss_pct {
            return Some(ExitDecision {
                price: mark,
                reason: ExitReason::StopLoss,
            });
        }
    }
    if let Some(profit_target_pct) = rules.profit_target_pct {
        if pnl_pct >= profit_target_pct {
            return Some(ExitDecision {
                price: mark,
                reason: ExitReason::ProfitTarget,
            });
        }
    }

    None
}
