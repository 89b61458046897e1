//! Open-position value object and closed-trade records.

use chrono::{Duration, NaiveDateTime};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    pub fn sign(&self) -> f64 {
        match self {
            Direction::Long => 1.0,
            Direction::Short => -1.0,
        }
    }

    pub fn opposite(&self) -> Direction {
        match self {
            Direction::Long => Direction::Short,
            Direction::Short => Direction::Long,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Long => write!(f, "LONG"),
            Direction::Short => write!(f, "SHORT"),
        }
    }
}

/// How the position's value responds to the underlying price.
///
/// `Linear` covers equity shares and futures contracts. `LeveragedProxy` is
/// the simplified options stand-in: premium moves as a leveraged multiple of
/// the underlying's percentage move, floored at a minimum premium. The
/// leverage and floor are configuration, not a calibrated pricing model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Payoff {
    Linear,
    LeveragedProxy {
        underlying_entry: f64,
        leverage: f64,
        min_premium: f64,
    },
}

/// How cash moves when the position is opened and closed.
///
/// `Paid` instruments transfer the full notional (equity shares, option
/// premium) up front and return proceeds at close. `Margined` instruments
/// (futures) move no notional at open; the price difference settles into
/// cash when the trade closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Funding {
    Paid,
    Margined,
}

/// One open trade. Created exclusively by the ledger's open operation and
/// owned by the ledger until a close succeeds. Stop and target are fixed at
/// entry and never mutated.
///
/// `entry_price` is in instrument terms: the underlying fill price for
/// `Linear` payoffs, the premium paid per contract for `LeveragedProxy`.
#[derive(Debug, Clone)]
pub struct Position {
    pub symbol: String,
    pub direction: Direction,
    pub entry_time: NaiveDateTime,
    pub entry_price: f64,
    pub quantity: f64,
    pub stop: Option<f64>,
    pub target: Option<f64>,
    pub cost_basis: f64,
    pub payoff: Payoff,
    pub funding: Funding,
}

impl Position {
    pub fn is_long(&self) -> bool {
        self.direction == Direction::Long
    }

    pub fn is_short(&self) -> bool {
        self.direction == Direction::Short
    }

    /// Current instrument price implied by the underlying: the underlying
    /// itself for linear payoffs, the proxy premium otherwise.
    pub fn current_price(&self, underlying: f64) -> f64 {
        match self.payoff {
            Payoff::Linear => underlying,
            Payoff::LeveragedProxy {
                underlying_entry,
                leverage,
                min_premium,
            } => {
                let move_pct = (underlying - underlying_entry) / underlying_entry;
                let signed_move = self.direction.sign() * move_pct;
                (self.entry_price * (1.0 + leverage * signed_move)).max(min_premium)
            }
        }
    }

    pub fn unrealized_pnl(&self, underlying: f64) -> f64 {
        match self.payoff {
            Payoff::Linear => {
                self.direction.sign() * self.quantity * (underlying - self.entry_price)
            }
            Payoff::LeveragedProxy { .. } => {
                (self.current_price(underlying) - self.entry_price) * self.quantity
            }
        }
    }

    /// Contribution to portfolio valuation at the given underlying price.
    /// Margined positions contribute only their unrealized P&L; paid shorts
    /// contribute the escrowed entry notional plus the move.
    pub fn mark_value(&self, underlying: f64) -> f64 {
        match self.funding {
            Funding::Margined => self.unrealized_pnl(underlying),
            Funding::Paid => match self.direction {
                Direction::Long => self.quantity * self.current_price(underlying),
                Direction::Short => self.cost_basis + self.unrealized_pnl(underlying),
            },
        }
    }

    /// Gross P&L at an exit fill, `exit_price` in instrument terms.
    pub fn realized_pnl(&self, exit_price: f64) -> f64 {
        match self.payoff {
            Payoff::Linear => {
                self.direction.sign() * self.quantity * (exit_price - self.entry_price)
            }
            Payoff::LeveragedProxy { .. } => (exit_price - self.entry_price) * self.quantity,
        }
    }

    /// Fractional return at an exit fill (0.10 == +10%). Proxy positions
    /// are long premium regardless of direction, so the sign comes from the
    /// premium move alone.
    pub fn pnl_pct(&self, exit_price: f64) -> f64 {
        match self.payoff {
            Payoff::Linear => {
                self.direction.sign() * (exit_price - self.entry_price) / self.entry_price
            }
            Payoff::LeveragedProxy { .. } => {
                (exit_price - self.entry_price) / self.entry_price
            }
        }
    }

    /// Check the bar's intrabar extremes against the fixed stop/target
    /// levels. The stop is checked first: when one bar touches both levels
    /// the fill is the stop, never the target.
    pub fn check_fixed_levels(&self, high: f64, low: f64) -> Option<(f64, ExitReason)> {
        match self.direction {
            Direction::Long => {
                if let Some(stop) = self.stop {
                    if low <= stop {
                        return Some((stop, ExitReason::StopLoss));
                    }
                }
                if let Some(target) = self.target {
                    if high >= target {
                        return Some((target, ExitReason::TakeProfit));
                    }
                }
            }
            Direction::Short => {
                if let Some(stop) = self.stop {
                    if high >= stop {
                        return Some((stop, ExitReason::StopLoss));
                    }
                }
                if let Some(target) = self.target {
                    if low <= target {
                        return Some((target, ExitReason::TakeProfit));
                    }
                }
            }
        }
        None
    }
}

/// Why a position was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
    SellSignal,
    OppositeSignal,
    TimeExit,
    NearExpiry,
    ProfitTarget,
    BacktestEnd,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ExitReason::StopLoss => "Stop Loss",
            ExitReason::TakeProfit => "Take Profit",
            ExitReason::SellSignal => "Sell Signal",
            ExitReason::OppositeSignal => "Opposite Signal",
            ExitReason::TimeExit => "Time Exit",
            ExitReason::NearExpiry => "Near Expiry",
            ExitReason::ProfitTarget => "Profit Target",
            ExitReason::BacktestEnd => "Backtest End",
        };
        write!(f, "{label}")
    }
}

/// Immutable snapshot taken when a position closes. Append-only ledger
/// entry; never mutated afterwards.
#[derive(Debug, Clone)]
pub struct ClosedTrade {
    pub symbol: String,
    pub direction: Direction,
    pub entry_time: NaiveDateTime,
    pub entry_price: f64,
    pub exit_time: NaiveDateTime,
    pub exit_price: f64,
    pub quantity: f64,
    pub pnl: f64,
    pub pnl_pct: f64,
    pub duration: Duration,
    pub exit_reason: ExitReason,
}
