//! Portfolio ledger: cash, open positions, trade history, valuations.
//!
//! Exactly one ledger instance mutates one cash/position/history triple per
//! run. Every position is created by `open` and destroyed by `close`;
//! nothing else touches the open set.

use chrono::NaiveDateTime;
use std::collections::{BTreeMap, HashMap};

use super::position::{ClosedTrade, Direction, ExitReason, Funding, Payoff, Position};

/// Portfolio snapshot taken once per simulated step.
#[derive(Debug, Clone, PartialEq)]
pub struct ValuationRecord {
    pub timestamp: NaiveDateTime,
    pub cash: f64,
    pub positions_value: f64,
    pub total_value: f64,
    pub open_positions: usize,
}

/// Position-sizing mode, selected per strategy variant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Sizing {
    /// value = cash * fraction; quantity floors to whole units.
    FixedFraction { fraction: f64 },
    /// quantity = equity * risk_pct / stop_distance, fractional, capped.
    RiskBased { risk_pct: f64, max_quantity: f64 },
}

/// Everything the ledger needs to open one position. `price` is in
/// instrument terms (underlying fill for linear payoffs, premium per
/// contract for the proxy).
#[derive(Debug, Clone)]
pub struct EntryOrder {
    pub symbol: String,
    pub timestamp: NaiveDateTime,
    pub price: f64,
    pub direction: Direction,
    pub stop: Option<f64>,
    pub target: Option<f64>,
    pub payoff: Payoff,
    pub funding: Funding,
    pub sizing: Sizing,
}

/// Why an entry attempt produced no trade. These are strategy-filter
/// outcomes, not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    AlreadyHeld,
    MaxPositions,
    BelowMinimum,
    ZeroQuantity,
    InsufficientCash,
    ZeroStopDistance,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OpenResult {
    Opened { quantity: f64, cost: f64 },
    Rejected(RejectReason),
}

impl OpenResult {
    pub fn is_opened(&self) -> bool {
        matches!(self, OpenResult::Opened { .. })
    }
}

#[derive(Debug, Clone)]
pub struct Ledger {
    pub cash: f64,
    pub initial_capital: f64,
    max_positions: usize,
    min_trade_value: f64,
    transaction_cost_pct: f64,
    positions: BTreeMap<String, Position>,
    closed_trades: Vec<ClosedTrade>,
    valuations: Vec<ValuationRecord>,
    last_marks: HashMap<String, f64>,
}

impl Ledger {
    pub fn new(
        initial_capital: f64,
        max_positions: usize,
        min_trade_value: f64,
        transaction_cost_pct: f64,
    ) -> Self {
        Ledger {
            cash: initial_capital,
            initial_capital,
            max_positions,
            min_trade_value,
            transaction_cost_pct,
            positions: BTreeMap::new(),
            closed_trades: Vec::new(),
            valuations: Vec::new(),
            last_marks: HashMap::new(),
        }
    }

    pub fn position(&self, symbol: &str) -> Option<&Position> {
        self.positions.get(symbol)
    }

    pub fn has_position(&self, symbol: &str) -> bool {
        self.positions.contains_key(symbol)
    }

    pub fn open_count(&self) -> usize {
        self.positions.len()
    }

    /// Held symbols in sorted order, so exit processing is deterministic.
    pub fn open_symbols(&self) -> Vec<String> {
        self.positions.keys().cloned().collect()
    }

    pub fn closed_trades(&self) -> &[ClosedTrade] {
        &self.closed_trades
    }

    pub fn valuations(&self) -> &[ValuationRecord] {
        &self.valuations
    }

    /// Cash plus every open position marked at its last known price.
    pub fn total_equity(&self) -> f64 {
        let positions_value: f64 = self
            .positions
            .values()
            .map(|pos| pos.mark_value(self.last_mark(pos)))
            .sum();
        self.cash + positions_value
    }

    /// Entry gate: a symbol already held, a full book, or a trade below the
    /// minimum value floor all block the open.
    pub fn can_open(&self, symbol: &str, intended_value: f64) -> bool {
        !self.positions.contains_key(symbol)
            && self.positions.len() < self.max_positions
            && intended_value >= self.min_trade_value
    }

    pub fn open(&mut self, order: EntryOrder) -> OpenResult {
        if self.positions.contains_key(&order.symbol) {
            return OpenResult::Rejected(RejectReason::AlreadyHeld);
        }
        if self.positions.len() >= self.max_positions {
            return OpenResult::Rejected(RejectReason::MaxPositions);
        }

        let (quantity, cost, cost_basis) = match order.sizing {
            Sizing::FixedFraction { fraction } => {
                let position_value = self.cash * fraction;
                if position_value < self.min_trade_value {
                    return OpenResult::Rejected(RejectReason::BelowMinimum);
                }
                let effective_price = order.price * (1.0 + self.transaction_cost_pct);
                let quantity = (position_value / effective_price).floor();
                if quantity < 1.0 {
                    return OpenResult::Rejected(RejectReason::ZeroQuantity);
                }
                let cost = quantity * effective_price;
                if cost > self.cash {
                    return OpenResult::Rejected(RejectReason::InsufficientCash);
                }
                (quantity, cost, cost)
            }
            Sizing::RiskBased {
                risk_pct,
                max_quantity,
            } => {
                let Some(stop) = order.stop else {
                    return OpenResult::Rejected(RejectReason::ZeroStopDistance);
                };
                let stop_distance = (order.price - stop).abs();
                if stop_distance <= 0.0 {
                    return OpenResult::Rejected(RejectReason::ZeroStopDistance);
                }
                let risk_amount = self.total_equity() * risk_pct;
                let quantity = (risk_amount / stop_distance).min(max_quantity);
                if quantity <= 0.0 {
                    return OpenResult::Rejected(RejectReason::ZeroQuantity);
                }
                // Margined entries move no notional; only the entry-side
                // transaction cost leaves cash now.
                let entry_fee = quantity * order.price * self.transaction_cost_pct;
                if entry_fee > self.cash {
                    return OpenResult::Rejected(RejectReason::InsufficientCash);
                }
                (quantity, entry_fee, entry_fee)
            }
        };

        self.cash -= cost;
        debug_assert!(self.cash >= -1e-9, "open drove cash negative");

        let underlying_entry = match order.payoff {
            Payoff::Linear => order.price,
            Payoff::LeveragedProxy {
                underlying_entry, ..
            } => underlying_entry,
        };
        self.last_marks.insert(order.symbol.clone(), underlying_entry);

        let position = Position {
            symbol: order.symbol.clone(),
            direction: order.direction,
            entry_time: order.timestamp,
            entry_price: order.price,
            quantity,
            stop: order.stop,
            target: order.target,
            cost_basis,
            payoff: order.payoff,
            funding: order.funding,
        };
        self.positions.insert(order.symbol, position);

        OpenResult::Opened { quantity, cost }
    }

    /// Close a held position at an instrument-terms fill price. Returns the
    /// appended trade record, or None when the symbol is not held.
    pub fn close(
        &mut self,
        symbol: &str,
        timestamp: NaiveDateTime,
        exit_price: f64,
        reason: ExitReason,
    ) -> Option<ClosedTrade> {
        let position = self.positions.remove(symbol)?;

        let gross = position.quantity * exit_price;
        let exit_fee = gross * self.transaction_cost_pct;
        let proceeds = match (position.funding, position.direction) {
            (Funding::Paid, Direction::Long) => gross - exit_fee,
            (Funding::Paid, Direction::Short) => {
                // Escrowed entry notional comes back along with the move.
                let entry_notional = position.quantity * position.entry_price;
                2.0 * entry_notional - gross - exit_fee
            }
            (Funding::Margined, _) => position.realized_pnl(exit_price) - exit_fee,
        };
        self.cash += proceeds;

        let pnl = proceeds - position.cost_basis;
        let pnl_denominator = match position.funding {
            Funding::Paid => position.cost_basis,
            Funding::Margined => position.quantity * position.entry_price,
        };
        let pnl_pct = if pnl_denominator > 0.0 {
            pnl / pnl_denominator
        } else {
            0.0
        };

        let trade = ClosedTrade {
            symbol: position.symbol.clone(),
            direction: position.direction,
            entry_time: position.entry_time,
            entry_price: position.entry_price,
            exit_time: timestamp,
            exit_price,
            quantity: position.quantity,
            pnl,
            pnl_pct,
            duration: timestamp - position.entry_time,
            exit_reason: reason,
        };
        self.closed_trades.push(trade.clone());

        Some(trade)
    }

    /// Record one valuation step. Symbols missing from the snapshot are
    /// marked at their last known price and logged as a data-quality
    /// anomaly; the run continues.
    pub fn mark_and_record(&mut self, timestamp: NaiveDateTime, snapshot: &HashMap<String, f64>) {
        for (symbol, price) in snapshot {
            self.last_marks.insert(symbol.clone(), *price);
        }

        let mut positions_value = 0.0;
        for position in self.positions.values() {
            if !snapshot.contains_key(&position.symbol) {
                log::warn!(
                    "no price for held symbol {} at {}; marking at last known price",
                    position.symbol,
                    timestamp
                );
            }
            positions_value += position.mark_value(self.last_mark(position));
        }

        self.valuations.push(ValuationRecord {
            timestamp,
            cash: self.cash,
            positions_value,
            total_value: self.cash + positions_value,
            open_positions: self.positions.len(),
        });
    }

    /// Close every remaining position that has a price in the snapshot.
    /// Symbols without a price stay open; the caller reports them. A call
    /// with an empty book is a no-op.
    pub fn force_close_all(
        &mut self,
        timestamp: NaiveDateTime,
        snapshot: &HashMap<String, f64>,
        reason: ExitReason,
    ) -> Vec<ClosedTrade> {
        let symbols = self.open_symbols();
        let mut closed = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            let Some(&underlying) = snapshot.get(&symbol) else {
                continue;
            };
            let exit_price = self.positions[&symbol].current_price(underlying);
            if let Some(trade) = self.close(&symbol, timestamp, exit_price, reason) {
                closed.push(trade);
            }
        }
        closed
    }

    fn last_mark(&self, position: &Position) -> f64 {
        self.last_marks
            .get(&position.symbol)
            .copied()
            .unwrap_or(match position.payoff {
                Payoff::Linear => position.entry_price,
                Payoff::LeveragedProxy {
                    underlying_entry, ..
                } => underlying_entry,
            })
    }
}
