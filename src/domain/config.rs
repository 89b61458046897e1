//! Simulation configuration: explicit value objects built from a config
//! port, validated before the run starts. No process-wide defaults.

use chrono::NaiveTime;

use super::error::SignalsimError;
use super::session::TradingWindow;
use crate::ports::config_port::ConfigPort;

/// Which strategy variant a run simulates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariantKind {
    Equity,
    Options,
    Futures,
}

/// Fixed-fraction long-only equity strategy parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct EquityParams {
    pub position_size: f64,
    pub max_positions: usize,
    pub stop_loss_pct: f64,
    pub take_profit_pct: f64,
    pub min_trade_value: f64,
}

impl Default for EquityParams {
    fn default() -> Self {
        EquityParams {
            position_size: 0.20,
            max_positions: 3,
            stop_loss_pct: 0.05,
            take_profit_pct: 0.10,
            min_trade_value: 100.0,
        }
    }
}

/// Options-by-proxy strategy parameters. Thresholds are in percent of
/// premium; `stop_loss_pct` is negative. Leverage and the premium floor are
/// placeholders for a real pricing model and stay configurable.
#[derive(Debug, Clone, PartialEq)]
pub struct OptionsParams {
    pub position_size: f64,
    pub max_positions: usize,
    pub profit_target_pct: f64,
    pub stop_loss_pct: f64,
    pub premium_pct: f64,
    pub leverage: f64,
    pub min_premium: f64,
    pub expiry_days: i64,
    pub exit_days_before_expiry: i64,
}

impl Default for OptionsParams {
    fn default() -> Self {
        OptionsParams {
            position_size: 0.10,
            max_positions: 5,
            profit_target_pct: 50.0,
            stop_loss_pct: -30.0,
            premium_pct: 0.02,
            leverage: 3.0,
            min_premium: 0.01,
            expiry_days: 30,
            exit_days_before_expiry: 5,
        }
    }
}

/// Intraday futures strategy parameters with risk-based sizing.
#[derive(Debug, Clone, PartialEq)]
pub struct FuturesParams {
    pub risk_pct_biased: f64,
    pub risk_pct_neutral: f64,
    pub min_risk_reward: f64,
    pub max_daily_losses: u32,
    pub min_stop_distance: f64,
    pub max_quantity: f64,
    pub stop_lookback_bars: usize,
    pub time_exit_hours: i64,
    pub bias_threshold_pct: f64,
    pub bias_window: TradingWindow,
    pub sessions: Vec<TradingWindow>,
}

impl Default for FuturesParams {
    fn default() -> Self {
        FuturesParams {
            risk_pct_biased: 0.02,
            risk_pct_neutral: 0.01,
            min_risk_reward: 1.1,
            max_daily_losses: 3,
            min_stop_distance: 10.0,
            max_quantity: 500.0,
            stop_lookback_bars: 6,
            time_exit_hours: 24,
            bias_threshold_pct: 0.15,
            bias_window: TradingWindow::new(hm(9, 15), hm(10, 30)),
            sessions: vec![
                TradingWindow::new(hm(9, 15), hm(12, 0)),
                TradingWindow::new(hm(13, 0), hm(15, 30)),
            ],
        }
    }
}

fn hm(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).expect("static time literal")
}

#[derive(Debug, Clone, PartialEq)]
pub enum Variant {
    Equity(EquityParams),
    OptionsProxy(OptionsParams),
    Futures(FuturesParams),
}

impl Variant {
    pub fn kind(&self) -> VariantKind {
        match self {
            Variant::Equity(_) => VariantKind::Equity,
            Variant::OptionsProxy(_) => VariantKind::Options,
            Variant::Futures(_) => VariantKind::Futures,
        }
    }
}

/// Full configuration for one simulation run.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    pub initial_capital: f64,
    pub transaction_cost_pct: f64,
    pub variant: Variant,
}

impl SimulationConfig {
    pub fn max_positions(&self) -> usize {
        match &self.variant {
            Variant::Equity(p) => p.max_positions,
            Variant::OptionsProxy(p) => p.max_positions,
            // The futures rule set holds at most one trade at a time.
            Variant::Futures(_) => 1,
        }
    }

    pub fn min_trade_value(&self) -> f64 {
        match &self.variant {
            Variant::Equity(p) => p.min_trade_value,
            Variant::OptionsProxy(_) | Variant::Futures(_) => 0.0,
        }
    }

    /// Read and validate a run configuration from an INI-backed port.
    pub fn from_config(
        config: &dyn ConfigPort,
        kind: VariantKind,
    ) -> Result<Self, SignalsimError> {
        let initial_capital = config.get_double("backtest", "initial_capital", 1_000_000.0);
        if initial_capital <= 0.0 {
            return Err(invalid("backtest", "initial_capital", "must be positive"));
        }
        let transaction_cost_pct = config.get_double("backtest", "transaction_cost_pct", 0.001);
        if transaction_cost_pct < 0.0 {
            return Err(invalid(
                "backtest",
                "transaction_cost_pct",
                "must be non-negative",
            ));
        }

        let variant = match kind {
            VariantKind::Equity => Variant::Equity(read_equity(config)?),
            VariantKind::Options => Variant::OptionsProxy(read_options(config)?),
            VariantKind::Futures => Variant::Futures(read_futures(config)?),
        };

        Ok(SimulationConfig {
            initial_capital,
            transaction_cost_pct,
            variant,
        })
    }
}

fn invalid(section: &str, key: &str, reason: &str) -> SignalsimError {
    SignalsimError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

fn read_equity(config: &dyn ConfigPort) -> Result<EquityParams, SignalsimError> {
    let defaults = EquityParams::default();
    let params = EquityParams {
        position_size: config.get_double("equity", "position_size", defaults.position_size),
        max_positions: config.get_int("equity", "max_positions", defaults.max_positions as i64)
            as usize,
        stop_loss_pct: config.get_double("equity", "stop_loss_pct", defaults.stop_loss_pct),
        take_profit_pct: config.get_double("equity", "take_profit_pct", defaults.take_profit_pct),
        min_trade_value: config.get_double("equity", "min_trade_value", defaults.min_trade_value),
    };

    if params.position_size <= 0.0 || params.position_size > 1.0 {
        return Err(invalid("equity", "position_size", "must be in (0, 1]"));
    }
    if params.max_positions < 1 {
        return Err(invalid("equity", "max_positions", "must be at least 1"));
    }
    if params.stop_loss_pct <= 0.0 || params.stop_loss_pct >= 1.0 {
        // A stop fraction outside (0, 1) puts the stop at or above the
        // entry, contradicting the target.
        return Err(invalid("equity", "stop_loss_pct", "must be in (0, 1)"));
    }
    if params.take_profit_pct <= 0.0 {
        return Err(invalid("equity", "take_profit_pct", "must be positive"));
    }
    if params.min_trade_value < 0.0 {
        return Err(invalid("equity", "min_trade_value", "must be non-negative"));
    }
    Ok(params)
}

fn read_options(config: &dyn ConfigPort) -> Result<OptionsParams, SignalsimError> {
    let defaults = OptionsParams::default();
    let params = OptionsParams {
        position_size: config.get_double("options", "position_size", defaults.position_size),
        max_positions: config.get_int("options", "max_positions", defaults.max_positions as i64)
            as usize,
        profit_target_pct: config.get_double(
            "options",
            "profit_target_pct",
            defaults.profit_target_pct,
        ),
        stop_loss_pct: config.get_double("options", "stop_loss_pct", defaults.stop_loss_pct),
        premium_pct: config.get_double("options", "premium_pct", defaults.premium_pct),
        leverage: config.get_double("options", "leverage", defaults.leverage),
        min_premium: config.get_double("options", "min_premium", defaults.min_premium),
        expiry_days: config.get_int("options", "expiry_days", defaults.expiry_days),
        exit_days_before_expiry: config.get_int(
            "options",
            "exit_days_before_expiry",
            defaults.exit_days_before_expiry,
        ),
    };

    if params.position_size <= 0.0 || params.position_size > 1.0 {
        return Err(invalid("options", "position_size", "must be in (0, 1]"));
    }
    if params.max_positions < 1 {
        return Err(invalid("options", "max_positions", "must be at least 1"));
    }
    if params.profit_target_pct <= 0.0 {
        return Err(invalid("options", "profit_target_pct", "must be positive"));
    }
    if params.stop_loss_pct >= 0.0 {
        return Err(invalid(
            "options",
            "stop_loss_pct",
            "must be negative (a loss threshold)",
        ));
    }
    if params.premium_pct <= 0.0 {
        return Err(invalid("options", "premium_pct", "must be positive"));
    }
    if params.leverage <= 0.0 {
        return Err(invalid("options", "leverage", "must be positive"));
    }
    if params.min_premium <= 0.0 {
        return Err(invalid("options", "min_premium", "must be positive"));
    }
    if params.exit_days_before_expiry < 0 {
        return Err(invalid(
            "options",
            "exit_days_before_expiry",
            "must be non-negative",
        ));
    }
    if params.expiry_days <= params.exit_days_before_expiry {
        return Err(invalid(
            "options",
            "expiry_days",
            "must exceed exit_days_before_expiry",
        ));
    }
    Ok(params)
}

fn read_futures(config: &dyn ConfigPort) -> Result<FuturesParams, SignalsimError> {
    let defaults = FuturesParams::default();

    let sessions = match config.get_string("futures", "sessions") {
        Some(raw) => parse_windows(&raw).map_err(|reason| invalid("futures", "sessions", &reason))?,
        None => defaults.sessions.clone(),
    };
    let bias_window = match config.get_string("futures", "bias_window") {
        Some(raw) => parse_window(&raw)
            .map_err(|reason| invalid("futures", "bias_window", &reason))?,
        None => defaults.bias_window,
    };

    let params = FuturesParams {
        risk_pct_biased: config.get_double("futures", "risk_pct_biased", defaults.risk_pct_biased),
        risk_pct_neutral: config.get_double(
            "futures",
            "risk_pct_neutral",
            defaults.risk_pct_neutral,
        ),
        min_risk_reward: config.get_double("futures", "min_risk_reward", defaults.min_risk_reward),
        max_daily_losses: config.get_int(
            "futures",
            "max_daily_losses",
            defaults.max_daily_losses as i64,
        ) as u32,
        min_stop_distance: config.get_double(
            "futures",
            "min_stop_distance",
            defaults.min_stop_distance,
        ),
        max_quantity: config.get_double("futures", "max_quantity", defaults.max_quantity),
        stop_lookback_bars: config.get_int(
            "futures",
            "stop_lookback_bars",
            defaults.stop_lookback_bars as i64,
        ) as usize,
        time_exit_hours: config.get_int("futures", "time_exit_hours", defaults.time_exit_hours),
        bias_threshold_pct: config.get_double(
            "futures",
            "bias_threshold_pct",
            defaults.bias_threshold_pct,
        ),
        bias_window,
        sessions,
    };

    for (key, value) in [
        ("risk_pct_biased", params.risk_pct_biased),
        ("risk_pct_neutral", params.risk_pct_neutral),
    ] {
        if value <= 0.0 || value >= 1.0 {
            return Err(invalid("futures", key, "must be in (0, 1)"));
        }
    }
    if params.min_risk_reward <= 0.0 {
        return Err(invalid("futures", "min_risk_reward", "must be positive"));
    }
    if params.max_daily_losses < 1 {
        return Err(invalid("futures", "max_daily_losses", "must be at least 1"));
    }
    if params.min_stop_distance < 0.0 {
        return Err(invalid(
            "futures",
            "min_stop_distance",
            "must be non-negative",
        ));
    }
    if params.max_quantity < 1.0 {
        return Err(invalid("futures", "max_quantity", "must be at least 1"));
    }
    if params.stop_lookback_bars < 1 {
        return Err(invalid("futures", "stop_lookback_bars", "must be at least 1"));
    }
    if params.time_exit_hours < 1 {
        return Err(invalid("futures", "time_exit_hours", "must be at least 1"));
    }
    if params.bias_threshold_pct < 0.0 {
        return Err(invalid(
            "futures",
            "bias_threshold_pct",
            "must be non-negative",
        ));
    }
    if params.sessions.is_empty() {
        return Err(invalid("futures", "sessions", "at least one window required"));
    }
    for window in params.sessions.iter().chain(std::iter::once(&params.bias_window)) {
        if window.start >= window.end {
            return Err(invalid("futures", "sessions", "window start must precede end"));
        }
    }
    Ok(params)
}

/// Parse `HH:MM-HH:MM` into a window.
fn parse_window(raw: &str) -> Result<TradingWindow, String> {
    let (start, end) = raw
        .split_once('-')
        .ok_or_else(|| format!("expected HH:MM-HH:MM, got '{raw}'"))?;
    let parse = |s: &str| {
        NaiveTime::parse_from_str(s.trim(), "%H:%M")
            .map_err(|_| format!("invalid time '{}', expected HH:MM", s.trim()))
    };
    Ok(TradingWindow::new(parse(start)?, parse(end)?))
}

/// Parse a comma-separated list of `HH:MM-HH:MM` windows.
fn parse_windows(raw: &str) -> Result<Vec<TradingWindow>, String> {
    raw.split(',')
        .map(|token| parse_window(token.trim()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    fn adapter(content: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(content).unwrap()
    }

    #[test]
    fn equity_config_with_defaults() {
        let config = adapter("[backtest]\ninitial_capital = 1000000\n");
        let sim = SimulationConfig::from_config(&config, VariantKind::Equity).unwrap();

        assert_eq!(sim.initial_capital, 1_000_000.0);
        assert_eq!(sim.transaction_cost_pct, 0.001);
        assert_eq!(sim.max_positions(), 3);
        assert_eq!(sim.min_trade_value(), 100.0);
        match sim.variant {
            Variant::Equity(p) => assert_eq!(p, EquityParams::default()),
            other => panic!("expected equity variant, got {other:?}"),
        }
    }

    #[test]
    fn equity_config_overrides() {
        let config = adapter(
            "[backtest]\ninitial_capital = 500000\ntransaction_cost_pct = 0.002\n\
             [equity]\nposition_size = 0.1\nmax_positions = 5\nstop_loss_pct = 0.03\n",
        );
        let sim = SimulationConfig::from_config(&config, VariantKind::Equity).unwrap();
        let Variant::Equity(p) = sim.variant else {
            panic!("expected equity variant");
        };
        assert_eq!(p.position_size, 0.1);
        assert_eq!(p.max_positions, 5);
        assert_eq!(p.stop_loss_pct, 0.03);
        assert_eq!(p.take_profit_pct, 0.10);
    }

    #[test]
    fn rejects_non_positive_capital() {
        let config = adapter("[backtest]\ninitial_capital = 0\n");
        let err = SimulationConfig::from_config(&config, VariantKind::Equity).unwrap_err();
        assert!(matches!(
            err,
            SignalsimError::ConfigInvalid { ref key, .. } if key == "initial_capital"
        ));
    }

    #[test]
    fn rejects_negative_transaction_cost() {
        let config = adapter(
            "[backtest]\ninitial_capital = 1000\ntransaction_cost_pct = -0.001\n",
        );
        assert!(SimulationConfig::from_config(&config, VariantKind::Equity).is_err());
    }

    #[test]
    fn rejects_contradictory_stop_fraction() {
        // A stop fraction of 1.0 puts the stop at zero, at odds with any
        // positive target.
        let config = adapter("[backtest]\n[equity]\nstop_loss_pct = 1.0\n");
        assert!(SimulationConfig::from_config(&config, VariantKind::Equity).is_err());
    }

    #[test]
    fn rejects_oversized_position_fraction() {
        let config = adapter("[backtest]\n[equity]\nposition_size = 1.5\n");
        assert!(SimulationConfig::from_config(&config, VariantKind::Equity).is_err());
    }

    #[test]
    fn options_config_with_defaults() {
        let config = adapter("[backtest]\n");
        let sim = SimulationConfig::from_config(&config, VariantKind::Options).unwrap();
        assert_eq!(sim.max_positions(), 5);
        match sim.variant {
            Variant::OptionsProxy(p) => assert_eq!(p, OptionsParams::default()),
            other => panic!("expected options variant, got {other:?}"),
        }
    }

    #[test]
    fn options_rejects_positive_stop_threshold() {
        let config = adapter("[backtest]\n[options]\nstop_loss_pct = 30.0\n");
        assert!(SimulationConfig::from_config(&config, VariantKind::Options).is_err());
    }

    #[test]
    fn options_rejects_expiry_inside_exit_buffer() {
        let config = adapter("[backtest]\n[options]\nexpiry_days = 4\n");
        assert!(SimulationConfig::from_config(&config, VariantKind::Options).is_err());
    }

    #[test]
    fn futures_config_with_defaults() {
        let config = adapter("[backtest]\n");
        let sim = SimulationConfig::from_config(&config, VariantKind::Futures).unwrap();
        assert_eq!(sim.max_positions(), 1);
        let Variant::Futures(p) = sim.variant else {
            panic!("expected futures variant");
        };
        assert_eq!(p.sessions.len(), 2);
        assert_eq!(p.max_daily_losses, 3);
    }

    #[test]
    fn futures_parses_session_windows() {
        let config = adapter("[backtest]\n[futures]\nsessions = 09:30-11:00, 14:00-15:00\n");
        let sim = SimulationConfig::from_config(&config, VariantKind::Futures).unwrap();
        let Variant::Futures(p) = sim.variant else {
            panic!("expected futures variant");
        };
        assert_eq!(p.sessions.len(), 2);
        assert_eq!(p.sessions[0].start, NaiveTime::from_hms_opt(9, 30, 0).unwrap());
        assert_eq!(p.sessions[1].end, NaiveTime::from_hms_opt(15, 0, 0).unwrap());
    }

    #[test]
    fn futures_rejects_malformed_window() {
        let config = adapter("[backtest]\n[futures]\nsessions = 0915-1200\n");
        assert!(SimulationConfig::from_config(&config, VariantKind::Futures).is_err());
    }

    #[test]
    fn futures_rejects_inverted_window() {
        let config = adapter("[backtest]\n[futures]\nsessions = 12:00-09:15\n");
        assert!(SimulationConfig::from_config(&config, VariantKind::Futures).is_err());
    }

    #[test]
    fn futures_rejects_risk_outside_unit_interval() {
        let config = adapter("[backtest]\n[futures]\nrisk_pct_biased = 1.5\n");
        assert!(SimulationConfig::from_config(&config, VariantKind::Futures).is_err());
    }
}
