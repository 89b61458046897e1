//! CSV report adapter: writes the trade ledger and valuation history.

use crate::domain::engine::BacktestResult;
use crate::domain::error::SignalsimError;
use crate::domain::metrics::Metrics;
use crate::ports::report_port::ReportPort;
use std::fs;
use std::path::Path;

pub struct CsvReportAdapter;

impl CsvReportAdapter {
    pub fn new() -> Self {
        CsvReportAdapter
    }
}

impl Default for CsvReportAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportPort for CsvReportAdapter {
    fn write(
        &self,
        result: &BacktestResult,
        _metrics: &Metrics,
        output_dir: &Path,
    ) -> Result<(), SignalsimError> {
        fs::create_dir_all(output_dir)?;

        let trades_path = output_dir.join("trades.csv");
        let mut wtr = csv::Writer::from_path(&trades_path).map_err(|e| SignalsimError::Data {
            reason: format!("failed to open {}: {}", trades_path.display(), e),
        })?;
        wtr.write_record([
            "symbol",
            "direction",
            "entry_time",
            "entry_price",
            "exit_time",
            "exit_price",
            "quantity",
            "pnl",
            "pnl_pct",
            "duration_days",
            "exit_reason",
        ])
        .map_err(csv_error)?;
        for trade in result.ledger.closed_trades() {
            let duration_days = trade.duration.num_seconds() as f64 / 86_400.0;
            wtr.write_record([
                trade.symbol.clone(),
                trade.direction.to_string(),
                trade.entry_time.to_string(),
                format!("{:.6}", trade.entry_price),
                trade.exit_time.to_string(),
                format!("{:.6}", trade.exit_price),
                format!("{:.6}", trade.quantity),
                format!("{:.6}", trade.pnl),
                format!("{:.6}", trade.pnl_pct),
                format!("{:.4}", duration_days),
                trade.exit_reason.to_string(),
            ])
            .map_err(csv_error)?;
        }
        wtr.flush()?;

        let valuations_path = output_dir.join("valuations.csv");
        let mut wtr =
            csv::Writer::from_path(&valuations_path).map_err(|e| SignalsimError::Data {
                reason: format!("failed to open {}: {}", valuations_path.display(), e),
            })?;
        wtr.write_record([
            "timestamp",
            "cash",
            "positions_value",
            "total_value",
            "open_positions",
        ])
        .map_err(csv_error)?;
        for record in result.ledger.valuations() {
            wtr.write_record([
                record.timestamp.to_string(),
                format!("{:.6}", record.cash),
                format!("{:.6}", record.positions_value),
                format!("{:.6}", record.total_value),
                record.open_positions.to_string(),
            ])
            .map_err(csv_error)?;
        }
        wtr.flush()?;

        Ok(())
    }
}

fn csv_error(e: csv::Error) -> SignalsimError {
    SignalsimError::Data {
        reason: format!("CSV write error: {}", e),
    }
}
