//! Report output port trait.

use crate::domain::engine::BacktestResult;
use crate::domain::error::SignalsimError;
use crate::domain::metrics::Metrics;
use std::path::Path;

/// Port for writing run artifacts (trade ledger, valuation history).
pub trait ReportPort {
    fn write(
        &self,
        result: &BacktestResult,
        metrics: &Metrics,
        output_dir: &Path,
    ) -> Result<(), SignalsimError>;
}
