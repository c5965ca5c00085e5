use error_stack::{Report, bail};

use crate::error::TableError;
use crate::indicator::Indicator;
use crate::indicator::rolling::RollingWindow;
use crate::table::{BarTable, Column};

/// Rolling sample standard deviation of `close`, scaled by `sqrt(window)`.
///
/// This is the dashboard's dispersion measure, not a log-return volatility
/// estimator.
pub struct RollingVolatility {
    window: usize,
}

impl RollingVolatility {
    pub fn new(window: usize) -> Result<Self, Report<TableError>> {
        if window < 2 {
            bail!(TableError::InvalidParameter {
                name: format!("volatility window must be >= 2, got {window}"),
            });
        }
        Ok(Self { window })
    }

    pub fn calculate_prices(&self, prices: &[f64]) -> Vec<Option<f64>> {
        let scale = (self.window as f64).sqrt();
        let mut rolling = RollingWindow::new(self.window);
        prices
            .iter()
            .map(|&price| {
                rolling.push(price);
                rolling.sample_variance().map(|v| v.sqrt() * scale)
            })
            .collect()
    }
}

impl Indicator for RollingVolatility {
    fn name(&self) -> String {
        format!("volatility_{}", self.window)
    }

    fn required_bars(&self) -> usize {
        self.window
    }

    fn calculate(&self, table: &BarTable) -> Result<Column, Report<TableError>> {
        Ok(Column::new(self.name(), self.calculate_prices(&table.closes())))
    }
}
