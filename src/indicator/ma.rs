use error_stack::{Report, bail};

use crate::error::TableError;
use crate::indicator::Indicator;
use crate::indicator::rolling::RollingWindow;
use crate::table::{BarTable, Column, NUMERIC_COLUMNS};

/// Simple Moving Average over any numeric bar column.
pub struct Sma {
    window: usize,
    column: String,
}

impl Sma {
    pub fn new(window: usize, column: &str) -> Result<Self, Report<TableError>> {
        if window == 0 {
            bail!(TableError::InvalidParameter {
                name: "sma window must be > 0".into(),
            });
        }
        if !NUMERIC_COLUMNS.contains(&column) {
            bail!(TableError::Schema {
                field: format!("sma column {column} is not a numeric bar column"),
            });
        }
        Ok(Self {
            window,
            column: column.to_owned(),
        })
    }

    pub fn close(window: usize) -> Result<Self, Report<TableError>> {
        Self::new(window, "close")
    }

    /// Calculate SMA values from a value slice, one per input.
    pub fn calculate_values(&self, values: &[f64]) -> Vec<Option<f64>> {
        let mut rolling = RollingWindow::new(self.window);
        values
            .iter()
            .map(|&value| {
                rolling.push(value);
                rolling.mean()
            })
            .collect()
    }
}

impl Indicator for Sma {
    /// `sma_<N>` over `close`, `sma_<N>_<column>` otherwise.
    fn name(&self) -> String {
        if self.column == "close" {
            format!("sma_{}", self.window)
        } else {
            format!("sma_{}_{}", self.window, self.column)
        }
    }

    fn required_bars(&self) -> usize {
        self.window
    }

    fn calculate(&self, table: &BarTable) -> Result<Column, Report<TableError>> {
        let values = table.numeric_column(&self.column)?;
        Ok(Column::new(self.name(), self.calculate_values(&values)))
    }
}
