use error_stack::Report;

use crate::error::TableError;
use crate::indicator::Indicator;
use crate::table::{BarTable, Column};

/// One-period fractional change of `close`.
pub struct Return;

impl Return {
    pub const NAME: &'static str = "return";
}

impl Indicator for Return {
    fn name(&self) -> String {
        Self::NAME.into()
    }

    fn required_bars(&self) -> usize {
        2
    }

    fn calculate(&self, table: &BarTable) -> Result<Column, Report<TableError>> {
        Ok(Column::new(Self::NAME, pct_change(&table.closes())))
    }
}

/// `values[i] / values[i - 1] - 1`, `None` for the first row and wherever the
/// ratio is not finite (zero previous value).
pub fn pct_change(values: &[f64]) -> Vec<Option<f64>> {
    let mut output = Vec::with_capacity(values.len());
    if values.is_empty() {
        return output;
    }
    output.push(None);
    output.extend(values.windows(2).map(|pair| {
        let (previous, current) = (pair[0], pair[1]);
        if previous == 0.0 {
            return None;
        }
        let change = current / previous - 1.0;
        change.is_finite().then_some(change)
    }));
    output
}
