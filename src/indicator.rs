pub mod ma;
pub mod returns;
pub mod rolling;
pub mod volatility;

use error_stack::Report;

use crate::error::TableError;
use crate::table::{BarTable, Column};

use ma::Sma;
use returns::Return;
use volatility::RollingVolatility;

/// A derived column computed from a whole [`BarTable`].
///
/// Output is always row-aligned with the table: one cell per bar, `None`
/// where the indicator has no value yet.
pub trait Indicator: Send + Sync {
    /// Column name of the output (e.g. `"return"`, `"sma_20"`).
    fn name(&self) -> String;

    /// Number of bars needed before the first defined value.
    fn required_bars(&self) -> usize;

    fn calculate(&self, table: &BarTable) -> Result<Column, Report<TableError>>;
}

/// `return` column: `close[i] / close[i - 1] - 1`.
pub fn compute_return(table: &BarTable) -> Column {
    Column::new(Return::NAME, returns::pct_change(&table.closes()))
}

/// `volatility_<window>` column: trailing sample stddev of `close` times
/// `sqrt(window)`. Requires `window >= 2`.
pub fn compute_rolling_volatility(
    table: &BarTable,
    window: usize,
) -> Result<Column, Report<TableError>> {
    RollingVolatility::new(window)?.calculate(table)
}

/// Trailing arithmetic mean of `column` over `window` rows. Requires
/// `window >= 1` and a numeric bar column.
pub fn compute_sma(
    table: &BarTable,
    window: usize,
    column: &str,
) -> Result<Column, Report<TableError>> {
    Sma::new(window, column)?.calculate(table)
}
