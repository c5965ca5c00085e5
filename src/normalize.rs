use chrono::DateTime;
use error_stack::{Report, ResultExt, bail};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::TableError;
use crate::model::Bar;
use crate::table::BarTable;

/// One loosely-typed bar record as decoded from the upstream `results` array.
pub type RawBar = Map<String, Value>;

// Upstream key -> canonical column name.
const TIMESTAMP: (&str, &str) = ("t", "timestamp");
const OPEN: (&str, &str) = ("o", "open");
const HIGH: (&str, &str) = ("h", "high");
const LOW: (&str, &str) = ("l", "low");
const CLOSE: (&str, &str) = ("c", "close");
const VOLUME: (&str, &str) = ("v", "trading_volume");
const TRANSACTIONS: (&str, &str) = ("n", "transaction_count");
const VWAP: (&str, &str) = ("vw", "volume_weighted_average_price");

/// Validate raw records and build a [`BarTable`] for `symbol`.
///
/// Every record is fully checked before any bar is constructed; the first
/// record with a missing or mistyped field fails the whole call. The result is
/// sorted ascending by timestamp with ties kept in input order.
pub fn normalize(raw_records: &[RawBar], symbol: &str) -> Result<BarTable, Report<TableError>> {
    let bars = raw_records
        .iter()
        .enumerate()
        .map(|(row, raw)| parse_bar(raw).attach_with(|| format!("row: {row}")))
        .collect::<Result<Vec<_>, _>>()?;

    let table = BarTable::from_bars(symbol, bars);
    debug!(symbol = table.symbol(), rows = table.len(), "normalized bars");
    Ok(table)
}

impl BarTable {
    /// Re-serialize into the upstream record shape. Feeding the output back
    /// through [`normalize`] reproduces this table.
    pub fn to_raw_records(&self) -> Vec<RawBar> {
        self.bars()
            .iter()
            .map(|bar| {
                let mut raw = RawBar::new();
                raw.insert(TIMESTAMP.0.into(), bar.timestamp.timestamp_millis().into());
                raw.insert(OPEN.0.into(), bar.open.into());
                raw.insert(HIGH.0.into(), bar.high.into());
                raw.insert(LOW.0.into(), bar.low.into());
                raw.insert(CLOSE.0.into(), bar.close.into());
                raw.insert(VOLUME.0.into(), bar.trading_volume.into());
                raw.insert(TRANSACTIONS.0.into(), bar.transaction_count.into());
                raw.insert(VWAP.0.into(), bar.volume_weighted_average_price.into());
                raw
            })
            .collect()
    }
}

fn parse_bar(raw: &RawBar) -> Result<Bar, Report<TableError>> {
    let millis = integer_field(raw, TIMESTAMP)?;
    let Some(timestamp) = DateTime::from_timestamp_millis(millis) else {
        bail!(TableError::Schema {
            field: format!("{} {millis} is out of range", TIMESTAMP.1),
        });
    };

    Ok(Bar {
        // Overwritten by BarTable::from_bars.
        symbol: String::new(),
        timestamp,
        open: float_field(raw, OPEN)?,
        high: float_field(raw, HIGH)?,
        low: float_field(raw, LOW)?,
        close: float_field(raw, CLOSE)?,
        trading_volume: count_field(raw, VOLUME)?,
        transaction_count: count_field(raw, TRANSACTIONS)?,
        volume_weighted_average_price: float_field(raw, VWAP)?,
    })
}

fn required<'a>(raw: &'a RawBar, (key, name): (&str, &str)) -> Result<&'a Value, Report<TableError>> {
    match raw.get(key) {
        Some(value) if !value.is_null() => Ok(value),
        _ => bail!(TableError::Schema {
            field: format!("missing field {name} (key \"{key}\")"),
        }),
    }
}

fn float_field(raw: &RawBar, field: (&str, &str)) -> Result<f64, Report<TableError>> {
    match required(raw, field)?.as_f64() {
        Some(value) => Ok(value),
        None => bail!(TableError::Schema {
            field: format!("{} is not numeric", field.1),
        }),
    }
}

/// Integers may arrive as JSON floats; they are truncated toward zero.
fn integer_field(raw: &RawBar, field: (&str, &str)) -> Result<i64, Report<TableError>> {
    let value = required(raw, field)?;
    if let Some(int) = value.as_i64() {
        return Ok(int);
    }
    match value.as_f64() {
        Some(float) if float.is_finite() && float.abs() < i64::MAX as f64 => Ok(float.trunc() as i64),
        _ => bail!(TableError::Schema {
            field: format!("{} is not an integer", field.1),
        }),
    }
}

fn count_field(raw: &RawBar, field: (&str, &str)) -> Result<i64, Report<TableError>> {
    let count = integer_field(raw, field)?;
    if count < 0 {
        bail!(TableError::Schema {
            field: format!("{} must be non-negative, got {count}", field.1),
        });
    }
    Ok(count)
}
