use std::collections::HashSet;

use error_stack::{Report, bail};
use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::error::TableError;
use crate::model::Bar;

/// Canonical column names of a [`BarTable`], in presentation order.
pub const BAR_COLUMNS: &[&str] = &[
    "symbol",
    "timestamp",
    "open",
    "high",
    "low",
    "close",
    "trading_volume",
    "transaction_count",
    "volume_weighted_average_price",
];

/// The subset of [`BAR_COLUMNS`] an indicator may read as `f64`.
pub const NUMERIC_COLUMNS: &[&str] = &[
    "open",
    "high",
    "low",
    "close",
    "trading_volume",
    "transaction_count",
    "volume_weighted_average_price",
];

/// Bars for a single symbol, sorted ascending by timestamp.
///
/// Every indicator is position based, so the ordering is established once
/// here and never re-checked downstream.
#[derive(Debug, Clone, PartialEq)]
pub struct BarTable {
    symbol: String,
    bars: Vec<Bar>,
}

impl BarTable {
    /// Build a table, upper-casing `symbol` onto every bar and stable-sorting
    /// by timestamp so equal timestamps keep their input order.
    pub fn from_bars(symbol: &str, mut bars: Vec<Bar>) -> Self {
        let symbol = symbol.to_uppercase();
        for bar in &mut bars {
            bar.symbol.clone_from(&symbol);
        }
        bars.sort_by_key(|bar| bar.timestamp);
        Self { symbol, bars }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    /// Read a numeric column by canonical name. Integer columns are widened
    /// to `f64`.
    pub fn numeric_column(&self, name: &str) -> Result<Vec<f64>, Report<TableError>> {
        let extract: fn(&Bar) -> f64 = match name {
            "open" => |b| b.open,
            "high" => |b| b.high,
            "low" => |b| b.low,
            "close" => |b| b.close,
            "trading_volume" => |b| b.trading_volume as f64,
            "transaction_count" => |b| b.transaction_count as f64,
            "volume_weighted_average_price" => |b| b.volume_weighted_average_price,
            _ if BAR_COLUMNS.contains(&name) => bail!(TableError::Schema {
                field: format!("column {name} is not numeric"),
            }),
            _ => bail!(TableError::Schema {
                field: format!("column {name} does not exist"),
            }),
        };
        Ok(self.bars.iter().map(extract).collect())
    }
}

/// A named derived column, one cell per table row. `None` marks a cell that
/// cannot be computed (not enough history, zero divisor).
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    name: String,
    values: Vec<Option<f64>>,
}

impl Column {
    pub fn new(name: impl Into<String>, values: Vec<Option<f64>>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn values(&self) -> &[Option<f64>] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, row: usize) -> Option<f64> {
        self.values.get(row).copied().flatten()
    }
}

/// A [`BarTable`] with derived columns appended, row-aligned by position.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorTable {
    bars: BarTable,
    columns: Vec<Column>,
}

impl IndicatorTable {
    pub fn bars(&self) -> &BarTable {
        &self.bars
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// All column names: the bar columns followed by the derived ones.
    pub fn column_names(&self) -> Vec<&str> {
        BAR_COLUMNS
            .iter()
            .copied()
            .chain(self.columns.iter().map(|c| c.name.as_str()))
            .collect()
    }

    pub fn rows(&self) -> impl Iterator<Item = IndicatorRow<'_>> {
        self.bars
            .bars()
            .iter()
            .enumerate()
            .map(|(index, bar)| IndicatorRow {
                bar,
                index,
                columns: &self.columns,
            })
    }
}

/// Horizontally concatenate derived columns onto `table`.
///
/// Every column must have exactly `table.len()` cells, and names must be
/// unique across the bar columns and the derived ones.
pub fn merge(table: &BarTable, columns: Vec<Column>) -> Result<IndicatorTable, Report<TableError>> {
    let mut seen: HashSet<&str> = BAR_COLUMNS.iter().copied().collect();
    for column in &columns {
        if column.len() != table.len() {
            bail!(TableError::LengthMismatch {
                column: column.name.clone(),
                expected: table.len(),
                actual: column.len(),
            });
        }
        if !seen.insert(column.name.as_str()) {
            bail!(TableError::Schema {
                field: format!("duplicate column name {}", column.name),
            });
        }
    }

    Ok(IndicatorTable {
        bars: table.clone(),
        columns,
    })
}

/// Borrowed view of one [`IndicatorTable`] row. Serializes as a flat map in
/// column order with undefined cells as `null`.
#[derive(Debug, Clone, Copy)]
pub struct IndicatorRow<'a> {
    bar: &'a Bar,
    index: usize,
    columns: &'a [Column],
}

impl<'a> IndicatorRow<'a> {
    pub fn bar(&self) -> &'a Bar {
        self.bar
    }

    pub fn value(&self, column: &str) -> Option<f64> {
        self.columns
            .iter()
            .find(|c| c.name == column)
            .and_then(|c| c.get(self.index))
    }
}

impl Serialize for IndicatorRow<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let bar = self.bar;
        let mut map = serializer.serialize_map(Some(BAR_COLUMNS.len() + self.columns.len()))?;
        map.serialize_entry("symbol", &bar.symbol)?;
        map.serialize_entry("timestamp", &bar.timestamp)?;
        map.serialize_entry("open", &bar.open)?;
        map.serialize_entry("high", &bar.high)?;
        map.serialize_entry("low", &bar.low)?;
        map.serialize_entry("close", &bar.close)?;
        map.serialize_entry("trading_volume", &bar.trading_volume)?;
        map.serialize_entry("transaction_count", &bar.transaction_count)?;
        map.serialize_entry(
            "volume_weighted_average_price",
            &bar.volume_weighted_average_price,
        )?;
        for column in self.columns {
            map.serialize_entry(&column.name, &column.get(self.index))?;
        }
        map.end()
    }
}
