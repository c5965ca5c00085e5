use error_stack::Report;
use tracing::debug;

use crate::config::IndicatorConfig;
use crate::error::TableError;
use crate::indicator::Indicator;
use crate::indicator::ma::Sma;
use crate::indicator::returns::Return;
use crate::indicator::volatility::RollingVolatility;
use crate::table::{BarTable, IndicatorTable, merge};

/// Build the dashboard's indicator set: return, rolling volatility, SMA.
///
/// Parameters are checked before any column is computed.
pub fn build_indicators(
    settings: &IndicatorConfig,
) -> Result<Vec<Box<dyn Indicator>>, Report<TableError>> {
    Ok(vec![
        Box::new(Return) as Box<dyn Indicator>,
        Box::new(RollingVolatility::new(settings.volatility_window)?),
        Box::new(Sma::new(settings.sma_window, &settings.sma_column)?),
    ])
}

/// Compute every configured indicator on `table` and merge them onto it.
pub fn analyze(
    table: &BarTable,
    settings: &IndicatorConfig,
) -> Result<IndicatorTable, Report<TableError>> {
    let indicators = build_indicators(settings)?;
    let columns = indicators
        .iter()
        .map(|indicator| indicator.calculate(table))
        .collect::<Result<Vec<_>, _>>()?;

    let warmup = indicators
        .iter()
        .map(|i| i.required_bars())
        .max()
        .unwrap_or(0);
    if table.len() < warmup {
        debug!(
            symbol = table.symbol(),
            rows = table.len(),
            warmup,
            "table shorter than the longest indicator window"
        );
    }

    let merged = merge(table, columns)?;
    debug!(
        symbol = table.symbol(),
        rows = merged.len(),
        columns = ?merged.column_names(),
        "indicator table built"
    );
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::{RawBar, normalize};
    use serde_json::{Value, json};

    fn raw_records(closes: &[f64]) -> Vec<RawBar> {
        closes
            .iter()
            .enumerate()
            .rev()
            .map(|(i, &c)| {
                let t = 1_704_067_200_000_i64 + i as i64 * 86_400_000;
                match json!({ "t": t, "o": c, "h": c, "l": c, "c": c, "v": 1_000, "n": 10, "vw": c }) {
                    Value::Object(map) => map,
                    _ => unreachable!(),
                }
            })
            .collect()
    }

    fn settings(volatility_window: usize, sma_window: usize, sma_column: &str) -> IndicatorConfig {
        IndicatorConfig {
            volatility_window,
            sma_window,
            sma_column: sma_column.into(),
        }
    }

    #[test]
    fn default_set_column_order() {
        let table = normalize(&raw_records(&[1.0, 2.0, 3.0]), "aapl").unwrap();
        let result = analyze(&table, &settings(5, 20, "close")).unwrap();
        let names: Vec<&str> = result.columns().iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["return", "volatility_5", "sma_20"]);
    }

    #[test]
    fn pipeline_end_to_end() {
        // records arrive newest first, as with sort=desc
        let table = normalize(&raw_records(&[1.0, 2.0, 3.0, 4.0, 5.0]), "aapl").unwrap();
        let result = analyze(&table, &settings(2, 3, "close")).unwrap();
        assert_eq!(result.len(), 5);
        assert_eq!(
            result.column("sma_3").unwrap().values(),
            &[None, None, Some(2.0), Some(3.0), Some(4.0)]
        );
        let returns = result.column("return").unwrap();
        assert_eq!(returns.get(0), None);
        assert!((returns.get(1).unwrap() - 1.0).abs() < 1e-9);
        // stddev of two points one apart, times sqrt(2)
        let vol = result.column("volatility_2").unwrap();
        assert!((vol.get(4).unwrap() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn invalid_window_fails_before_computing() {
        let table = normalize(&raw_records(&[1.0, 2.0]), "aapl").unwrap();
        let err = analyze(&table, &settings(1, 3, "close")).unwrap_err();
        assert!(matches!(
            err.current_context(),
            TableError::InvalidParameter { .. }
        ));
    }

    #[test]
    fn empty_table_analyzes_to_empty() {
        let table = normalize(&[], "aapl").unwrap();
        let result = analyze(&table, &settings(5, 20, "close")).unwrap();
        assert!(result.is_empty());
        assert_eq!(result.columns().len(), 3);
        assert!(result.columns().iter().all(|c| c.is_empty()));
    }
}
