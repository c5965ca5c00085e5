use serde::Serialize;

use crate::table::BarTable;

/// Descriptive statistics shown next to the price chart.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Summary {
    pub rows: usize,
    pub mean_open: Option<f64>,
    pub std_open: Option<f64>,
    pub mean_close: Option<f64>,
    pub std_close: Option<f64>,
}

pub fn summarize(table: &BarTable) -> Summary {
    let opens: Vec<f64> = table.bars().iter().map(|b| b.open).collect();
    let closes = table.closes();
    Summary {
        rows: table.len(),
        mean_open: mean(&opens),
        std_open: sample_std(&opens),
        mean_close: mean(&closes),
        std_close: sample_std(&closes),
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let mean = mean(values)?;
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(variance.sqrt())
}
