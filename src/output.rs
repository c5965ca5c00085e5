use std::io::{self, Write};

use serde::Serialize;

use crate::model::NewsArticle;
use crate::table::IndicatorRow;

/// One JSON line on stdout. The `"type"` tag tells bars and news apart in the
/// shared stream.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Record<'a> {
    Bar(IndicatorRow<'a>),
    News(&'a NewsArticle),
}

pub fn write_json_lines<'a>(
    out: &mut impl Write,
    records: impl IntoIterator<Item = Record<'a>>,
) -> io::Result<()> {
    for record in records {
        serde_json::to_writer(&mut *out, &record)?;
        writeln!(out)?;
    }
    Ok(())
}
