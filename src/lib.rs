//! Stock bar normalization and technical indicators.
//!
//! Raw aggregate records go through [`normalize::normalize`] into a
//! time-ordered [`table::BarTable`]; the indicator functions in [`indicator`]
//! derive row-aligned columns from it, and [`table::merge`] joins them into an
//! [`table::IndicatorTable`].

pub mod analysis;
pub mod config;
pub mod error;
pub mod indicator;
pub mod model;
pub mod normalize;
pub mod output;
pub mod polygon;
pub mod summary;
pub mod table;
