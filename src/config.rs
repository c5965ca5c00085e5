use std::path::Path;

use chrono::NaiveDate;
use error_stack::{Report, ResultExt};
use serde::Deserialize;

use crate::error::ConfigError;
use crate::model::{SortOrder, Timespan};
use crate::table::NUMERIC_COLUMNS;

/// Largest page the aggregates endpoint serves.
pub const MAX_AGGREGATES_LIMIT: u32 = 50_000;
pub const MAX_NEWS_LIMIT: u32 = 1_000;

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "text".into()
}

fn default_base_url() -> String {
    "https://api.polygon.io".into()
}

fn default_api_key_env() -> String {
    "POLYGON_API_KEY".into()
}

fn default_requests_per_minute() -> u32 {
    5
}

fn default_timespan() -> String {
    "day".into()
}

fn default_multiplier() -> u32 {
    1
}

fn default_sort() -> String {
    "desc".into()
}

fn default_limit() -> u32 {
    MAX_AGGREGATES_LIMIT
}

fn default_volatility_window() -> usize {
    5
}

fn default_sma_window() -> usize {
    20
}

fn default_sma_column() -> String {
    "close".into()
}

fn default_news_limit() -> u32 {
    10
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub polygon: PolygonConfig,
    pub request: RequestConfig,
    #[serde(default)]
    pub indicators: IndicatorConfig,
    #[serde(default)]
    pub news: NewsConfig,
}

#[derive(Debug, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Accepted values: `"text"` | `"json"`
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PolygonConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Name of the environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: u32,
}

impl Default for PolygonConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            requests_per_minute: default_requests_per_minute(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RequestConfig {
    pub symbol: String,
    #[serde(default = "default_timespan")]
    pub timespan: String,
    #[serde(default = "default_multiplier")]
    pub multiplier: u32,
    pub from: NaiveDate,
    pub to: NaiveDate,
    #[serde(default = "default_true")]
    pub adjusted: bool,
    /// Accepted values: `"asc"` | `"desc"`
    #[serde(default = "default_sort")]
    pub sort: String,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IndicatorConfig {
    #[serde(default = "default_volatility_window")]
    pub volatility_window: usize,
    #[serde(default = "default_sma_window")]
    pub sma_window: usize,
    #[serde(default = "default_sma_column")]
    pub sma_column: String,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            volatility_window: default_volatility_window(),
            sma_window: default_sma_window(),
            sma_column: default_sma_column(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct NewsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_news_limit")]
    pub limit: u32,
}

impl Default for NewsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            limit: default_news_limit(),
        }
    }
}

/// Load and validate an `AppConfig` from a TOML file at `path`.
pub fn load(path: &Path) -> Result<AppConfig, Report<ConfigError>> {
    let content = std::fs::read_to_string(path)
        .change_context(ConfigError::ReadFile)
        .attach_with(|| format!("path: {}", path.display()))?;

    parse(&content).attach_with(|| format!("path: {}", path.display()))
}

/// Parse and validate an `AppConfig` from TOML text.
pub fn parse(content: &str) -> Result<AppConfig, Report<ConfigError>> {
    let config: AppConfig = toml::from_str(content).change_context(ConfigError::Parse {
        reason: "invalid TOML syntax or schema mismatch".into(),
    })?;

    validate(&config)?;

    Ok(config)
}

fn invalid(field: String) -> Report<ConfigError> {
    Report::new(ConfigError::Validation { field })
}

pub fn validate(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    validate_request(&config.request)?;
    validate_indicators(&config.indicators)?;
    validate_polygon(&config.polygon)?;
    validate_news(&config.news)?;
    Ok(())
}

fn validate_request(request: &RequestConfig) -> Result<(), Report<ConfigError>> {
    let symbol = request.symbol.trim();
    if symbol.is_empty() {
        return Err(invalid("request.symbol must not be empty".into()));
    }
    if symbol.contains(|c: char| c.is_whitespace() || c == '/' || c == '?' || c == '&') {
        return Err(invalid(format!(
            "request.symbol \"{}\" contains characters not allowed in a ticker",
            request.symbol
        )));
    }
    if Timespan::from_str(&request.timespan).is_none() {
        return Err(invalid(format!(
            "request.timespan: unknown timespan \"{}\"",
            request.timespan
        )));
    }
    if SortOrder::from_str(&request.sort).is_none() {
        return Err(invalid(format!(
            "request.sort: expected \"asc\" or \"desc\", got \"{}\"",
            request.sort
        )));
    }
    if request.multiplier == 0 {
        return Err(invalid("request.multiplier must be >= 1".into()));
    }
    if request.limit == 0 || request.limit > MAX_AGGREGATES_LIMIT {
        return Err(invalid(format!(
            "request.limit must be within 1..={MAX_AGGREGATES_LIMIT}, got {}",
            request.limit
        )));
    }
    if request.from > request.to {
        return Err(invalid(format!(
            "request.from ({}) is after request.to ({})",
            request.from, request.to
        )));
    }
    Ok(())
}

fn validate_indicators(indicators: &IndicatorConfig) -> Result<(), Report<ConfigError>> {
    if indicators.volatility_window < 2 {
        return Err(invalid(format!(
            "indicators.volatility_window must be >= 2, got {}",
            indicators.volatility_window
        )));
    }
    if indicators.sma_window == 0 {
        return Err(invalid("indicators.sma_window must be >= 1".into()));
    }
    if !NUMERIC_COLUMNS.contains(&indicators.sma_column.as_str()) {
        return Err(invalid(format!(
            "indicators.sma_column \"{}\" is not a numeric bar column",
            indicators.sma_column
        )));
    }
    Ok(())
}

fn validate_polygon(polygon: &PolygonConfig) -> Result<(), Report<ConfigError>> {
    if polygon.requests_per_minute == 0 {
        return Err(invalid("polygon.requests_per_minute must be >= 1".into()));
    }
    if polygon.api_key_env.is_empty() {
        return Err(invalid("polygon.api_key_env must not be empty".into()));
    }
    Ok(())
}

fn validate_news(news: &NewsConfig) -> Result<(), Report<ConfigError>> {
    if news.limit == 0 || news.limit > MAX_NEWS_LIMIT {
        return Err(invalid(format!(
            "news.limit must be within 1..={MAX_NEWS_LIMIT}, got {}",
            news.limit
        )));
    }
    Ok(())
}
