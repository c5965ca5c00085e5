use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Size of one aggregation window, as understood by the aggregates endpoint.
///
/// String representations match the config file format (e.g. `"minute"`, `"day"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Timespan {
    Second,
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Quarter,
    Year,
}

impl Timespan {
    /// Parse a config-format string into a `Timespan`.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "second" => Some(Self::Second),
            "minute" => Some(Self::Minute),
            "hour" => Some(Self::Hour),
            "day" => Some(Self::Day),
            "week" => Some(Self::Week),
            "month" => Some(Self::Month),
            "quarter" => Some(Self::Quarter),
            "year" => Some(Self::Year),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Second => "second",
            Self::Minute => "minute",
            Self::Hour => "hour",
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
            Self::Quarter => "quarter",
            Self::Year => "year",
        }
    }
}

impl fmt::Display for Timespan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Ordering the upstream API returns results in. The normalizer re-sorts
/// ascending regardless.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "asc" => Some(Self::Asc),
            "desc" => Some(Self::Desc),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One aggregated OHLCV record in canonical form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub symbol: String,
    /// Start of the aggregation window.
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub trading_volume: i64,
    pub transaction_count: i64,
    pub volume_weighted_average_price: f64,
}

/// A news article about a ticker, trimmed to the fields the dashboard shows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsArticle {
    pub title: String,
    pub article_url: String,
    #[serde(default)]
    pub author: Option<String>,
    pub published_utc: DateTime<Utc>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timespan_round_trip() {
        let spans = [
            ("second", Timespan::Second),
            ("minute", Timespan::Minute),
            ("hour", Timespan::Hour),
            ("day", Timespan::Day),
            ("week", Timespan::Week),
            ("month", Timespan::Month),
            ("quarter", Timespan::Quarter),
            ("year", Timespan::Year),
        ];
        for (s, span) in spans {
            assert_eq!(Timespan::from_str(s), Some(span));
            assert_eq!(span.as_str(), s);
        }
    }

    #[test]
    fn timespan_invalid_string_returns_none() {
        assert_eq!(Timespan::from_str("days"), None);
        assert_eq!(Timespan::from_str("Day"), None);
        assert_eq!(Timespan::from_str(""), None);
    }

    #[test]
    fn sort_order_parses_known_values() {
        assert_eq!(SortOrder::from_str("asc"), Some(SortOrder::Asc));
        assert_eq!(SortOrder::from_str("desc"), Some(SortOrder::Desc));
        assert_eq!(SortOrder::from_str("up"), None);
        assert_eq!(SortOrder::Desc.to_string(), "desc");
    }

    #[test]
    fn timespan_serde_uses_lowercase() {
        let json = serde_json::to_string(&Timespan::Quarter).unwrap();
        assert_eq!(json, "\"quarter\"");
        let parsed: Timespan = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, Timespan::Quarter);
    }

    #[test]
    fn news_article_tolerates_missing_optional_fields() {
        let json = r#"{
            "title": "Apple ships things",
            "article_url": "https://example.com/a",
            "published_utc": "2024-03-01T14:30:00Z"
        }"#;
        let article: NewsArticle = serde_json::from_str(json).unwrap();
        assert_eq!(article.title, "Apple ships things");
        assert!(article.author.is_none());
        assert!(article.image_url.is_none());
        assert!(article.description.is_none());
    }
}
