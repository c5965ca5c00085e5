use std::num::NonZeroU32;
use std::sync::Arc;

use chrono::NaiveDate;
use error_stack::{Report, ResultExt};
use futures::future::BoxFuture;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use nonzero_ext::nonzero;
use reqwest::StatusCode;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{info, warn};

use crate::config::{PolygonConfig, RequestConfig};
use crate::error::{ConfigError, FetchError};
use crate::model::{NewsArticle, SortOrder, Timespan};
use crate::normalize::RawBar;

const AGGREGATES: &str = "polygon aggregates";
const NEWS: &str = "polygon news";

/// Parameters of one aggregates (bars) request.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatesRequest {
    pub symbol: String,
    pub timespan: Timespan,
    pub multiplier: u32,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub adjusted: bool,
    pub sort: SortOrder,
    pub limit: u32,
}

impl AggregatesRequest {
    pub fn from_config(request: &RequestConfig) -> Result<Self, Report<ConfigError>> {
        let timespan = Timespan::from_str(&request.timespan).ok_or_else(|| {
            Report::new(ConfigError::Validation {
                field: format!("request.timespan: unknown timespan \"{}\"", request.timespan),
            })
        })?;
        let sort = SortOrder::from_str(&request.sort).ok_or_else(|| {
            Report::new(ConfigError::Validation {
                field: format!("request.sort: unknown sort order \"{}\"", request.sort),
            })
        })?;

        Ok(Self {
            symbol: request.symbol.trim().to_uppercase(),
            timespan,
            multiplier: request.multiplier,
            from: request.from,
            to: request.to,
            adjusted: request.adjusted,
            sort,
            limit: request.limit,
        })
    }

    fn path(&self) -> String {
        format!(
            "/v2/aggs/ticker/{}/range/{}/{}/{}/{}",
            self.symbol, self.multiplier, self.timespan, self.from, self.to
        )
    }

    fn query(&self) -> Vec<(&'static str, String)> {
        vec![
            ("adjusted", self.adjusted.to_string()),
            ("sort", self.sort.to_string()),
            ("limit", self.limit.to_string()),
        ]
    }
}

/// Parameters of one ticker-news request. Both dates are inclusive.
#[derive(Debug, Clone, PartialEq)]
pub struct NewsRequest {
    pub symbol: String,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub order: SortOrder,
    pub sort_field: String,
    pub limit: u32,
}

impl NewsRequest {
    /// Newest articles first, sorted by publication time.
    pub fn new(symbol: &str, from: NaiveDate, to: NaiveDate, limit: u32) -> Self {
        Self {
            symbol: symbol.trim().to_uppercase(),
            from,
            to,
            order: SortOrder::Desc,
            sort_field: "published_utc".into(),
            limit,
        }
    }

    fn query(&self) -> Vec<(&'static str, String)> {
        vec![
            ("ticker", self.symbol.clone()),
            ("order", self.order.to_string()),
            ("limit", self.limit.to_string()),
            ("sort", self.sort_field.clone()),
            ("published_utc.gte", self.from.to_string()),
            ("published_utc.lte", self.to.to_string()),
        ]
    }
}

/// Source of raw bar records and news.
///
/// Uses `BoxFuture` so the trait stays object-safe (`dyn MarketData`).
pub trait MarketData: Send + Sync {
    /// Fetch raw aggregate records in the upstream key shape, unvalidated.
    fn fetch_aggregates(
        &self,
        request: &AggregatesRequest,
    ) -> BoxFuture<'_, Result<Vec<RawBar>, Report<FetchError>>>;

    fn fetch_news(
        &self,
        request: &NewsRequest,
    ) -> BoxFuture<'_, Result<Vec<NewsArticle>, Report<FetchError>>>;
}

pub struct PolygonClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    rate_limiter: Arc<DefaultDirectRateLimiter>,
}

impl PolygonClient {
    pub fn new(base_url: &str, api_key: String, requests_per_minute: NonZeroU32) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_owned(),
            api_key,
            rate_limiter: Arc::new(RateLimiter::direct(Quota::per_minute(requests_per_minute))),
        }
    }

    /// Build a client, reading the API key from the configured environment
    /// variable.
    pub fn from_config(config: &PolygonConfig) -> Result<Self, Report<FetchError>> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                Report::new(FetchError::MissingApiKey {
                    var: config.api_key_env.clone(),
                })
            })?;
        // Free-tier allowance when unset
        let rate = NonZeroU32::new(config.requests_per_minute).unwrap_or(nonzero!(5u32));
        Ok(Self::new(&config.base_url, api_key, rate))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        path: &str,
        query: &[(&'static str, String)],
    ) -> Result<T, Report<FetchError>> {
        // Wait for rate limiter before making the request
        self.rate_limiter.until_ready().await;

        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .query(query)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .change_context(FetchError::Request {
                endpoint: endpoint.into(),
            })
            .attach_with(|| format!("url: {url}"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(rejection(endpoint, status, &body));
        }

        response
            .json::<T>()
            .await
            .change_context(FetchError::ResponseParse {
                endpoint: endpoint.into(),
            })
    }
}

impl MarketData for PolygonClient {
    fn fetch_aggregates(
        &self,
        request: &AggregatesRequest,
    ) -> BoxFuture<'_, Result<Vec<RawBar>, Report<FetchError>>> {
        let request = request.clone();
        Box::pin(async move {
            info!(
                symbol = %request.symbol,
                timespan = %request.timespan,
                multiplier = request.multiplier,
                from = %request.from,
                to = %request.to,
                "fetching aggregates"
            );

            let body: AggregatesResponse = self
                .get_json(AGGREGATES, &request.path(), &request.query())
                .await?;
            let records = body.into_records()?;

            info!(symbol = %request.symbol, fetched = records.len(), "aggregates fetch complete");
            Ok(records)
        })
    }

    fn fetch_news(
        &self,
        request: &NewsRequest,
    ) -> BoxFuture<'_, Result<Vec<NewsArticle>, Report<FetchError>>> {
        let request = request.clone();
        Box::pin(async move {
            info!(symbol = %request.symbol, limit = request.limit, "fetching news");

            let body: NewsResponse = self
                .get_json(NEWS, "/v2/reference/news", &request.query())
                .await?;
            let articles = body.into_articles()?;

            info!(symbol = %request.symbol, fetched = articles.len(), "news fetch complete");
            Ok(articles)
        })
    }
}

// ── Response types ───────────────────────────────────────────────────────────

/// `{ "status": "OK", "results": [ { "t": ..., "o": ... }, ... ] }`
///
/// `results` is omitted entirely when the range holds no bars.
#[derive(Debug, Deserialize)]
struct AggregatesResponse {
    status: String,
    #[serde(default)]
    results: Vec<RawBar>,
    #[serde(default)]
    error: Option<String>,
}

impl AggregatesResponse {
    fn into_records(self) -> Result<Vec<RawBar>, Report<FetchError>> {
        check_status(AGGREGATES, &self.status, self.error.as_deref())?;
        Ok(self.results)
    }
}

#[derive(Debug, Deserialize)]
struct NewsResponse {
    status: String,
    #[serde(default)]
    results: Vec<NewsArticle>,
    #[serde(default)]
    error: Option<String>,
}

impl NewsResponse {
    fn into_articles(self) -> Result<Vec<NewsArticle>, Report<FetchError>> {
        check_status(NEWS, &self.status, self.error.as_deref())?;
        Ok(self.results)
    }
}

fn check_status(
    endpoint: &str,
    status: &str,
    message: Option<&str>,
) -> Result<(), Report<FetchError>> {
    match status {
        "ERROR" | "NOT_AUTHORIZED" => Err(status_error(endpoint, status, message)),
        "OK" => Ok(()),
        other => {
            // DELAYED and friends still carry usable data
            warn!(endpoint, status = other, "non-OK status from upstream");
            Ok(())
        }
    }
}

fn status_error(endpoint: &str, status: &str, message: Option<&str>) -> Report<FetchError> {
    let report = Report::new(FetchError::Status {
        endpoint: endpoint.into(),
        status: status.into(),
    });
    match message {
        Some(message) => report.attach(message.to_owned()),
        None => report,
    }
}

/// Body of a 4xx/5xx reply, e.g.
/// `{ "status": "NOT_AUTHORIZED", "message": "Unknown API Key" }`.
/// Every field is optional; gateways in front of the API may send HTML.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Build the report for a non-2xx reply, keeping the upstream explanation
/// when the body carries one.
fn rejection(endpoint: &str, http_status: StatusCode, body: &str) -> Report<FetchError> {
    let body: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    let message = body.error.or(body.message);

    let report = match body.status.as_deref() {
        Some(status @ ("ERROR" | "NOT_AUTHORIZED")) => {
            status_error(endpoint, status, message.as_deref())
        }
        _ => {
            let report = Report::new(FetchError::Request {
                endpoint: endpoint.into(),
            });
            match message {
                Some(message) => report.attach(message),
                None => report,
            }
        }
    };
    report.attach(format!("HTTP status: {http_status}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_request() -> AggregatesRequest {
        AggregatesRequest {
            symbol: "AAPL".into(),
            timespan: Timespan::Hour,
            multiplier: 5,
            from: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            to: NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
            adjusted: true,
            sort: SortOrder::Desc,
            limit: 50_000,
        }
    }

    #[test]
    fn aggregates_path_and_query() {
        let request = sample_request();
        assert_eq!(
            request.path(),
            "/v2/aggs/ticker/AAPL/range/5/hour/2024-01-01/2024-12-31"
        );
        assert_eq!(
            request.query(),
            vec![
                ("adjusted", "true".to_string()),
                ("sort", "desc".to_string()),
                ("limit", "50000".to_string()),
            ]
        );
    }

    #[test]
    fn aggregates_request_from_config_uppercases_symbol() {
        let config = crate::config::parse(
            r#"
[request]
symbol = "tsla"
timespan = "minute"
multiplier = 15
from = "2024-06-01"
to = "2024-06-30"
sort = "asc"
"#,
        )
        .unwrap();
        let request = AggregatesRequest::from_config(&config.request).unwrap();
        assert_eq!(request.symbol, "TSLA");
        assert_eq!(request.timespan, Timespan::Minute);
        assert_eq!(request.sort, SortOrder::Asc);
        assert_eq!(request.multiplier, 15);
    }

    #[test]
    fn news_query_uses_inclusive_bounds() {
        let request = NewsRequest::new(
            "nvda",
            NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 2, 29).unwrap(),
            10,
        );
        let query = request.query();
        assert!(query.contains(&("ticker", "NVDA".to_string())));
        assert!(query.contains(&("order", "desc".to_string())));
        assert!(query.contains(&("sort", "published_utc".to_string())));
        assert!(query.contains(&("published_utc.gte", "2024-02-01".to_string())));
        assert!(query.contains(&("published_utc.lte", "2024-02-29".to_string())));
    }

    #[test]
    fn aggregates_response_yields_results() {
        let body = r#"{
            "ticker": "AAPL",
            "status": "OK",
            "resultsCount": 1,
            "results": [
                {"v": 70790813, "vw": 131.6292, "o": 130.465, "c": 130.15,
                 "h": 133.41, "l": 129.89, "t": 1673240400000, "n": 645365}
            ]
        }"#;
        let response: AggregatesResponse = serde_json::from_str(body).unwrap();
        let records = response.into_records().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["c"], 130.15);
    }

    #[test]
    fn aggregates_response_without_results_is_empty() {
        let body = r#"{"ticker": "ZZZZ", "status": "OK", "resultsCount": 0}"#;
        let response: AggregatesResponse = serde_json::from_str(body).unwrap();
        assert!(response.into_records().unwrap().is_empty());
    }

    #[test]
    fn delayed_status_is_accepted() {
        let body = r#"{"status": "DELAYED", "results": [{"t": 0}]}"#;
        let response: AggregatesResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.into_records().unwrap().len(), 1);
    }

    #[test]
    fn error_status_is_reported() {
        let body = r#"{"status": "NOT_AUTHORIZED", "error": "Unknown API Key"}"#;
        let response: AggregatesResponse = serde_json::from_str(body).unwrap();
        let err = response.into_records().unwrap_err();
        assert!(matches!(
            err.current_context(),
            FetchError::Status { status, .. } if status == "NOT_AUTHORIZED"
        ));
    }

    #[test]
    fn news_response_decodes_articles() {
        let body = r#"{
            "status": "OK",
            "results": [{
                "id": "abc",
                "title": "Chipmaker beats estimates",
                "author": "Jane Reporter",
                "published_utc": "2024-02-21T21:30:00Z",
                "article_url": "https://example.com/news/1",
                "image_url": "https://example.com/img/1.png",
                "description": "Revenue tripled.",
                "tickers": ["NVDA"]
            }]
        }"#;
        let response: NewsResponse = serde_json::from_str(body).unwrap();
        let articles = response.into_articles().unwrap();
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].author.as_deref(), Some("Jane Reporter"));
    }

    #[test]
    fn missing_api_key_env_is_reported() {
        let config = PolygonConfig {
            api_key_env: "TICKER_INSIGHT_TEST_KEY_THAT_IS_NEVER_SET".into(),
            ..PolygonConfig::default()
        };
        let err = PolygonClient::from_config(&config).err().unwrap();
        assert!(matches!(
            err.current_context(),
            FetchError::MissingApiKey { .. }
        ));
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let client = PolygonClient::new("http://localhost:9000/", "k".into(), nonzero!(1u32));
        assert_eq!(client.base_url, "http://localhost:9000");
    }

    fn attached(report: &Report<FetchError>, needle: &str) -> bool {
        report
            .frames()
            .filter_map(|frame| frame.downcast_ref::<String>())
            .any(|text| text.contains(needle))
    }

    #[test]
    fn unauthorized_reply_keeps_upstream_message() {
        let body = r#"{"status": "NOT_AUTHORIZED", "request_id": "a1b2", "message": "Unknown API Key"}"#;
        let err = rejection(AGGREGATES, StatusCode::UNAUTHORIZED, body);
        assert!(matches!(
            err.current_context(),
            FetchError::Status { status, .. } if status == "NOT_AUTHORIZED"
        ));
        assert!(attached(&err, "Unknown API Key"));
        assert!(attached(&err, "401"));
    }

    #[test]
    fn error_reply_with_error_field() {
        let body = r#"{"status": "ERROR", "error": "Invalid date range"}"#;
        let err = rejection(NEWS, StatusCode::BAD_REQUEST, body);
        assert!(matches!(err.current_context(), FetchError::Status { .. }));
        assert!(attached(&err, "Invalid date range"));
    }

    #[test]
    fn non_json_reply_falls_back_to_http_status() {
        let err = rejection(AGGREGATES, StatusCode::BAD_GATEWAY, "<html>502</html>");
        assert!(matches!(err.current_context(), FetchError::Request { .. }));
        assert!(attached(&err, "502 Bad Gateway"));
    }

    /// Integration test: requires network access and `POLYGON_API_KEY`.
    /// Run with `cargo test -- --ignored`
    #[tokio::test]
    #[ignore]
    async fn integration_fetch_aggregates() {
        let client = PolygonClient::from_config(&PolygonConfig::default()).unwrap();
        let mut request = sample_request();
        request.timespan = Timespan::Day;
        request.multiplier = 1;
        request.limit = 10;
        let records = client.fetch_aggregates(&request).await.unwrap();
        assert!(!records.is_empty());
        assert!(records.len() <= 10);
    }

    /// Integration test: requires network access and `POLYGON_API_KEY`.
    /// Run with `cargo test -- --ignored`
    #[tokio::test]
    #[ignore]
    async fn integration_fetch_news() {
        let client = PolygonClient::from_config(&PolygonConfig::default()).unwrap();
        let request = NewsRequest::new(
            "AAPL",
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
            5,
        );
        let articles = client.fetch_news(&request).await.unwrap();
        assert!(articles.len() <= 5);
    }
}
