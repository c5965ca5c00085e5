use std::io::{self, BufWriter, Write};
use std::path::Path;

use clap::Parser;
use derive_more::{Display, Error};
use error_stack::{Report, ResultExt};
use tracing::info;
use tracing_subscriber::EnvFilter;

use ticker_insight::analysis::analyze;
use ticker_insight::config::{self, AppConfig};
use ticker_insight::normalize::normalize;
use ticker_insight::output::{Record, write_json_lines};
use ticker_insight::polygon::{AggregatesRequest, MarketData, NewsRequest, PolygonClient};
use ticker_insight::summary::summarize;

#[derive(Debug, Display, Error)]
pub enum AppError {
    #[display("configuration error")]
    Config,
    #[display("market data fetch error")]
    Fetch,
    #[display("analysis error")]
    Analysis,
    #[display("output error")]
    Output,
}

#[derive(Parser)]
#[command(
    name = "ticker-insight",
    about = "Fetch stock bars and derive technical indicators"
)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,
    /// Ticker symbol, overriding `request.symbol` from the config file
    #[arg(short, long)]
    symbol: Option<String>,
}

#[tokio::main]
async fn main() {
    if let Err(report) = run().await {
        eprintln!("{report:?}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Report<AppError>> {
    let cli = Cli::parse();
    let mut config = config::load(Path::new(&cli.config)).change_context(AppError::Config)?;
    if let Some(symbol) = cli.symbol {
        config.request.symbol = symbol;
        config::validate(&config).change_context(AppError::Config)?;
    }

    init_tracing(&config);

    let client = PolygonClient::from_config(&config.polygon).change_context(AppError::Fetch)?;
    let request =
        AggregatesRequest::from_config(&config.request).change_context(AppError::Config)?;

    // ── Fetch ─────────────────────────────────────────────────────────────────
    let news_request = config.news.enabled.then(|| {
        NewsRequest::new(
            &request.symbol,
            request.from,
            request.to,
            config.news.limit,
        )
    });
    let (raw, news) = tokio::join!(client.fetch_aggregates(&request), async {
        match &news_request {
            Some(news_request) => client.fetch_news(news_request).await.map(Some),
            None => Ok(None),
        }
    });
    let raw = raw.change_context(AppError::Fetch)?;
    let news = news.change_context(AppError::Fetch)?;

    // ── Transform ─────────────────────────────────────────────────────────────
    let table = normalize(&raw, &request.symbol).change_context(AppError::Analysis)?;
    let indicators = analyze(&table, &config.indicators).change_context(AppError::Analysis)?;

    let summary = summarize(&table);
    info!(
        symbol = table.symbol(),
        rows = summary.rows,
        mean_open = ?summary.mean_open,
        std_open = ?summary.std_open,
        mean_close = ?summary.mean_close,
        std_close = ?summary.std_close,
        "summary statistics"
    );

    // ── Output ────────────────────────────────────────────────────────────────
    let mut out = BufWriter::new(io::stdout().lock());
    write_json_lines(&mut out, indicators.rows().map(Record::Bar))
        .change_context(AppError::Output)?;
    if let Some(articles) = &news {
        write_json_lines(&mut out, articles.iter().map(Record::News))
            .change_context(AppError::Output)?;
    }
    out.flush().change_context(AppError::Output)?;

    info!(
        symbol = table.symbol(),
        rows = indicators.len(),
        articles = news.as_ref().map_or(0, Vec::len),
        "done"
    );
    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::new(&config.general.log_level);
    match config.general.log_format.as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .with_writer(io::stderr)
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(io::stderr)
                .init();
        }
    }
}
