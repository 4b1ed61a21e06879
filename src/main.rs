use anyhow::{Context, Result};
use chrono::Utc;
use tracing_subscriber::EnvFilter;

use lotto_pool::utils::{bangkok_date, latest_draw_date, parse_api_date};
use lotto_pool::{Book, DrawClient, config};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let config = config::load()?;

    let day = match std::env::args().nth(1) {
        Some(raw) => parse_api_date(&raw)?,
        None => latest_draw_date(bangkok_date(&Utc::now())),
    };

    let book = Book::open(&config).context("opening book database")?;
    let client = DrawClient::new(&config)?;

    tracing::info!("🎲 Settling draw {}", day);
    let draw = client
        .fetch_and_cache(&book, day)
        .await
        .with_context(|| format!("fetching draw result for {}", day))?;

    let settlement = book.settle(&draw)?;
    for winner in &settlement.winners {
        for leg in &winner.matched {
            tracing::info!(
                "🏆 {} {} {}: kept {} → {}, sent {} → {}",
                winner.buyer_name,
                winner.number,
                leg.label,
                leg.amount.kept,
                leg.payout.kept,
                leg.amount.sent,
                leg.payout.sent
            );
        }
    }

    let totals = settlement.totals;
    tracing::info!(
        "✅ Kept stakes {}, operator payout {}, dealer payout {}, operator net {}",
        totals.kept_stakes,
        totals.operator_payout,
        totals.dealer_payout,
        totals.operator_net
    );

    Ok(())
}
