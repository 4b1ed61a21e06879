use anyhow::Result;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod mcp_handler;
mod use_cases;

use lotto_pool::{Book, DrawClient, config};
use mcp_handler::{MCPHandler, stdio};
use use_cases::{BookUseCase, DrawUseCase, ReportUseCase};

#[tokio::main]
async fn main() -> Result<()> {
    let config = config::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    tracing::info!("Opening the pool book at {}", config.database_url);

    let book = Arc::new(Book::open(&config)?);
    let client = DrawClient::new(&config)?;

    let book_use_case = BookUseCase::new(Arc::clone(&book));
    let draw_use_case = DrawUseCase::new(Arc::clone(&book), client);
    let report_use_case = ReportUseCase::new(Arc::clone(&book));

    let handler = MCPHandler::new(
        Arc::new(book_use_case),
        Arc::new(draw_use_case),
        Arc::new(report_use_case),
    );

    let (reader, writer) = stdio();

    handler.serve(reader, writer).await.inspect_err(|e| {
        tracing::error!("serving error: {:?}", e);
    })?;

    Ok(())
}
