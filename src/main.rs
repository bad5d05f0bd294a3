// src/main.rs
use dotenvy::dotenv;
use std::env;
use std::sync::Arc;
use sweepdust::{AppConfig, BinanceGateway, PortfolioService};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = AppConfig::new()?;

    // LIVE_TRADING must be set explicitly; everything defaults to simulate.
    let live_trading = env::var("LIVE_TRADING")
        .unwrap_or("false".to_string())
        .parse::<bool>()
        .unwrap_or(false);

    println!("========================================");
    println!("        SWEEPDUST - v0.1.0");
    println!("========================================");
    println!("Quote:  {}", config.quote_asset);
    println!(
        "Mode:   {}",
        if live_trading {
            "LIVE TRADING"
        } else {
            "SIMULATE ONLY"
        }
    );
    println!("========================================");

    let gateway = Arc::new(BinanceGateway::new());
    let service = PortfolioService::new(gateway);

    service
        .set_credentials(&config.api_key, &config.secret_key)
        .await?;
    service.set_trading_enabled(live_trading);

    // Without keys the session is read-only: market data works, account
    // calls would fail Unauthenticated.
    let authenticated = !config.api_key.is_empty() && !config.secret_key.is_empty();
    if authenticated {
        let total = service.total_portfolio_value(&config.quote_asset).await?;
        println!("Portfolio value: {} {}", total, config.quote_asset);
    } else {
        println!("No API keys configured; running read-only (prices only).");
    }

    service.start_polling(config.poll_interval_secs);
    println!("Polling prices; Ctrl+C to exit.");

    tokio::signal::ctrl_c().await?;
    service.stop_polling();

    if authenticated {
        let report = service
            .liquidate_to_quote(&config.quote_asset, config.dust_threshold)
            .await?;
        for outcome in &report.outcomes {
            println!("{outcome:?}");
        }
    }
    for entry in service.drain_logs() {
        println!("{entry}");
    }

    Ok(())
}
