mod bot;
mod cli;
mod config;
mod db;
mod error;
mod matcher;
mod models;
mod scrapers;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, warn};

use bot::Bot;
use cli::{Cli, Command};
use config::AppConfig;
use db::{Database, OfferStore, ProfileStore, Store};
use models::{Profile, Source};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load().context("Invalid configuration")?;

    // RUST_LOG wins over -v and QUIET
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.log_filter(cli.verbose))),
        )
        .with_target(false)
        .init();

    let db = Arc::new(
        Database::connect(&config.database_url)
            .with_context(|| format!("Failed to open database {}", config.database_url))?,
    );

    match cli.command {
        Command::Run { sources } => {
            let sources = if sources.is_empty() { config.sources.clone() } else { sources };
            let bots = build_bots(&config, &db, &sources)?;
            run_round(&bots).await;
        }
        Command::Watch { interval_minutes } => {
            let minutes = interval_minutes.unwrap_or(config.run_interval_minutes);
            let bots = build_bots(&config, &db, &config.sources)?;
            watch(&bots, Duration::from_secs(minutes * 60)).await;
        }
        Command::SeedProfiles { file } => seed_profiles(&*db, &file).await?,
        Command::Offers { hours } => list_offers(&*db, hours)?,
    }

    match Arc::try_unwrap(db) {
        Ok(db) => db.close().context("Failed to close database")?,
        Err(_) => warn!("Database still in use at shutdown, leaving it open"),
    }

    Ok(())
}

fn build_bots(config: &AppConfig, db: &Arc<Database>, sources: &[Source]) -> anyhow::Result<Vec<Arc<Bot>>> {
    let policy = Arc::new(config.eligibility_policy());
    let adapters = scrapers::build_adapters(sources, &config.browser_options())?;

    let store: Arc<dyn Store> = db.clone();
    Ok(adapters
        .into_iter()
        .map(|adapter| Arc::new(Bot::new(Arc::clone(&store), adapter, Arc::clone(&policy))))
        .collect())
}

/// Run every bot once, each source in its own task
async fn run_round(bots: &[Arc<Bot>]) {
    let handles: Vec<_> = bots
        .iter()
        .map(|bot| {
            let bot = Arc::clone(bot);
            tokio::spawn(async move { bot.run().await })
        })
        .collect();

    for (bot, handle) in bots.iter().zip(handles) {
        if let Err(e) = handle.await {
            error!(source = %bot.source(), "Run task failed: {}", e);
        }
    }
}

/// Run rounds on an interval until Ctrl-C; a round in flight is finished first
async fn watch(bots: &[Arc<Bot>], period: Duration) {
    let (stop_tx, mut stop_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, stopping after the current round");
            let _ = stop_tx.send(true);
        }
    });

    info!("🏠 Watching {} sources every {} minutes", bots.len(), period.as_secs() / 60);
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            Ok(()) = stop_rx.changed() => break,
            _ = ticker.tick() => run_round(bots).await,
        }
    }
}

async fn seed_profiles(store: &dyn ProfileStore, file: &Path) -> anyhow::Result<()> {
    let json = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let profiles: Vec<Profile> =
        serde_json::from_str(&json).context("Profiles file must be a JSON array of profiles")?;

    for profile in &profiles {
        store.upsert_profile(profile)?;
    }
    info!("💾 Saved {} profiles", profiles.len());
    Ok(())
}

fn list_offers(store: &dyn OfferStore, hours: i64) -> anyhow::Result<()> {
    let since = Utc::now() - chrono::Duration::hours(hours);
    let offers = store.offers_since(since)?;

    println!("{} offers seen in the last {} hours\n", offers.len(), hours);
    for (i, offer) in offers.iter().enumerate() {
        let applications = store.applications_for(offer.id)?;
        println!(
            "{}. [{}] {} ({})",
            i + 1,
            offer.source,
            offer.street.as_deref().unwrap_or("unknown street"),
            offer.rent.as_deref().unwrap_or("rent n/a")
        );
        if let Some(rooms) = offer.rooms {
            print!("   {} rooms", rooms);
        }
        if let Some(district) = &offer.district {
            print!("   {}", district);
        }
        if offer.wbs == Some(true) {
            print!("   WBS");
        }
        println!();
        println!("   Applications: {}", applications.len());
        println!("   URL: {}", offer.url);
        println!();
    }

    Ok(())
}
