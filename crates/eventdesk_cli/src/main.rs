//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `eventdesk_core` linkage with deterministic output.
//! - With a config file, exercise config loading, logging and db bootstrap.

use anyhow::{Context, Result};
use clap::Parser;
use eventdesk_core::db::open_db_from_settings;
use eventdesk_core::{
    core_version, init_logging_from_settings, ping, EventFilter, EventStore, EventsConfig,
    PageRequest, SqliteEventStore,
};
use log::info;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "eventdesk")]
#[command(about = "Smoke-check the event core: config, logging and storage")]
struct Cli {
    /// Path to an eventdesk TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    println!("eventdesk_core ping={}", ping());
    println!("eventdesk_core version={}", core_version());

    let Some(path) = cli.config else {
        return Ok(());
    };

    let config = EventsConfig::load(&path)
        .with_context(|| format!("failed to load config {}", path.display()))?;
    let logging_on = init_logging_from_settings(&config.logging)?;

    let conn = open_db_from_settings(&config.database)?;
    let store = SqliteEventStore::try_new(&conn)?;
    let total = store
        .query(&EventFilter::all(), &PageRequest::new(0, 1))?
        .total_elements;

    let rules = &config.rules;
    println!(
        "rules min_duration_minutes={} max_duration_hours={} allow_overlap_same_location={} allow_create_in_past={}",
        rules.min_duration_minutes,
        rules.max_duration_hours,
        rules.allow_overlap_same_location,
        rules.allow_create_in_past
    );
    println!(
        "concurrency require_precondition={}",
        config.concurrency.require_precondition
    );
    println!("logging enabled={logging_on}");
    println!("events total={total}");

    info!("event=cli_smoke module=cli status=ok events_total={total}");
    Ok(())
}
