// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Caravan Clubs API Server
//!
//! Book clubs for buddy reading, with each club's conversation hosted in a
//! private Discord channel.

use caravan_clubs::{
    config::Config, db::FirestoreDb, services::clubs::run_deletion_sweeper, AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging for GCP
    init_logging()?;

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(port = config.port, "Starting Caravan Clubs API");

    // Initialize Firestore database
    let db = FirestoreDb::new(&config.gcp_project_id).await?;

    // Build shared state
    let port = config.port;
    let state = Arc::new(AppState::new(config, db)?);
    tracing::info!(guild_id = %state.config.discord_guild_id, "Discord client initialized");

    // Finish club deletions interrupted by a crash or a Discord outage
    tokio::spawn(run_deletion_sweeper(state.clone()));
    tracing::info!(
        interval_secs = state.config.deletion_sweep_interval_secs,
        "Deletion sweeper started"
    );

    // Build router
    let app = caravan_clubs::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("caravan_clubs=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .with(format)
        .init();
    Ok(())
}
