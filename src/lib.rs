// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Caravan Clubs: buddy-reading book clubs backed by Discord channels
//!
//! This crate provides the backend API for creating, browsing, joining and
//! managing book clubs whose conversations live in private Discord text
//! channels, with club metadata and shelves stored in Firestore.

pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::FirestoreDb;
use error::AppError;
use services::{DiscordClient, TokenCipher};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: FirestoreDb,
    pub discord: DiscordClient,
    pub cipher: TokenCipher,
}

impl AppState {
    /// Build the long-lived clients from configuration.
    pub fn new(config: Config, db: FirestoreDb) -> Result<Self, AppError> {
        let discord = DiscordClient::new(&config);
        let cipher = TokenCipher::new(&config.token_encryption_key)?;
        Ok(Self {
            config,
            db,
            discord,
            cipher,
        })
    }
}
