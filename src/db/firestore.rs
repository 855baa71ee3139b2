// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Clubs (metadata, shelf, conditional updates, two-phase deletion)
//! - Users (profiles keyed by object id, looked up by Discord id or slug)
//! - Sessions (encrypted OAuth tokens)
//! - Settings (per-user email settings and the genre catalog)
//! - Referrals (click attribution)

use crate::db::{collections, GENRES_DOC_ID};
use crate::error::AppError;
use crate::models::ids::is_object_id;
use crate::models::{
    Club, Genres, OAuthClient, ReadingSpeed, Referral, Session, User, UserSettings,
};
use chrono::{DateTime, Utc};
use firestore::{FirestoreConsistencySelector, FirestoreQueryDirection};
use futures_util::{stream, StreamExt};

const MAX_CONCURRENT_DB_OPS: usize = 10;
// Firestore caps `in` filters at 30 values.
const IN_QUERY_CHUNK: usize = 30;
const PENDING_DELETION_BATCH: u32 = 100;

/// Filter and cursor for the public club listing.
#[derive(Debug, Clone, Default)]
pub struct ClubQuery {
    pub reading_speed: Option<ReadingSpeed>,
    /// Only clubs with an id strictly less than this one
    pub after: Option<String>,
    pub limit: u32,
}

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // The emulator accepts any token; skip the credential lookup entirely.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a mock Firestore client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    // ─── Club Operations ─────────────────────────────────────────

    /// Get a club by id. Malformed ids resolve to `None` without a read.
    pub async fn get_club(&self, club_id: &str) -> Result<Option<Club>, AppError> {
        if !is_object_id(club_id) {
            return Ok(None);
        }
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::CLUBS)
            .obj()
            .one(club_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Listed clubs, newest first, starting strictly before `query.after`.
    pub async fn list_clubs(&self, query: &ClubQuery) -> Result<Vec<Club>, AppError> {
        let speed = query.reading_speed.map(|s| s.as_str().to_string());
        let after = query.after.clone();

        let clubs: Vec<Club> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::CLUBS)
            .filter(move |q| {
                q.for_all([
                    q.field("unlisted").eq(false),
                    speed.clone().and_then(|s| q.field("readingSpeed").eq(s)),
                    after.clone().and_then(|a| q.field("id").less_than(a)),
                ])
            })
            .order_by([("id", FirestoreQueryDirection::Descending)])
            .limit(query.limit)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(clubs
            .into_iter()
            .filter(|c| !c.is_pending_deletion())
            .collect())
    }

    /// Clubs with the given ids. Unknown and malformed ids are skipped.
    pub async fn get_clubs_by_ids(&self, ids: &[String]) -> Result<Vec<Club>, AppError> {
        let ids: Vec<String> = ids.iter().filter(|id| is_object_id(id)).cloned().collect();
        self.query_in(collections::CLUBS, "id", ids).await
    }

    /// Clubs bound to any of the given channels.
    pub async fn get_clubs_by_channel_ids(
        &self,
        channel_ids: &[String],
    ) -> Result<Vec<Club>, AppError> {
        self.query_in(collections::CLUBS, "channelId", channel_ids.to_vec())
            .await
    }

    /// Store a new club.
    pub async fn create_club(&self, club: &Club) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::CLUBS)
            .document_id(&club.id)
            .object(club)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Read-check-write a club inside one transaction.
    ///
    /// `apply` sees the current document and either mutates it or rejects
    /// the change. The stored `version` is bumped and `updated_at` refreshed
    /// on every successful write; concurrent writers conflict at commit.
    pub async fn update_club_with<F>(&self, club_id: &str, apply: F) -> Result<Club, AppError>
    where
        F: FnOnce(&mut Club) -> Result<(), AppError>,
    {
        if !is_object_id(club_id) {
            return Err(AppError::NotFound("Club not found".to_string()));
        }
        let client = self.get_client()?;

        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        // Reads through this handle are registered with the transaction.
        let tx_db = client.clone_with_consistency_selector(FirestoreConsistencySelector::Transaction(
            transaction.transaction_id().clone(),
        ));

        let current: Option<Club> = match tx_db
            .fluent()
            .select()
            .by_id_in(collections::CLUBS)
            .obj()
            .one(club_id)
            .await
        {
            Ok(club) => club,
            Err(e) => {
                let _ = transaction.rollback().await;
                return Err(AppError::Database(format!(
                    "Failed to read club in transaction: {}",
                    e
                )));
            }
        };

        let Some(mut club) = current else {
            let _ = transaction.rollback().await;
            return Err(AppError::NotFound("Club not found".to_string()));
        };

        if let Err(e) = apply(&mut club) {
            let _ = transaction.rollback().await;
            return Err(e);
        }
        club.version += 1;
        club.updated_at = Utc::now();

        client
            .fluent()
            .update()
            .in_col(collections::CLUBS)
            .document_id(club_id)
            .object(&club)
            .add_to_transaction(&mut transaction)
            .map_err(|e| AppError::Database(format!("Failed to add club to transaction: {}", e)))?;

        transaction.commit().await.map_err(|e| {
            AppError::Database(format!("Transaction commit failed: {}", e))
        })?;

        tracing::debug!(club_id, version = club.version, "Club updated");
        Ok(club)
    }

    /// Flag a club as being deleted. Returns the flagged club.
    pub async fn mark_club_pending_deletion(
        &self,
        club_id: &str,
        at: DateTime<Utc>,
    ) -> Result<Club, AppError> {
        self.update_club_with(club_id, |club| {
            if club.pending_deletion_at.is_none() {
                club.pending_deletion_at = Some(at);
            }
            Ok(())
        })
        .await
    }

    /// Remove a club document.
    pub async fn delete_club(&self, club_id: &str) -> Result<(), AppError> {
        self.get_client()?
            .fluent()
            .delete()
            .from(collections::CLUBS)
            .document_id(club_id)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Clubs whose deletion was started but never finished, oldest first.
    pub async fn list_pending_deletions(&self) -> Result<Vec<Club>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .from(collections::CLUBS)
            .filter(|q| q.for_all([q.field("pendingDeletionAt").is_not_null()]))
            .order_by([("pendingDeletionAt", FirestoreQueryDirection::Ascending)])
            .limit(PENDING_DELETION_BATCH)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    // ─── User Operations ─────────────────────────────────────────

    /// Get a user by id.
    pub async fn get_user(&self, user_id: &str) -> Result<Option<User>, AppError> {
        if !is_object_id(user_id) {
            return Ok(None);
        }
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(user_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get the user linked to a Discord account.
    pub async fn get_user_by_discord_id(&self, discord_id: &str) -> Result<Option<User>, AppError> {
        let discord_id = discord_id.to_string();
        let users: Vec<User> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::USERS)
            .filter(move |q| q.for_all([q.field("discordId").eq(discord_id.clone())]))
            .limit(1)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(users.into_iter().next())
    }

    /// Users linked to any of the given Discord accounts.
    pub async fn get_users_by_discord_ids(
        &self,
        discord_ids: &[String],
    ) -> Result<Vec<User>, AppError> {
        self.query_in(collections::USERS, "discordId", discord_ids.to_vec())
            .await
    }

    /// Whether some user already owns `slug`.
    pub async fn is_slug_taken(&self, slug: &str) -> Result<bool, AppError> {
        let slug = slug.to_string();
        let users: Vec<User> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::USERS)
            .filter(move |q| q.for_all([q.field("urlSlug").eq(slug.clone())]))
            .limit(1)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(!users.is_empty())
    }

    /// Create or update a user.
    pub async fn upsert_user(&self, user: &User) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::USERS)
            .document_id(&user.id)
            .object(user)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    // ─── Session Operations ──────────────────────────────────────

    /// Get the stored session for a user and OAuth client.
    pub async fn get_session(
        &self,
        user_id: &str,
        client: OAuthClient,
    ) -> Result<Option<Session>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::SESSIONS)
            .obj()
            .one(&Session::document_id(user_id, client))
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Store a session, replacing any previous one for the same pair.
    pub async fn set_session(&self, session: &Session) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::SESSIONS)
            .document_id(Session::document_id(&session.user_id, session.client))
            .object(session)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    // ─── Settings Operations ─────────────────────────────────────

    /// Get a user's email settings.
    pub async fn get_user_settings(&self, user_id: &str) -> Result<Option<UserSettings>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::USER_SETTINGS)
            .obj()
            .one(user_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Store a user's email settings.
    pub async fn set_user_settings(&self, settings: &UserSettings) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::USER_SETTINGS)
            .document_id(&settings.user_id)
            .object(settings)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// The genre catalog, if it has been seeded.
    pub async fn get_genres(&self) -> Result<Option<Genres>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::SETTINGS)
            .obj()
            .one(GENRES_DOC_ID)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Seed or replace the genre catalog.
    pub async fn set_genres(&self, genres: &Genres) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::SETTINGS)
            .document_id(GENRES_DOC_ID)
            .object(genres)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    // ─── Referral Operations ─────────────────────────────────────

    /// Get a referral by the temp uid stored in the visitor's cookie.
    pub async fn get_referral(&self, temp_uid: &str) -> Result<Option<Referral>, AppError> {
        if !is_object_id(temp_uid) {
            return Ok(None);
        }
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::REFERRALS)
            .obj()
            .one(temp_uid)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create or replace a referral.
    pub async fn set_referral(&self, referral: &Referral) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::REFERRALS)
            .document_id(&referral.temp_uid)
            .object(referral)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    // ─── Helper Methods ────────────────────────────────────────────

    /// Fetch every document whose `field` is one of `values`.
    ///
    /// Values are split into `in` queries of at most 30 and run with
    /// bounded concurrency.
    async fn query_in<T>(
        &self,
        collection: &'static str,
        field: &'static str,
        mut values: Vec<String>,
    ) -> Result<Vec<T>, AppError>
    where
        T: serde::de::DeserializeOwned + Send,
    {
        values.sort();
        values.dedup();
        if values.is_empty() {
            return Ok(Vec::new());
        }
        let client = self.get_client()?;

        let chunks: Vec<Vec<String>> = values.chunks(IN_QUERY_CHUNK).map(<[String]>::to_vec).collect();
        let results = stream::iter(chunks)
            .map(|chunk| async move {
                client
                    .fluent()
                    .select()
                    .from(collection)
                    .filter(move |q| q.for_all([q.field(field).is_in(chunk.clone())]))
                    .obj::<T>()
                    .query()
                    .await
                    .map_err(|e| AppError::Database(e.to_string()))
            })
            .buffer_unordered(MAX_CONCURRENT_DB_OPS)
            .collect::<Vec<Result<Vec<T>, AppError>>>()
            .await;

        let mut out = Vec::new();
        for chunk in results {
            out.extend(chunk?);
        }
        Ok(out)
    }
}
