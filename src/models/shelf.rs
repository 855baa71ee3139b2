// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shelf entries: books attached to a club, each with a reading state.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::models::ids::{new_object_id, is_object_id};

/// Where a book sits on a shelf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub enum ReadingState {
    NotStarted,
    Current,
    Read,
}

/// A book stored on a club shelf.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct ShelfEntry {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub isbn: Option<String>,
    #[serde(default)]
    pub goodreads_id: Option<String>,
    #[serde(default)]
    pub amazon_id: Option<String>,
    #[serde(default)]
    pub published_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub cover_image_url: Option<String>,
    #[serde(default)]
    pub genres: Vec<String>,
    pub reading_state: ReadingState,
    #[serde(default)]
    pub started_reading: Option<DateTime<Utc>>,
    #[serde(default)]
    pub finished_reading: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Book metadata as sent by the client.
///
/// Dates arrive as strings and are coerced when the entry is materialized.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct BookInput {
    #[serde(default, alias = "_id")]
    pub id: Option<String>,
    #[validate(length(min = 1, max = 500))]
    pub title: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub isbn: Option<String>,
    #[serde(default, alias = "goodReadsId")]
    pub goodreads_id: Option<String>,
    #[serde(default)]
    pub amazon_id: Option<String>,
    #[serde(default)]
    pub published_date: Option<String>,
    #[serde(default, alias = "coverImageURL")]
    #[validate(length(max = 2048))]
    pub cover_image_url: Option<String>,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub reading_state: Option<ReadingState>,
}

/// Parse a client supplied date, accepting RFC3339 or a bare `YYYY-MM-DD`.
///
/// Unparseable dates are dropped rather than rejected.
pub fn coerce_date(raw: Option<&str>) -> Option<DateTime<Utc>> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|d| d.and_utc())
}

impl BookInput {
    /// Materialize a shelf entry with the given state.
    ///
    /// A well-formed client id is kept so existing entries survive a
    /// round trip through the client; anything else gets a fresh id.
    pub fn into_entry(self, state: ReadingState, now: DateTime<Utc>) -> ShelfEntry {
        let id = match self.id {
            Some(id) if is_object_id(&id) => id,
            _ => new_object_id(),
        };
        ShelfEntry {
            id,
            title: self.title,
            author: self.author,
            isbn: self.isbn,
            goodreads_id: self.goodreads_id,
            amazon_id: self.amazon_id,
            published_date: coerce_date(self.published_date.as_deref()),
            cover_image_url: self.cover_image_url,
            genres: self.genres,
            reading_state: state,
            started_reading: (state == ReadingState::Current).then_some(now),
            finished_reading: (state == ReadingState::Read).then_some(now),
            created_at: now,
            updated_at: now,
        }
    }
}
