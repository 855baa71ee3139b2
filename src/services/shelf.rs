// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Club shelf transitions.
//!
//! A shelf update is computed on an in-memory copy of the shelf and written
//! back in the same transaction that read it.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashSet;
use validator::Validate;

use crate::db::FirestoreDb;
use crate::error::AppError;
use crate::models::ids::new_object_id;
use crate::models::{BookInput, Club, ReadingState, ShelfEntry};

/// What happens to the book currently being read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CurrBookAction {
    /// Keep it; only the want-to-read list changes
    Current,
    Delete,
    NotStarted,
    Read,
}

/// Body of `PUT /clubs/{id}/updatebook`.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ShelfUpdateRequest {
    #[serde(default)]
    #[validate(nested)]
    pub new_book: Option<BookInput>,
    pub new_entry: bool,
    #[serde(default)]
    pub prev_book_id: Option<String>,
    pub curr_book_action: CurrBookAction,
    #[validate(nested)]
    pub want_to_read: Vec<BookInput>,
    /// Version the client last saw; a mismatch is rejected
    #[serde(default)]
    pub version: Option<u64>,
}

/// Apply a shelf update in place.
pub fn apply_shelf_update(
    shelf: &mut Vec<ShelfEntry>,
    request: ShelfUpdateRequest,
    now: DateTime<Utc>,
) -> Result<(), AppError> {
    let prev_book_id = request.prev_book_id.filter(|id| !id.is_empty());

    if request.curr_book_action != CurrBookAction::Current {
        if let Some(prev_id) = prev_book_id.as_deref() {
            match request.curr_book_action {
                CurrBookAction::Delete => shelf.retain(|e| e.id != prev_id),
                CurrBookAction::NotStarted | CurrBookAction::Read => {
                    let state = if request.curr_book_action == CurrBookAction::Read {
                        ReadingState::Read
                    } else {
                        ReadingState::NotStarted
                    };
                    if let Some(entry) = shelf.iter_mut().find(|e| e.id == prev_id) {
                        entry.reading_state = state;
                        entry.updated_at = now;
                        if state == ReadingState::Read {
                            entry.finished_reading = Some(now);
                        }
                    }
                }
                CurrBookAction::Current => {}
            }
        }

        if let Some(book) = request.new_book {
            if request.new_entry {
                let mut entry = book.into_entry(ReadingState::Current, now);
                if shelf.iter().any(|e| e.id == entry.id) {
                    entry.id = new_object_id();
                }
                shelf.push(entry);
            } else {
                let book_id = book.id.unwrap_or_default();
                let entry = shelf.iter_mut().find(|e| e.id == book_id).ok_or_else(|| {
                    AppError::Unprocessable(format!("Book {} is not on the shelf", book_id))
                })?;
                entry.reading_state = ReadingState::Current;
                entry.updated_at = now;
                entry.started_reading.get_or_insert(now);
                entry.finished_reading = None;
            }
        }
    }

    // Replace the want-to-read list, keeping the book that was just shelved.
    shelf.retain(|e| {
        e.reading_state != ReadingState::NotStarted || Some(e.id.as_str()) == prev_book_id.as_deref()
    });
    let mut existing: HashSet<String> = shelf.iter().map(|e| e.id.clone()).collect();
    for book in request.want_to_read {
        let entry = book.into_entry(ReadingState::NotStarted, now);
        if existing.insert(entry.id.clone()) {
            shelf.push(entry);
        }
    }

    let current = shelf
        .iter()
        .filter(|e| e.reading_state == ReadingState::Current)
        .count();
    if current > 1 {
        return Err(AppError::Unprocessable(
            "A club can only read one book at a time".to_string(),
        ));
    }
    Ok(())
}

/// Update a club shelf atomically, honoring the client's version if sent.
pub async fn update_shelf(
    db: &FirestoreDb,
    club_id: &str,
    request: ShelfUpdateRequest,
) -> Result<Club, AppError> {
    let club = db
        .update_club_with(club_id, move |club| {
            if club.is_pending_deletion() {
                return Err(AppError::NotFound(format!("Club {} not found", club.id)));
            }
            if let Some(expected) = request.version {
                if expected != club.version {
                    return Err(AppError::Conflict(format!(
                        "Club shelf was modified (version {} != {})",
                        expected, club.version
                    )));
                }
            }
            apply_shelf_update(&mut club.shelf, request, Utc::now())
        })
        .await?;

    tracing::info!(club_id, version = club.version, "Club shelf updated");
    Ok(club)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DUNE: &str = "5d8a1c2b3e4f5a6b7c8d9e01";
    const EMMA: &str = "5d8a1c2b3e4f5a6b7c8d9e02";
    const IVANHOE: &str = "5d8a1c2b3e4f5a6b7c8d9e03";
    const KIM: &str = "5d8a1c2b3e4f5a6b7c8d9e04";

    fn entry(id: &str, state: ReadingState) -> ShelfEntry {
        let book: BookInput = serde_json::from_value(serde_json::json!({
            "_id": id,
            "title": format!("Book {id}"),
        }))
        .unwrap();
        book.into_entry(state, Utc::now())
    }

    fn shelf() -> Vec<ShelfEntry> {
        vec![
            entry(DUNE, ReadingState::Current),
            entry(EMMA, ReadingState::NotStarted),
            entry(IVANHOE, ReadingState::NotStarted),
        ]
    }

    fn request(value: serde_json::Value) -> ShelfUpdateRequest {
        serde_json::from_value(value).unwrap()
    }

    fn state_of(shelf: &[ShelfEntry], id: &str) -> Option<ReadingState> {
        shelf.iter().find(|e| e.id == id).map(|e| e.reading_state)
    }

    #[test]
    fn test_finish_current_and_start_existing() {
        let mut s = shelf();
        apply_shelf_update(
            &mut s,
            request(serde_json::json!({
                "newBook": {"_id": EMMA, "title": "Emma"},
                "newEntry": false,
                "prevBookId": DUNE,
                "currBookAction": "read",
                "wantToRead": [{"_id": IVANHOE, "title": "Ivanhoe"}]
            })),
            Utc::now(),
        )
        .unwrap();

        assert_eq!(state_of(&s, DUNE), Some(ReadingState::Read));
        assert!(s.iter().find(|e| e.id == DUNE).unwrap().finished_reading.is_some());
        assert_eq!(state_of(&s, EMMA), Some(ReadingState::Current));
        assert_eq!(state_of(&s, IVANHOE), Some(ReadingState::NotStarted));
        assert_eq!(s.len(), 3);
    }

    #[test]
    fn test_delete_current_and_add_new_entry() {
        let mut s = shelf();
        apply_shelf_update(
            &mut s,
            request(serde_json::json!({
                "newBook": {"title": "Kim", "publishedDate": "1901-10-01"},
                "newEntry": true,
                "prevBookId": DUNE,
                "currBookAction": "delete",
                "wantToRead": []
            })),
            Utc::now(),
        )
        .unwrap();

        assert_eq!(state_of(&s, DUNE), None);
        let current: Vec<&ShelfEntry> = s
            .iter()
            .filter(|e| e.reading_state == ReadingState::Current)
            .collect();
        assert_eq!(current.len(), 1);
        assert_eq!(current[0].title, "Kim");
        assert!(current[0].published_date.is_some());
        // Want-to-read list replaced by an empty batch.
        assert!(s.iter().all(|e| e.reading_state != ReadingState::NotStarted));
    }

    #[test]
    fn test_shelving_current_keeps_it_in_want_to_read() {
        let mut s = shelf();
        apply_shelf_update(
            &mut s,
            request(serde_json::json!({
                "newBook": {"_id": KIM, "title": "Kim"},
                "newEntry": true,
                "prevBookId": DUNE,
                "currBookAction": "notStarted",
                "wantToRead": [{"_id": DUNE, "title": "Dune"}]
            })),
            Utc::now(),
        )
        .unwrap();

        assert_eq!(state_of(&s, DUNE), Some(ReadingState::NotStarted));
        assert_eq!(s.iter().filter(|e| e.id == DUNE).count(), 1);
        assert_eq!(state_of(&s, KIM), Some(ReadingState::Current));
        assert_eq!(state_of(&s, EMMA), None);
    }

    #[test]
    fn test_current_action_only_replaces_want_to_read() {
        let mut s = shelf();
        apply_shelf_update(
            &mut s,
            request(serde_json::json!({
                "newEntry": false,
                "currBookAction": "current",
                "wantToRead": [{"_id": KIM, "title": "Kim"}]
            })),
            Utc::now(),
        )
        .unwrap();

        assert_eq!(state_of(&s, DUNE), Some(ReadingState::Current));
        assert_eq!(state_of(&s, EMMA), None);
        assert_eq!(state_of(&s, KIM), Some(ReadingState::NotStarted));
    }

    #[test]
    fn test_second_current_rejected() {
        let mut s = shelf();
        let err = apply_shelf_update(
            &mut s,
            request(serde_json::json!({
                "newBook": {"title": "Kim"},
                "newEntry": true,
                "currBookAction": "read",
                "wantToRead": []
            })),
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, AppError::Unprocessable(_)));
    }

    #[test]
    fn test_missing_existing_book_rejected() {
        let mut s = shelf();
        let err = apply_shelf_update(
            &mut s,
            request(serde_json::json!({
                "newBook": {"_id": KIM, "title": "Kim"},
                "newEntry": false,
                "prevBookId": DUNE,
                "currBookAction": "read",
                "wantToRead": []
            })),
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, AppError::Unprocessable(_)));
    }

    #[test]
    fn test_invalid_action_fails_to_parse() {
        let parsed: Result<ShelfUpdateRequest, _> = serde_json::from_value(serde_json::json!({
            "newEntry": false,
            "currBookAction": "burn",
            "wantToRead": []
        }));
        assert!(parsed.is_err());
    }
}
