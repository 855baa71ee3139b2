//! Genre catalog served to the profile editor.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single genre with its sub-genres.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Genre {
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub subgenres: Vec<String>,
}

/// The `settings/genres` document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Genres {
    /// Every genre keyed by its `key`
    #[serde(default)]
    pub genres: BTreeMap<String, Genre>,
    /// Keys of the genres shown first
    #[serde(default)]
    pub main_genres: Vec<String>,
}
