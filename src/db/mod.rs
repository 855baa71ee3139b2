//! Database layer (Firestore).

pub mod firestore;

pub use firestore::{ClubQuery, FirestoreDb};

/// Collection names as constants.
pub mod collections {
    pub const CLUBS: &str = "clubs";
    pub const USERS: &str = "users";
    /// Encrypted OAuth sessions (keyed by `{user_id}_{client}`)
    pub const SESSIONS: &str = "sessions";
    /// Per-user email preferences (keyed by user id)
    pub const USER_SETTINGS: &str = "user_settings";
    /// Site-wide settings documents such as the genre catalog
    pub const SETTINGS: &str = "settings";
    /// Referral clicks and their attribution (keyed by temp uid)
    pub const REFERRALS: &str = "referrals";
}

/// Document id of the genre catalog in the settings collection.
pub const GENRES_DOC_ID: &str = "genres";
