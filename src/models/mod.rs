// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Data models for the application.

pub mod club;
pub mod genre;
pub mod ids;
pub mod member;
pub mod referral;
pub mod session;
pub mod shelf;
pub mod user;

pub use club::{ChannelSource, Club, GroupVibe, ReadingSpeed};
pub use genre::{Genre, Genres};
pub use member::{ClubMember, ClubSummary, ClubWithMembers};
pub use referral::{Referral, ReferralAction, ReferralActionKind};
pub use session::{OAuthClient, Session};
pub use shelf::{BookInput, ReadingState, ShelfEntry};
pub use user::{EmailSettings, User, UserSettings, UserShelf};
