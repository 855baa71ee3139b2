// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod clubs;
pub mod crypto;
pub mod directory;
pub mod discord;
pub mod guild;
pub mod membership;
pub mod permissions;
pub mod session;
pub mod shelf;

pub use clubs::ClubService;
pub use crypto::TokenCipher;
pub use directory::DirectoryService;
pub use discord::DiscordClient;
pub use guild::{ChannelView, GuildSnapshot};
pub use permissions::Permissions;
pub use session::LoginService;
