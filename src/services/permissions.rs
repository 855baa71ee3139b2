// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Discord permission bits and channel permission resolution.
//!
//! Resolution order:
//! 1. Guild owner has everything.
//! 2. Base = `@everyone` role permissions | every role the member holds.
//! 3. `ADMINISTRATOR` in the base grants everything.
//! 4. Channel overwrites apply in order: `@everyone`, then all of the
//!    member's role overwrites combined, then the member's own overwrite.
//!    Each step clears its `deny` bits before setting its `allow` bits.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::ops::{BitOr, BitOrAssign};

/// A set of Discord permission flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Permissions(u64);

impl Permissions {
    pub const NONE: Self = Self(0);
    pub const ADMINISTRATOR: Self = Self(1 << 3);
    pub const MANAGE_CHANNELS: Self = Self(1 << 4);
    /// Also known as `READ_MESSAGES` on older API versions.
    pub const VIEW_CHANNEL: Self = Self(1 << 10);
    pub const SEND_MESSAGES: Self = Self(1 << 11);
    pub const SEND_TTS_MESSAGES: Self = Self(1 << 12);
    pub const MANAGE_MESSAGES: Self = Self(1 << 13);
    pub const ALL: Self = Self(u64::MAX);

    /// What every club member gets on the club channel.
    pub const MEMBER: Self =
        Self(Self::VIEW_CHANNEL.0 | Self::SEND_MESSAGES.0 | Self::SEND_TTS_MESSAGES.0);

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Clear `deny`, then set `allow`.
    pub const fn overwrite(self, allow: Self, deny: Self) -> Self {
        Self((self.0 & !deny.0) | allow.0)
    }
}

impl BitOr for Permissions {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for Permissions {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

// Discord encodes permission sets as decimal strings.
impl Serialize for Permissions {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for Permissions {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(u64),
        }
        match Raw::deserialize(deserializer)? {
            Raw::Number(n) => Ok(Self(n)),
            Raw::Text(s) => s
                .parse::<u64>()
                .map(Self)
                .map_err(|_| serde::de::Error::custom(format!("invalid permission bits: {s}"))),
        }
    }
}

/// A guild role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Role {
    pub id: String,
    pub name: String,
    pub permissions: Permissions,
    #[serde(default)]
    pub position: i64,
}

/// Overwrite target kinds as encoded by Discord.
pub const OVERWRITE_ROLE: u8 = 0;
pub const OVERWRITE_MEMBER: u8 = 1;

/// A channel-level permission overwrite for a role or a member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionOverwrite {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(default)]
    pub allow: Permissions,
    #[serde(default)]
    pub deny: Permissions,
}

impl PermissionOverwrite {
    pub fn member(id: impl Into<String>, allow: Permissions, deny: Permissions) -> Self {
        Self {
            id: id.into(),
            kind: OVERWRITE_MEMBER,
            allow,
            deny,
        }
    }

    pub fn role(id: impl Into<String>, allow: Permissions, deny: Permissions) -> Self {
        Self {
            id: id.into(),
            kind: OVERWRITE_ROLE,
            allow,
            deny,
        }
    }
}

/// Guild-level permissions for a member holding `member_roles`.
pub fn base_permissions(
    guild_id: &str,
    guild_owner_id: &str,
    roles: &[Role],
    member_id: &str,
    member_roles: &[String],
) -> Permissions {
    if member_id == guild_owner_id {
        return Permissions::ALL;
    }

    let mut perms = roles
        .iter()
        .find(|r| r.id == guild_id)
        .map(|r| r.permissions)
        .unwrap_or_default();
    for role in roles.iter().filter(|r| member_roles.contains(&r.id)) {
        perms |= role.permissions;
    }

    if perms.contains(Permissions::ADMINISTRATOR) {
        return Permissions::ALL;
    }
    perms
}

/// Apply a channel's overwrites on top of a member's base permissions.
pub fn channel_permissions(
    base: Permissions,
    guild_id: &str,
    member_id: &str,
    member_roles: &[String],
    overwrites: &[PermissionOverwrite],
) -> Permissions {
    if base.contains(Permissions::ADMINISTRATOR) {
        return Permissions::ALL;
    }

    let mut perms = base;

    if let Some(everyone) = overwrites
        .iter()
        .find(|o| o.kind == OVERWRITE_ROLE && o.id == guild_id)
    {
        perms = perms.overwrite(everyone.allow, everyone.deny);
    }

    let (mut allow, mut deny) = (Permissions::NONE, Permissions::NONE);
    for o in overwrites
        .iter()
        .filter(|o| o.kind == OVERWRITE_ROLE && member_roles.contains(&o.id))
    {
        allow |= o.allow;
        deny |= o.deny;
    }
    perms = perms.overwrite(allow, deny);

    if let Some(own) = overwrites
        .iter()
        .find(|o| o.kind == OVERWRITE_MEMBER && o.id == member_id)
    {
        perms = perms.overwrite(own.allow, own.deny);
    }

    perms
}
