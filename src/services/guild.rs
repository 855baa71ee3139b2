// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Point-in-time view of the club guild.
//!
//! One snapshot answers every membership question within a request, so a
//! listing of fifty clubs costs three Discord calls instead of fifty.

use crate::services::discord::{Channel, Guild, GuildMember, CHANNEL_TYPE_TEXT};
use crate::services::permissions::{
    base_permissions, channel_permissions, PermissionOverwrite, Permissions, Role,
    OVERWRITE_MEMBER,
};

/// Roles, channels and members of the guild.
#[derive(Debug, Clone)]
pub struct GuildSnapshot {
    guild_id: String,
    owner_id: String,
    roles: Vec<Role>,
    channels: Vec<Channel>,
    members: Vec<GuildMember>,
}

impl GuildSnapshot {
    pub fn new(guild: Guild, channels: Vec<Channel>, members: Vec<GuildMember>) -> Self {
        Self {
            guild_id: guild.id,
            owner_id: guild.owner_id,
            roles: guild.roles,
            channels,
            members,
        }
    }

    pub fn guild_id(&self) -> &str {
        &self.guild_id
    }

    /// A text channel by id.
    pub fn channel(&self, channel_id: &str) -> Option<ChannelView<'_>> {
        self.channels
            .iter()
            .find(|c| c.id == channel_id && c.kind == CHANNEL_TYPE_TEXT)
            .map(|channel| ChannelView {
                snapshot: self,
                channel,
            })
    }

    pub fn member(&self, discord_id: &str) -> Option<&GuildMember> {
        self.members.iter().find(|m| m.user.id == discord_id)
    }

    /// Ids of every text channel `discord_id` can view.
    pub fn channels_visible_to(&self, discord_id: &str) -> Vec<String> {
        let Some(member) = self.member(discord_id) else {
            return Vec::new();
        };
        self.channels
            .iter()
            .filter(|c| c.kind == CHANNEL_TYPE_TEXT)
            .filter_map(|c| self.channel(&c.id))
            .filter(|view| view.permissions_for(member).contains(Permissions::VIEW_CHANNEL))
            .map(|view| view.id().to_string())
            .collect()
    }

    /// Guild-level permissions of a member.
    pub fn base_permissions(&self, member: &GuildMember) -> Permissions {
        base_permissions(
            &self.guild_id,
            &self.owner_id,
            &self.roles,
            &member.user.id,
            &member.roles,
        )
    }

    /// The member's role with the highest position, if any.
    pub fn highest_role(&self, member: &GuildMember) -> Option<&Role> {
        self.roles
            .iter()
            .filter(|r| member.roles.contains(&r.id))
            .max_by_key(|r| r.position)
    }
}

/// A text channel resolved against its snapshot.
#[derive(Debug, Clone, Copy)]
pub struct ChannelView<'a> {
    snapshot: &'a GuildSnapshot,
    channel: &'a Channel,
}

impl<'a> ChannelView<'a> {
    pub fn id(&self) -> &'a str {
        &self.channel.id
    }

    /// Effective permissions of `member` in this channel.
    pub fn permissions_for(&self, member: &GuildMember) -> Permissions {
        let base = self.snapshot.base_permissions(member);
        channel_permissions(
            base,
            &self.snapshot.guild_id,
            &member.user.id,
            &member.roles,
            &self.channel.permission_overwrites,
        )
    }

    /// Guild members who can view the channel.
    pub fn members(&self) -> Vec<&'a GuildMember> {
        self.snapshot
            .members
            .iter()
            .filter(|m| self.permissions_for(m).contains(Permissions::VIEW_CHANNEL))
            .collect()
    }

    /// The member with this Discord id, if they can view the channel.
    pub fn member(&self, discord_id: &str) -> Option<&'a GuildMember> {
        self.snapshot
            .member(discord_id)
            .filter(|m| self.permissions_for(m).contains(Permissions::VIEW_CHANNEL))
    }

    /// Members counted toward club capacity.
    ///
    /// Bots never count; holders of the elevated role only count when they
    /// own the club.
    pub fn countable_members(
        &self,
        owner_discord_id: &str,
        elevated_role: &str,
    ) -> Vec<&'a GuildMember> {
        self.members()
            .into_iter()
            .filter(|m| !m.user.bot)
            .filter(|m| {
                m.user.id == owner_discord_id
                    || self
                        .snapshot
                        .highest_role(m)
                        .map_or(true, |r| r.name != elevated_role)
            })
            .collect()
    }

    /// This member's own overwrite on the channel, if one exists.
    pub fn member_overwrite(&self, discord_id: &str) -> Option<&'a PermissionOverwrite> {
        self.channel
            .permission_overwrites
            .iter()
            .find(|o| o.kind == OVERWRITE_MEMBER && o.id == discord_id)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::services::discord::DiscordUser;

    pub const GUILD_ID: &str = "100000000000000000";

    pub fn member(id: &str, roles: &[&str], bot: bool) -> GuildMember {
        GuildMember {
            user: DiscordUser {
                id: id.to_string(),
                username: format!("user{id}"),
                global_name: None,
                avatar: None,
                bot,
                email: None,
            },
            roles: roles.iter().map(|r| r.to_string()).collect(),
            nick: None,
        }
    }

    /// A guild with an `Admin` role (id 20), a private club channel 77 that
    /// owner 500 and member 501 can see, and an unrelated public channel 88.
    pub fn snapshot() -> GuildSnapshot {
        let guild = Guild {
            id: GUILD_ID.to_string(),
            owner_id: "1".to_string(),
            roles: vec![
                Role {
                    id: GUILD_ID.to_string(),
                    name: "@everyone".to_string(),
                    permissions: Permissions::MEMBER,
                    position: 0,
                },
                Role {
                    id: "20".to_string(),
                    name: "Admin".to_string(),
                    permissions: Permissions::ADMINISTRATOR,
                    position: 10,
                },
            ],
        };
        let channels = vec![
            Channel {
                id: "77".to_string(),
                kind: CHANNEL_TYPE_TEXT,
                name: Some("slow-burners".to_string()),
                nsfw: false,
                permission_overwrites: vec![
                    PermissionOverwrite::role(GUILD_ID, Permissions::NONE, Permissions::VIEW_CHANNEL),
                    PermissionOverwrite::member(
                        "500",
                        Permissions::MEMBER
                            | Permissions::MANAGE_MESSAGES
                            | Permissions::MANAGE_CHANNELS,
                        Permissions::NONE,
                    ),
                    PermissionOverwrite::member("501", Permissions::MEMBER, Permissions::NONE),
                    PermissionOverwrite::member("502", Permissions::NONE, Permissions::MEMBER),
                ],
            },
            Channel {
                id: "88".to_string(),
                kind: CHANNEL_TYPE_TEXT,
                name: Some("general".to_string()),
                nsfw: false,
                permission_overwrites: vec![],
            },
        ];
        let members = vec![
            member("500", &[], false),
            member("501", &[], false),
            member("502", &[], false),
            member("600", &["20"], false),
            member("700", &[], true),
        ];
        GuildSnapshot::new(guild, channels, members)
    }

    #[test]
    fn test_channel_members_follow_overwrites() {
        let snap = snapshot();
        let channel = snap.channel("77").unwrap();
        let mut ids: Vec<&str> = channel.members().iter().map(|m| m.user.id.as_str()).collect();
        ids.sort();
        // The admin sees every channel; the bot and the leaver do not.
        assert_eq!(ids, vec!["500", "501", "600"]);
        assert!(channel.member("502").is_none());
    }

    #[test]
    fn test_countable_members_skip_admins_and_bots() {
        let snap = snapshot();
        let channel = snap.channel("77").unwrap();
        let ids: Vec<&str> = channel
            .countable_members("500", "Admin")
            .iter()
            .map(|m| m.user.id.as_str())
            .collect();
        assert_eq!(ids, vec!["500", "501"]);

        // An admin who owns the club counts.
        let owned_by_admin = channel.countable_members("600", "Admin");
        assert_eq!(owned_by_admin.len(), 3);
    }

    #[test]
    fn test_channels_visible_to() {
        let snap = snapshot();
        assert_eq!(snap.channels_visible_to("501"), vec!["77", "88"]);
        assert_eq!(snap.channels_visible_to("502"), vec!["88"]);
        assert!(snap.channels_visible_to("unknown").is_empty());
    }

    #[test]
    fn test_missing_channel() {
        let snap = snapshot();
        assert!(snap.channel("404").is_none());
    }

    #[test]
    fn test_member_overwrite_lookup() {
        let snap = snapshot();
        let channel = snap.channel("77").unwrap();
        assert!(channel
            .member_overwrite("502")
            .is_some_and(|o| o.deny.contains(Permissions::VIEW_CHANNEL)));
        assert!(channel.member_overwrite("600").is_none());
    }
}
