//! Domain snapshots of platform entities.
//!
//! These are plain values. Anything holding one holds a copy taken at fetch
//! time, never a reference into the resolver's caches.

use std::collections::{BTreeSet, HashMap};

static NO_ROLES: BTreeSet<String> = BTreeSet::new();

/// A role as known to a guild.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleInfo {
    pub name: String,
}

/// A guild and its roles.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GuildInfo {
    pub id: String,
    pub name: String,
    pub roles: HashMap<String, RoleInfo>,
}

impl GuildInfo {
    /// A record carrying only the id.
    pub fn stub(id: &str) -> Self {
        Self { id: id.to_string(), ..Default::default() }
    }

    /// Find the id of the role called `name`.
    pub fn tracking_role_id(&self, name: &str) -> Option<&str> {
        self.roles.iter().find(|(_, role)| role.name == name).map(|(id, _)| id.as_str())
    }
}

/// A channel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelInfo {
    pub id: String,
    pub name: String,
}

impl ChannelInfo {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self { id: id.into(), name: name.into() }
    }

    /// A record carrying only the id.
    pub fn stub(id: &str) -> Self {
        Self { id: id.to_string(), ..Default::default() }
    }
}

/// A user's membership of one guild.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemberInfo {
    pub nickname: String,
    pub roles: BTreeSet<String>,
}

impl MemberInfo {
    /// A membership with no nickname and no roles carries nothing worth keeping.
    pub fn is_blank(&self) -> bool {
        self.nickname.is_empty() && self.roles.is_empty()
    }
}

/// A user, plus whatever guild memberships have been resolved for it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserInfo {
    pub id: String,
    pub username: String,
    pub global_name: String,
    pub guild_membership: HashMap<String, MemberInfo>,
}

impl UserInfo {
    /// A record carrying only the id.
    pub fn stub(id: &str) -> Self {
        Self { id: id.to_string(), ..Default::default() }
    }

    /// The name to show for this user in `guild_id`.
    ///
    /// Per-guild nickname first, then the global name, then the username.
    pub fn display_name(&self, guild_id: &str) -> &str {
        if let Some(member) = self.guild_membership.get(guild_id)
            && !member.nickname.is_empty()
        {
            return &member.nickname;
        }

        if !self.global_name.is_empty() {
            return &self.global_name;
        }

        &self.username
    }

    /// The roles this user holds in `guild_id`; empty when that membership is unknown.
    pub fn roles(&self, guild_id: &str) -> &BTreeSet<String> {
        self.guild_membership.get(guild_id).map_or(&NO_ROLES, |member| &member.roles)
    }

    pub fn has_role(&self, guild_id: &str, role_id: &str) -> bool {
        self.roles(guild_id).contains(role_id)
    }
}

/// Where a user currently is in voice. `None` means not connected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VoiceState {
    pub channel: Option<ChannelInfo>,
}

impl VoiceState {
    pub fn channel_id(&self) -> Option<&str> {
        self.channel.as_ref().map(|channel| channel.id.as_str())
    }
}

// Tests.

#[cfg(test)]
mod tests {
    use super::*;

    fn robert(nickname: &str, global_name: &str) -> UserInfo {
        let mut user = UserInfo {
            id: "42".to_string(),
            username: "robert123".to_string(),
            global_name: global_name.to_string(),
            ..Default::default()
        };
        user.guild_membership.insert("G".to_string(), MemberInfo { nickname: nickname.to_string(), ..Default::default() });
        user
    }

    #[test]
    fn test_display_name_prefers_nickname() {
        assert_eq!(robert("Bob", "Robert").display_name("G"), "Bob");
    }

    #[test]
    fn test_display_name_falls_back_to_global_name() {
        assert_eq!(robert("", "Robert").display_name("G"), "Robert");
    }

    #[test]
    fn test_display_name_falls_back_to_username() {
        assert_eq!(robert("", "").display_name("G"), "robert123");
    }

    #[test]
    fn test_display_name_ignores_other_guilds() {
        assert_eq!(robert("Bob", "Robert").display_name("other"), "Robert");
    }

    #[test]
    fn test_role_lookup() {
        let mut guild = GuildInfo::stub("G");
        guild.roles.insert("r1".to_string(), RoleInfo { name: "Tracked".to_string() });

        let mut user = robert("", "");
        user.guild_membership.get_mut("G").unwrap().roles.insert("r1".to_string());

        assert_eq!(guild.tracking_role_id("Tracked"), Some("r1"));
        assert_eq!(guild.tracking_role_id("Admin"), None);
        assert!(user.has_role("G", "r1"));
        assert!(!user.has_role("other", "r1"));
        assert!(user.roles("other").is_empty());
    }
}
