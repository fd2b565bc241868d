//! Field-level diffs applied to cached records on push updates.
//!
//! Each function mutates the cached record to match the incoming payload and
//! returns one [`FieldChange`] per property that actually changed.

use std::collections::BTreeSet;

use crate::base::{
    entity::{ChannelInfo, MemberInfo, UserInfo},
    event::{FieldChange, RawChannelUpdate, RawMemberUpdate},
};

fn set_field(changes: &mut Vec<FieldChange>, property: impl Into<String>, field: &mut String, incoming: &str) {
    if field.as_str() != incoming {
        changes.push(FieldChange::new(property, field.as_str(), incoming));
        *field = incoming.to_string();
    }
}

fn describe_roles(roles: &BTreeSet<String>) -> String {
    roles.iter().map(String::as_str).collect::<Vec<_>>().join(",")
}

fn describe_member(member: &MemberInfo) -> String {
    format!("nickname={} roles={}", member.nickname, describe_roles(&member.roles))
}

/// Apply a channel update.
pub fn apply_channel_update(cached: &mut ChannelInfo, update: &RawChannelUpdate) -> Vec<FieldChange> {
    let mut changes = Vec::new();

    set_field(&mut changes, "name", &mut cached.name, &update.name);

    changes
}

/// Apply the account-wide fields of a member update.
pub fn apply_identity(cached: &mut UserInfo, update: &RawMemberUpdate) -> Vec<FieldChange> {
    let mut changes = Vec::new();

    set_field(&mut changes, "username", &mut cached.username, &update.username);
    set_field(&mut changes, "global_name", &mut cached.global_name, &update.global_name);

    changes
}

/// Apply the per-guild fields of a member update.
///
/// A blank incoming membership (no nickname, no roles) deletes the entry rather
/// than overwriting it with an empty one.
pub fn apply_membership(cached: &mut UserInfo, update: &RawMemberUpdate) -> Vec<FieldChange> {
    let mut changes = Vec::new();
    let guild_id = &update.guild_id;
    let incoming = MemberInfo {
        nickname: update.nickname.clone(),
        roles: update.roles.clone(),
    };

    if incoming.is_blank() {
        if let Some(removed) = cached.guild_membership.remove(guild_id) {
            changes.push(FieldChange::new(format!("guild[{guild_id}]"), describe_member(&removed), ""));
        }
        return changes;
    }

    let member = cached.guild_membership.entry(guild_id.clone()).or_default();

    set_field(&mut changes, format!("guild[{guild_id}].nickname"), &mut member.nickname, &incoming.nickname);

    if member.roles != incoming.roles {
        changes.push(FieldChange::new(format!("guild[{guild_id}].roles"), describe_roles(&member.roles), describe_roles(&incoming.roles)));
        member.roles = incoming.roles;
    }

    changes
}

/// Apply both the account-wide and per-guild fields of a member update.
pub fn apply_member_update(cached: &mut UserInfo, update: &RawMemberUpdate) -> Vec<FieldChange> {
    let mut changes = apply_identity(cached, update);
    changes.extend(apply_membership(cached, update));
    changes
}

/// Build a record for a member update that has nothing cached to diff against.
pub fn user_from_member_update(update: &RawMemberUpdate, with_membership: bool) -> UserInfo {
    let mut user = UserInfo {
        id: update.user_id.clone(),
        username: update.username.clone(),
        global_name: update.global_name.clone(),
        ..Default::default()
    };

    if with_membership {
        apply_membership(&mut user, update);
    }

    user
}

// Tests.

#[cfg(test)]
mod tests {
    use super::*;

    fn member_update(nickname: &str, roles: &[&str]) -> RawMemberUpdate {
        RawMemberUpdate {
            guild_id: "G".to_string(),
            user_id: "42".to_string(),
            username: "robert123".to_string(),
            global_name: "Robert".to_string(),
            nickname: nickname.to_string(),
            roles: roles.iter().map(|r| r.to_string()).collect(),
        }
    }

    #[test]
    fn test_channel_rename_yields_one_change() {
        let mut cached = ChannelInfo::new("1", "old");
        let update = RawChannelUpdate {
            guild_id: "G".to_string(),
            channel_id: "1".to_string(),
            name: "new".to_string(),
        };

        let changes = apply_channel_update(&mut cached, &update);

        assert_eq!(changes, vec![FieldChange::new("name", "old", "new")]);
        assert_eq!(cached.name, "new");
    }

    #[test]
    fn test_identical_channel_yields_no_changes() {
        let mut cached = ChannelInfo::new("1", "same");
        let update = RawChannelUpdate {
            guild_id: "G".to_string(),
            channel_id: "1".to_string(),
            name: "same".to_string(),
        };

        assert!(apply_channel_update(&mut cached, &update).is_empty());
    }

    #[test]
    fn test_member_update_reports_each_changed_field() {
        let mut cached = user_from_member_update(&member_update("Bob", &["r1"]), true);
        let mut update = member_update("Bobby", &["r1", "r2"]);
        update.global_name = "Rob".to_string();

        let changes = apply_member_update(&mut cached, &update);

        assert_eq!(
            changes,
            vec![
                FieldChange::new("global_name", "Robert", "Rob"),
                FieldChange::new("guild[G].nickname", "Bob", "Bobby"),
                FieldChange::new("guild[G].roles", "r1", "r1,r2"),
            ]
        );
        assert_eq!(cached.display_name("G"), "Bobby");
    }

    #[test]
    fn test_unchanged_member_yields_no_changes() {
        let mut cached = user_from_member_update(&member_update("Bob", &["r1"]), true);

        assert!(apply_member_update(&mut cached, &member_update("Bob", &["r1"])).is_empty());
    }

    #[test]
    fn test_blank_membership_deletes_entry() {
        let mut cached = user_from_member_update(&member_update("Bob", &["r1"]), true);

        let changes = apply_membership(&mut cached, &member_update("", &[]));

        assert_eq!(changes, vec![FieldChange::new("guild[G]", "nickname=Bob roles=r1", "")]);
        assert!(!cached.guild_membership.contains_key("G"));
    }

    #[test]
    fn test_blank_membership_on_unknown_guild_is_a_no_op() {
        let mut cached = user_from_member_update(&member_update("", &[]), true);

        assert!(cached.guild_membership.is_empty());
        assert!(apply_membership(&mut cached, &member_update("", &[])).is_empty());
    }
}
