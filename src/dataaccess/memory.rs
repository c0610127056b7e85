//! In-process `DataAccess`, for tests and a database-less daemon. Registries
//! follow the same insert/read `DashMap` idiom as [`crate::adapter::AdapterManager`];
//! `RequestID` allocation is a plain `AtomicI64`, since only process-wide
//! uniqueness is required here, not durability across restarts.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::bundle::{Bundle, CommandEntry};
use crate::dataaccess::{CommandRequest, CommandResponse, DataAccess, Group, User};
use crate::error::{GortError, Result};
use crate::resolver::CommandEntryFinder;

struct InstalledBundle {
    bundle: Bundle,
    enabled: bool,
}

pub struct MemoryDataAccess {
    users: DashMap<String, User>,
    groups: DashMap<String, Group>,
    group_members: DashMap<String, BTreeSet<String>>,
    group_permissions: DashMap<String, BTreeSet<String>>,
    bundles: DashMap<String, InstalledBundle>,
    next_request_id: AtomicI64,
}

impl Default for MemoryDataAccess {
    fn default() -> Self {
        Self {
            users: DashMap::new(),
            groups: DashMap::new(),
            group_members: DashMap::new(),
            group_permissions: DashMap::new(),
            bundles: DashMap::new(),
            // starts at 1 so a real request's id never collides with the `0`
            // sentinel used for un-begun/errored `CommandResponse`s.
            next_request_id: AtomicI64::new(1),
        }
    }
}

impl MemoryDataAccess {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CommandEntryFinder for MemoryDataAccess {
    async fn find_command_entry(&self, bundle: &str, name: &str) -> Result<Vec<CommandEntry>> {
        Ok(self
            .bundles
            .iter()
            .filter(|entry| entry.enabled && (bundle.is_empty() || entry.bundle.name == bundle))
            .filter_map(|entry| entry.bundle.command_entry(name))
            .collect())
    }

    async fn find_command_entry_by_trigger(&self, tokens: &[String]) -> Result<Vec<CommandEntry>> {
        let joined = tokens.join(" ");
        let mut matches = Vec::new();
        for entry in self.bundles.iter() {
            if !entry.enabled {
                continue;
            }
            for trigger in &entry.bundle.triggers {
                let is_match = trigger.compiled().map(|re| re.is_match(&joined)).unwrap_or(false);
                if !is_match {
                    continue;
                }
                if let Some(name) = trigger.command_string.split(' ').next() {
                    if let Some(command_entry) = entry.bundle.command_entry(name) {
                        matches.push(command_entry);
                    }
                }
            }
        }
        Ok(matches)
    }
}

#[async_trait]
impl DataAccess for MemoryDataAccess {
    async fn user_create(&self, user: User) -> Result<()> {
        self.users.insert(user.name.clone(), user);
        Ok(())
    }

    async fn user_get(&self, name: &str) -> Result<Option<User>> {
        Ok(self.users.get(name).map(|entry| entry.clone()))
    }

    async fn user_delete(&self, name: &str) -> Result<()> {
        self.users.remove(name);
        Ok(())
    }

    async fn group_create(&self, group: Group) -> Result<()> {
        self.group_members.entry(group.name.clone()).or_default();
        self.group_permissions.entry(group.name.clone()).or_default();
        self.groups.insert(group.name.clone(), group);
        Ok(())
    }

    async fn group_delete(&self, name: &str) -> Result<()> {
        self.groups.remove(name);
        self.group_members.remove(name);
        self.group_permissions.remove(name);
        Ok(())
    }

    async fn group_add_user(&self, group: &str, user: &str) -> Result<()> {
        self.group_members.entry(group.to_owned()).or_default().insert(user.to_owned());
        Ok(())
    }

    async fn group_remove_user(&self, group: &str, user: &str) -> Result<()> {
        if let Some(mut members) = self.group_members.get_mut(group) {
            members.remove(user);
        }
        Ok(())
    }

    async fn group_grant_permission(&self, group: &str, permission: &str) -> Result<()> {
        self.group_permissions
            .entry(group.to_owned())
            .or_default()
            .insert(permission.to_owned());
        Ok(())
    }

    async fn group_revoke_permission(&self, group: &str, permission: &str) -> Result<()> {
        if let Some(mut permissions) = self.group_permissions.get_mut(group) {
            permissions.remove(permission);
        }
        Ok(())
    }

    async fn bundle_install(&self, bundle: Bundle, _yaml: String) -> Result<()> {
        self.bundles.insert(
            bundle.name.clone(),
            InstalledBundle {
                bundle,
                enabled: true,
            },
        );
        Ok(())
    }

    async fn bundle_enable(&self, name: &str) -> Result<()> {
        self.bundles
            .get_mut(name)
            .ok_or_else(|| GortError::DataAccess(format!("no such bundle: {name}")))?
            .enabled = true;
        Ok(())
    }

    async fn bundle_disable(&self, name: &str) -> Result<()> {
        self.bundles
            .get_mut(name)
            .ok_or_else(|| GortError::DataAccess(format!("no such bundle: {name}")))?
            .enabled = false;
        Ok(())
    }

    async fn user_permission_list(&self, user_name: &str) -> Result<Vec<String>> {
        let mut permissions = BTreeSet::new();
        for members in self.group_members.iter() {
            if !members.contains(user_name) {
                continue;
            }
            if let Some(granted) = self.group_permissions.get(members.key()) {
                permissions.extend(granted.iter().cloned());
            }
        }
        Ok(permissions.into_iter().collect())
    }

    async fn request_begin(&self, _request: &CommandRequest) -> Result<i64> {
        Ok(self.next_request_id.fetch_add(1, Ordering::SeqCst))
    }

    async fn request_close(&self, _response: &CommandResponse) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn permissions_flow_through_group_membership() {
        let store = MemoryDataAccess::new();
        store
            .group_create(Group {
                name: "admins".to_owned(),
            })
            .await
            .unwrap();
        store.group_add_user("admins", "alice").await.unwrap();
        store.group_grant_permission("admins", "gort:destroy").await.unwrap();

        let permissions = store.user_permission_list("alice").await.unwrap();
        assert_eq!(permissions, vec!["gort:destroy".to_owned()]);

        let permissions = store.user_permission_list("bob").await.unwrap();
        assert!(permissions.is_empty());
    }

    #[tokio::test]
    async fn request_ids_are_unique_and_increasing() {
        let store = MemoryDataAccess::new();
        let request = CommandRequest {
            request_id: 0,
            bundle_name: "gort".to_owned(),
            command_name: "echo".to_owned(),
            adapter: "mock".to_owned(),
            channel_id: "c".to_owned(),
            user_id: "u".to_owned(),
            user_name: "alice".to_owned(),
            user_email: None,
            parameters: vec![],
            timestamp: chrono::Utc::now(),
            trace_context: String::new(),
        };
        let first = store.request_begin(&request).await.unwrap();
        let second = store.request_begin(&request).await.unwrap();
        // starts at 1, not 0: 0 is reserved as the sentinel for un-begun/errored responses.
        assert_eq!(first, 1);
        assert!(second > first);
    }

    #[tokio::test]
    async fn disabled_bundle_is_not_resolved() {
        let store = MemoryDataAccess::new();
        let bundle = crate::bundle::parse_bundle(
            br#"
name: gort
version: "1.0.0"
docker:
  image: gort/gort
  tag: latest
commands:
  echo:
    executable: ["echo"]
    rules: ["allow"]
"#,
        )
        .unwrap();
        store.bundle_install(bundle, String::new()).await.unwrap();
        store.bundle_disable("gort").await.unwrap();
        let matches = store.find_command_entry("", "echo").await.unwrap();
        assert!(matches.is_empty());
    }
}
