//! The sea-orm-backed `DataAccess` implementation: connects via
//! `Database::connect` against a `ConnectOptions` built from config, with no
//! `lazy_static` global involved — the connection is owned by whoever
//! constructs an [`OrmDataAccess`].

use async_trait::async_trait;
use chrono::Utc;
use itertools::Itertools;
use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectOptions, Database, DatabaseConnection, EntityTrait, QueryFilter, Set};

use crate::bundle::{parse_bundle, Bundle, CommandEntry};
use crate::dataaccess::{CommandRequest, CommandResponse, DataAccess, Group, User};
use crate::error::{GortError, Result};
use crate::persist::entities::{bundles, group_members, group_permissions, groups, requests, users};
use crate::resolver::CommandEntryFinder;

pub struct OrmDataAccess {
    db: DatabaseConnection,
}

impl OrmDataAccess {
    pub async fn connect(url: &str) -> Result<Self> {
        let db = Database::connect(ConnectOptions::new(url.to_owned())).await?;
        Ok(Self { db })
    }

    pub fn from_connection(db: DatabaseConnection) -> Self {
        Self { db }
    }

    async fn enabled_bundles(&self) -> Result<Vec<Bundle>> {
        let rows = bundles::Entity::find().all(&self.db).await?;
        rows.into_iter()
            .filter(|row| row.enabled)
            .map(|row| parse_bundle(row.yaml.as_bytes()))
            .collect()
    }
}

#[async_trait]
impl CommandEntryFinder for OrmDataAccess {
    async fn find_command_entry(&self, bundle: &str, name: &str) -> Result<Vec<CommandEntry>> {
        Ok(self
            .enabled_bundles()
            .await?
            .iter()
            .filter(|b| bundle.is_empty() || b.name == bundle)
            .filter_map(|b| b.command_entry(name))
            .collect())
    }

    async fn find_command_entry_by_trigger(&self, tokens: &[String]) -> Result<Vec<CommandEntry>> {
        let joined = tokens.join(" ");
        let mut matches = Vec::new();
        for bundle in self.enabled_bundles().await? {
            for trigger in &bundle.triggers {
                let is_match = trigger.compiled().map(|re| re.is_match(&joined)).unwrap_or(false);
                if !is_match {
                    continue;
                }
                if let Some(name) = trigger.command_string.split(' ').next() {
                    if let Some(entry) = bundle.command_entry(name) {
                        matches.push(entry);
                    }
                }
            }
        }
        Ok(matches)
    }
}

#[async_trait]
impl DataAccess for OrmDataAccess {
    async fn user_create(&self, user: User) -> Result<()> {
        users::ActiveModel {
            name: Set(user.name),
            email: Set(user.email),
            full_name: Set(user.full_name),
        }
        .insert(&self.db)
        .await?;
        Ok(())
    }

    async fn user_get(&self, name: &str) -> Result<Option<User>> {
        let row = users::Entity::find_by_id(name.to_owned()).one(&self.db).await?;
        Ok(row.map(|row| User {
            name: row.name,
            email: row.email,
            full_name: row.full_name,
        }))
    }

    async fn user_delete(&self, name: &str) -> Result<()> {
        users::Entity::delete_by_id(name.to_owned()).exec(&self.db).await?;
        Ok(())
    }

    async fn group_create(&self, group: Group) -> Result<()> {
        groups::ActiveModel { name: Set(group.name) }.insert(&self.db).await?;
        Ok(())
    }

    async fn group_delete(&self, name: &str) -> Result<()> {
        groups::Entity::delete_by_id(name.to_owned()).exec(&self.db).await?;
        Ok(())
    }

    async fn group_add_user(&self, group: &str, user: &str) -> Result<()> {
        group_members::ActiveModel {
            group_name: Set(group.to_owned()),
            user_name: Set(user.to_owned()),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;
        Ok(())
    }

    async fn group_remove_user(&self, group: &str, user: &str) -> Result<()> {
        group_members::Entity::delete_many()
            .filter(group_members::Column::GroupName.eq(group.to_owned()))
            .filter(group_members::Column::UserName.eq(user.to_owned()))
            .exec(&self.db)
            .await?;
        Ok(())
    }

    async fn group_grant_permission(&self, group: &str, permission: &str) -> Result<()> {
        group_permissions::ActiveModel {
            group_name: Set(group.to_owned()),
            permission: Set(permission.to_owned()),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;
        Ok(())
    }

    async fn group_revoke_permission(&self, group: &str, permission: &str) -> Result<()> {
        group_permissions::Entity::delete_many()
            .filter(group_permissions::Column::GroupName.eq(group.to_owned()))
            .filter(group_permissions::Column::Permission.eq(permission.to_owned()))
            .exec(&self.db)
            .await?;
        Ok(())
    }

    async fn bundle_install(&self, bundle: Bundle, yaml: String) -> Result<()> {
        bundles::ActiveModel {
            name: Set(bundle.name),
            version: Set(bundle.version),
            enabled: Set(true),
            yaml: Set(yaml),
        }
        .insert(&self.db)
        .await?;
        Ok(())
    }

    async fn bundle_enable(&self, name: &str) -> Result<()> {
        let row = bundles::Entity::find_by_id(name.to_owned())
            .one(&self.db)
            .await?
            .ok_or_else(|| GortError::DataAccess(format!("no such bundle: {name}")))?;
        let mut active: bundles::ActiveModel = row.into();
        active.enabled = Set(true);
        active.update(&self.db).await?;
        Ok(())
    }

    async fn bundle_disable(&self, name: &str) -> Result<()> {
        let row = bundles::Entity::find_by_id(name.to_owned())
            .one(&self.db)
            .await?
            .ok_or_else(|| GortError::DataAccess(format!("no such bundle: {name}")))?;
        let mut active: bundles::ActiveModel = row.into();
        active.enabled = Set(false);
        active.update(&self.db).await?;
        Ok(())
    }

    async fn user_permission_list(&self, user_name: &str) -> Result<Vec<String>> {
        let memberships = group_members::Entity::find()
            .filter(group_members::Column::UserName.eq(user_name.to_owned()))
            .all(&self.db)
            .await?;
        let mut granted_per_group = Vec::with_capacity(memberships.len());
        for membership in memberships {
            let granted = group_permissions::Entity::find()
                .filter(group_permissions::Column::GroupName.eq(membership.group_name))
                .all(&self.db)
                .await?;
            granted_per_group.push(granted.into_iter().map(|row| row.permission));
        }
        // flattened, de-duplicated union of every permission granted by a
        // group the user belongs to.
        Ok(granted_per_group.into_iter().flatten().sorted().dedup().collect())
    }

    async fn request_begin(&self, request: &CommandRequest) -> Result<i64> {
        let row = requests::ActiveModel {
            bundle_name: Set(request.bundle_name.clone()),
            command_name: Set(request.command_name.clone()),
            adapter: Set(request.adapter.clone()),
            channel_id: Set(request.channel_id.clone()),
            user_id: Set(request.user_id.clone()),
            user_name: Set(request.user_name.clone()),
            parameters: Set(request.parameters.join(" ")),
            status: Set(None),
            error: Set(None),
            started_at: Set(Utc::now()),
            closed_at: Set(None),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;
        Ok(row.id)
    }

    async fn request_close(&self, response: &CommandResponse) -> Result<()> {
        if let Some(row) = requests::Entity::find_by_id(response.request_id).one(&self.db).await? {
            let mut active: requests::ActiveModel = row.into();
            active.status = Set(Some(response.status));
            active.error = Set(response.error.clone());
            active.closed_at = Set(Some(Utc::now()));
            active.update(&self.db).await?;
        }
        Ok(())
    }
}
