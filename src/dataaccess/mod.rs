//! The `DataAccess` port: user/group CRUD, permission assignment, bundle
//! install state, command lookup, and the audit log.
//! `memory` backs tests and a standalone daemon; `orm` is the sea-orm-backed
//! implementation a deployment actually runs.

pub mod memory;
pub mod orm;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::bundle::Bundle;
use crate::error::Result;
use crate::resolver::CommandEntryFinder;

/// `{RequestID, BundleName, CommandName, Adapter, ChannelID, UserID, UserName,
/// UserEmail, Parameters, Timestamp, TraceContext}`. `BundleName`/`CommandName`
/// stand in for the glossary's `CommandEntry`: at `RequestBegin` time (before
/// resolution) only the addressed bundle:command names are known, not the
/// resolved `CommandEntry` itself.
#[derive(Clone, Debug)]
pub struct CommandRequest {
    pub request_id: i64,
    pub bundle_name: String,
    pub command_name: String,
    pub adapter: String,
    pub channel_id: String,
    pub user_id: String,
    pub user_name: String,
    pub user_email: Option<String>,
    pub parameters: Vec<String>,
    pub timestamp: DateTime<Utc>,
    pub trace_context: String,
}

/// `{Request, Status, Title, Output, Error, Duration, Structured, Payload}`.
#[derive(Clone, Debug)]
pub struct CommandResponse {
    pub request_id: i64,
    pub status: i32,
    pub title: String,
    pub output: Vec<String>,
    pub error: Option<String>,
    pub duration: std::time::Duration,
    pub structured: bool,
    pub payload: Option<serde_json::Value>,
}

#[derive(Clone, Debug, Default)]
pub struct User {
    pub name: String,
    pub email: Option<String>,
    pub full_name: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct Group {
    pub name: String,
}

/// The persistence port. A supertrait of [`CommandEntryFinder`] since bundle
/// lookup is one of its responsibilities, not a separate collaborator.
#[async_trait]
pub trait DataAccess: CommandEntryFinder {
    async fn user_create(&self, user: User) -> Result<()>;
    async fn user_get(&self, name: &str) -> Result<Option<User>>;
    async fn user_delete(&self, name: &str) -> Result<()>;

    async fn group_create(&self, group: Group) -> Result<()>;
    async fn group_delete(&self, name: &str) -> Result<()>;
    async fn group_add_user(&self, group: &str, user: &str) -> Result<()>;
    async fn group_remove_user(&self, group: &str, user: &str) -> Result<()>;
    async fn group_grant_permission(&self, group: &str, permission: &str) -> Result<()>;
    async fn group_revoke_permission(&self, group: &str, permission: &str) -> Result<()>;

    async fn bundle_install(&self, bundle: Bundle, yaml: String) -> Result<()>;
    async fn bundle_enable(&self, name: &str) -> Result<()>;
    async fn bundle_disable(&self, name: &str) -> Result<()>;

    /// `UserPermissionList`: the flattened, de-duplicated union of every
    /// permission granted by a group the user belongs to.
    async fn user_permission_list(&self, user_name: &str) -> Result<Vec<String>>;

    /// Assigns `RequestID` and persists the audit row.
    async fn request_begin(&self, request: &CommandRequest) -> Result<i64>;

    /// Finalizes the audit row.
    async fn request_close(&self, response: &CommandResponse) -> Result<()>;
}
