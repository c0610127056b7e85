//! Audit log row for one dispatched command, opened by `RequestBegin` and
//! closed by `RequestClose`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, DeriveEntityModel)]
#[sea_orm(table_name = "requests")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub bundle_name: String,
    pub command_name: String,
    pub adapter: String,
    pub channel_id: String,
    pub user_id: String,
    pub user_name: String,
    pub parameters: String,
    pub status: Option<i32>,
    pub error: Option<String>,
    pub started_at: DateTimeUtc,
    pub closed_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
