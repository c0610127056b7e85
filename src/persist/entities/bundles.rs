//! An installed bundle's metadata and enabled/disabled state. The bundle's
//! YAML body is stored verbatim alongside the parsed columns needed for
//! resolution, so a reinstall or reload never loses fidelity to the source
//! file.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, DeriveEntityModel)]
#[sea_orm(table_name = "bundles")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub name: String,
    pub version: String,
    pub enabled: bool,
    pub yaml: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::bundle_commands::Entity")]
    BundleCommands,
}

impl Related<super::bundle_commands::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BundleCommands.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
