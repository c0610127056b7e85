//! One `commands.<name>` entry out of an installed bundle's YAML, indexed for
//! `FindCommandEntry` lookups by (bundle, name) and trigger matching.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, DeriveEntityModel)]
#[sea_orm(table_name = "bundle_commands")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub bundle_name: String,
    pub command_name: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(belongs_to = "super::bundles::Entity", from = "Column::BundleName", to = "super::bundles::Column::Name")]
    Bundle,
}

impl Related<super::bundles::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Bundle.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
