pub mod bundle_commands;
pub mod bundles;
pub mod group_members;
pub mod group_permissions;
pub mod groups;
pub mod requests;
pub mod users;
