use sea_orm_migration::prelude::*;

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m20260101_000001_create_gort_schema"
    }
}

#[derive(DeriveIden)]
enum Users {
    Table,
    Name,
    Email,
    FullName,
}

#[derive(DeriveIden)]
enum Groups {
    Table,
    Name,
}

#[derive(DeriveIden)]
enum GroupMembers {
    Table,
    Id,
    GroupName,
    UserName,
}

#[derive(DeriveIden)]
enum GroupPermissions {
    Table,
    Id,
    GroupName,
    Permission,
}

#[derive(DeriveIden)]
enum Bundles {
    Table,
    Name,
    Version,
    Enabled,
    Yaml,
}

#[derive(DeriveIden)]
enum BundleCommands {
    Table,
    Id,
    BundleName,
    CommandName,
}

#[derive(DeriveIden)]
enum Requests {
    Table,
    Id,
    BundleName,
    CommandName,
    Adapter,
    ChannelId,
    UserId,
    UserName,
    Parameters,
    Status,
    Error,
    StartedAt,
    ClosedAt,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Users::Name).string().not_null().primary_key())
                    .col(ColumnDef::new(Users::Email).string())
                    .col(ColumnDef::new(Users::FullName).string())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Groups::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Groups::Name).string().not_null().primary_key())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(GroupMembers::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(GroupMembers::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(GroupMembers::GroupName).string().not_null())
                    .col(ColumnDef::new(GroupMembers::UserName).string().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .from(GroupMembers::Table, GroupMembers::GroupName)
                            .to(Groups::Table, Groups::Name)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(GroupMembers::Table, GroupMembers::UserName)
                            .to(Users::Table, Users::Name)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(GroupPermissions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(GroupPermissions::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(GroupPermissions::GroupName).string().not_null())
                    .col(ColumnDef::new(GroupPermissions::Permission).string().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .from(GroupPermissions::Table, GroupPermissions::GroupName)
                            .to(Groups::Table, Groups::Name)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Bundles::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Bundles::Name).string().not_null().primary_key())
                    .col(ColumnDef::new(Bundles::Version).string().not_null())
                    .col(ColumnDef::new(Bundles::Enabled).boolean().not_null())
                    .col(ColumnDef::new(Bundles::Yaml).text().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(BundleCommands::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(BundleCommands::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(BundleCommands::BundleName).string().not_null())
                    .col(ColumnDef::new(BundleCommands::CommandName).string().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .from(BundleCommands::Table, BundleCommands::BundleName)
                            .to(Bundles::Table, Bundles::Name)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Requests::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Requests::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Requests::BundleName).string().not_null())
                    .col(ColumnDef::new(Requests::CommandName).string().not_null())
                    .col(ColumnDef::new(Requests::Adapter).string().not_null())
                    .col(ColumnDef::new(Requests::ChannelId).string().not_null())
                    .col(ColumnDef::new(Requests::UserId).string().not_null())
                    .col(ColumnDef::new(Requests::UserName).string().not_null())
                    .col(ColumnDef::new(Requests::Parameters).text().not_null())
                    .col(ColumnDef::new(Requests::Status).integer())
                    .col(ColumnDef::new(Requests::Error).text())
                    .col(ColumnDef::new(Requests::StartedAt).timestamp_with_time_zone().not_null())
                    .col(ColumnDef::new(Requests::ClosedAt).timestamp_with_time_zone())
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(Requests::Table).to_owned()).await?;
        manager
            .drop_table(Table::drop().table(BundleCommands::Table).to_owned())
            .await?;
        manager.drop_table(Table::drop().table(Bundles::Table).to_owned()).await?;
        manager
            .drop_table(Table::drop().table(GroupPermissions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(GroupMembers::Table).to_owned())
            .await?;
        manager.drop_table(Table::drop().table(Groups::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(Users::Table).to_owned()).await?;
        Ok(())
    }
}
