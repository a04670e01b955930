use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ContentFiles::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ContentFiles::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ContentFiles::ContentId).uuid().not_null())
                    .col(ColumnDef::new(ContentFiles::Kind).string().not_null())
                    .col(ColumnDef::new(ContentFiles::Subtype).string())
                    .col(ColumnDef::new(ContentFiles::Names).json().not_null())
                    .col(ColumnDef::new(ContentFiles::CreatedAt).timestamp().not_null())
                    .col(ColumnDef::new(ContentFiles::UpdatedAt).timestamp().not_null())
                    .col(ColumnDef::new(ContentFiles::DeletedAt).timestamp())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_content_files_owner_kind")
                    .table(ContentFiles::Table)
                    .col(ContentFiles::ContentId)
                    .col(ContentFiles::Kind)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ContentFiles::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum ContentFiles {
    Table,
    Id,
    ContentId,
    Kind,
    Subtype,
    Names,
    CreatedAt,
    UpdatedAt,
    DeletedAt,
}
