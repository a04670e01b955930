use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(CategoryFiles::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CategoryFiles::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(CategoryFiles::CategoryId).uuid().not_null())
                    .col(ColumnDef::new(CategoryFiles::Kind).string().not_null())
                    .col(ColumnDef::new(CategoryFiles::Subtype).string())
                    .col(ColumnDef::new(CategoryFiles::Names).json().not_null())
                    .col(ColumnDef::new(CategoryFiles::CreatedAt).timestamp().not_null())
                    .col(ColumnDef::new(CategoryFiles::UpdatedAt).timestamp().not_null())
                    .col(ColumnDef::new(CategoryFiles::DeletedAt).timestamp())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_category_files_owner_kind")
                    .table(CategoryFiles::Table)
                    .col(CategoryFiles::CategoryId)
                    .col(CategoryFiles::Kind)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(CategoryFiles::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum CategoryFiles {
    Table,
    Id,
    CategoryId,
    Kind,
    Subtype,
    Names,
    CreatedAt,
    UpdatedAt,
    DeletedAt,
}
