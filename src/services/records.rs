//! File record persistence.
//!
//! `content_files` and `category_files` share one shape and differ only in
//! the owner column, so their queries are generated from one template and
//! [`FileRecordStore`] routes on the owner's entity type.

use chrono::{NaiveDateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use uuid::Uuid;

use crate::error::MediaError;
use crate::models::names::VariantNames;
use crate::models::record::{EntityType, FileRecord, Owner};

macro_rules! file_table {
    ($module:ident, $owner_field:ident, $owner_column:ident, $entity_type:expr) => {
        mod $module {
            use super::*;
            use crate::entities::$module::{ActiveModel, Column, Entity, Model};

            fn to_record(model: Model) -> Result<FileRecord, MediaError> {
                Ok(FileRecord {
                    id: model.id,
                    owner: Owner {
                        entity: $entity_type,
                        id: model.$owner_field,
                    },
                    kind: model.kind,
                    subtype: model.subtype,
                    names: serde_json::from_value(model.names)?,
                    created_at: model.created_at,
                    updated_at: model.updated_at,
                    deleted_at: model.deleted_at,
                })
            }

            pub async fn find_active(
                db: &DatabaseConnection,
                owner_id: Uuid,
                kind: &str,
                subtype: Option<&str>,
            ) -> Result<Option<FileRecord>, MediaError> {
                let mut query = Entity::find()
                    .filter(Column::$owner_column.eq(owner_id))
                    .filter(Column::Kind.eq(kind))
                    .filter(Column::DeletedAt.is_null());

                if let Some(subtype) = subtype {
                    query = query.filter(Column::Subtype.eq(subtype));
                }

                query
                    .order_by_desc(Column::CreatedAt)
                    .one(db)
                    .await?
                    .map(to_record)
                    .transpose()
            }

            pub async fn list_active(
                db: &DatabaseConnection,
                owner_id: Uuid,
            ) -> Result<Vec<FileRecord>, MediaError> {
                Entity::find()
                    .filter(Column::$owner_column.eq(owner_id))
                    .filter(Column::DeletedAt.is_null())
                    .order_by_asc(Column::Kind)
                    .order_by_asc(Column::CreatedAt)
                    .all(db)
                    .await?
                    .into_iter()
                    .map(to_record)
                    .collect()
            }

            pub async fn insert(
                db: &DatabaseConnection,
                owner_id: Uuid,
                kind: &str,
                subtype: Option<&str>,
                names: &VariantNames,
            ) -> Result<FileRecord, MediaError> {
                let now = Utc::now().naive_utc();
                let model = ActiveModel {
                    id: Set(Uuid::new_v4()),
                    $owner_field: Set(owner_id),
                    kind: Set(kind.to_string()),
                    subtype: Set(subtype.map(str::to_string)),
                    names: Set(serde_json::to_value(names)?),
                    created_at: Set(now),
                    updated_at: Set(now),
                    deleted_at: Set(None),
                }
                .insert(db)
                .await?;

                to_record(model)
            }

            pub async fn update_names(
                db: &DatabaseConnection,
                id: Uuid,
                names: &VariantNames,
            ) -> Result<FileRecord, MediaError> {
                let model = Entity::find_by_id(id)
                    .one(db)
                    .await?
                    .ok_or(MediaError::RecordNotFound)?;

                let mut active: ActiveModel = model.into();
                active.names = Set(serde_json::to_value(names)?);
                active.updated_at = Set(Utc::now().naive_utc());
                to_record(active.update(db).await?)
            }

            pub async fn soft_delete_owner(
                db: &DatabaseConnection,
                owner_id: Uuid,
            ) -> Result<u64, MediaError> {
                let now = Utc::now().naive_utc();
                let result = Entity::update_many()
                    .col_expr(Column::DeletedAt, Expr::value(now))
                    .col_expr(Column::UpdatedAt, Expr::value(now))
                    .filter(Column::$owner_column.eq(owner_id))
                    .filter(Column::DeletedAt.is_null())
                    .exec(db)
                    .await?;

                Ok(result.rows_affected)
            }

            pub async fn deleted_before(
                db: &DatabaseConnection,
                threshold: NaiveDateTime,
            ) -> Result<Vec<FileRecord>, MediaError> {
                Entity::find()
                    .filter(Column::DeletedAt.is_not_null())
                    .filter(Column::DeletedAt.lt(threshold))
                    .all(db)
                    .await?
                    .into_iter()
                    .map(to_record)
                    .collect()
            }

            pub async fn delete(db: &DatabaseConnection, id: Uuid) -> Result<(), MediaError> {
                Entity::delete_by_id(id).exec(db).await?;
                Ok(())
            }
        }
    };
}

file_table!(content_file, content_id, ContentId, EntityType::Content);
file_table!(category_file, category_id, CategoryId, EntityType::Category);

#[derive(Clone)]
pub struct FileRecordStore {
    db: DatabaseConnection,
}

impl FileRecordStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Newest non-deleted record for `(owner, kind)`, narrowed by `subtype`
    /// only when one is given.
    pub async fn find_active(
        &self,
        owner: Owner,
        kind: &str,
        subtype: Option<&str>,
    ) -> Result<Option<FileRecord>, MediaError> {
        match owner.entity {
            EntityType::Content => content_file::find_active(&self.db, owner.id, kind, subtype).await,
            EntityType::Category => category_file::find_active(&self.db, owner.id, kind, subtype).await,
        }
    }

    pub async fn list_active(&self, owner: Owner) -> Result<Vec<FileRecord>, MediaError> {
        match owner.entity {
            EntityType::Content => content_file::list_active(&self.db, owner.id).await,
            EntityType::Category => category_file::list_active(&self.db, owner.id).await,
        }
    }

    pub async fn insert(
        &self,
        owner: Owner,
        kind: &str,
        subtype: Option<&str>,
        names: &VariantNames,
    ) -> Result<FileRecord, MediaError> {
        match owner.entity {
            EntityType::Content => content_file::insert(&self.db, owner.id, kind, subtype, names).await,
            EntityType::Category => category_file::insert(&self.db, owner.id, kind, subtype, names).await,
        }
    }

    pub async fn update_names(
        &self,
        record: &FileRecord,
        names: &VariantNames,
    ) -> Result<FileRecord, MediaError> {
        match record.owner.entity {
            EntityType::Content => content_file::update_names(&self.db, record.id, names).await,
            EntityType::Category => category_file::update_names(&self.db, record.id, names).await,
        }
    }

    pub async fn soft_delete_owner(&self, owner: Owner) -> Result<u64, MediaError> {
        match owner.entity {
            EntityType::Content => content_file::soft_delete_owner(&self.db, owner.id).await,
            EntityType::Category => category_file::soft_delete_owner(&self.db, owner.id).await,
        }
    }

    /// Soft-deleted records of both tables whose `deleted_at` is older than `threshold`.
    pub async fn deleted_before(
        &self,
        threshold: NaiveDateTime,
    ) -> Result<Vec<FileRecord>, MediaError> {
        let mut records = content_file::deleted_before(&self.db, threshold).await?;
        records.extend(category_file::deleted_before(&self.db, threshold).await?);
        Ok(records)
    }

    pub async fn delete(&self, record: &FileRecord) -> Result<(), MediaError> {
        match record.owner.entity {
            EntityType::Content => content_file::delete(&self.db, record.id).await,
            EntityType::Category => category_file::delete(&self.db, record.id).await,
        }
    }
}
