use std::collections::{BTreeMap, BTreeSet};

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::MediaError;
use crate::models::names::Profile;
use crate::models::record::{EntityType, FileRecord, Owner};
use crate::routes::AppState;
use crate::services::media::{DefaultSources, MediaSource, ResponsiveSources, UploadOptions};

/// Multipart parts that carry upload options rather than files.
const SUBTYPE_FIELD: &str = "subtype";
const ONLY_FIELD: &str = "only_sizes";
const REPLACE_FIELD: &str = "replace_existing";
const SIZE_FIELD_PREFIX: &str = "size.";

#[derive(Serialize, utoipa::ToSchema)]
pub struct FileRecordResponse {
    #[schema(value_type = String)]
    id: Uuid,
    entity: String,
    #[schema(value_type = String)]
    owner_id: Uuid,
    kind: String,
    subtype: Option<String>,
    #[schema(value_type = Object)]
    names: Value,
    #[schema(value_type = Object)]
    urls: Value,
    display_url: Option<String>,
    created_at: chrono::NaiveDateTime,
    updated_at: chrono::NaiveDateTime,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct SoftDeleteResponse {
    affected: u64,
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct PatchNamesRequest {
    subtype: Option<String>,
    /// `mobile` or `desktop`; only for responsive records.
    profile: Option<String>,
    /// Size key to file name. `null` drops the size.
    #[schema(value_type = Object)]
    names: BTreeMap<String, Option<String>>,
}

fn record_response(state: &AppState, record: FileRecord) -> Result<FileRecordResponse, MediaError> {
    let urls = serde_json::to_value(state.media.variant_urls(&record)?)?;
    let display_url = state.media.display_url(&record, None)?;

    Ok(FileRecordResponse {
        id: record.id,
        entity: record.owner.entity.to_string(),
        owner_id: record.owner.id,
        kind: record.kind,
        subtype: record.subtype,
        names: serde_json::to_value(&record.names)?,
        urls,
        display_url,
        created_at: record.created_at,
        updated_at: record.updated_at,
    })
}

#[derive(Default)]
struct UploadForm {
    files: BTreeMap<String, Vec<u8>>,
    options: UploadOptions,
}

impl UploadForm {
    fn take(&mut self, field: &str) -> Option<MediaSource> {
        self.files.remove(field).map(MediaSource::from)
    }
}

async fn read_form(mut multipart: Multipart) -> Result<UploadForm, MediaError> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| MediaError::UnreadableSource(e.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();

        match name.as_str() {
            SUBTYPE_FIELD | ONLY_FIELD | REPLACE_FIELD => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| MediaError::UnreadableSource(e.to_string()))?;
                let value = value.trim();

                match name.as_str() {
                    SUBTYPE_FIELD if !value.is_empty() => {
                        form.options.subtype = Some(value.to_string());
                    }
                    ONLY_FIELD => {
                        let only: BTreeSet<String> = value
                            .split(',')
                            .map(str::trim)
                            .filter(|s| !s.is_empty())
                            .map(str::to_string)
                            .collect();
                        if !only.is_empty() {
                            form.options.only_sizes = Some(only);
                        }
                    }
                    REPLACE_FIELD => {
                        form.options.replace_existing = parse_flag(value);
                    }
                    _ => {}
                }
            }
            _ => {
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| MediaError::UnreadableSource(e.to_string()))?;
                form.files.insert(name, data.to_vec());
            }
        }
    }

    Ok(form)
}

/// Anything but an explicit false/0/no/off (any case) means true.
fn parse_flag(value: &str) -> bool {
    !["false", "0", "no", "off"]
        .iter()
        .any(|no| value.eq_ignore_ascii_case(no))
}

fn owner_from_path(entity: &str, owner_id: Uuid) -> Result<Owner, MediaError> {
    let entity: EntityType = entity.parse()?;
    Ok(Owner { entity, id: owner_id })
}

#[utoipa::path(
    post,
    path = "/media/{entity}/{owner_id}/{kind}",
    params(
        ("entity" = String, Path, description = "content or category"),
        ("owner_id" = String, Path, description = "Owning entity id"),
        ("kind" = String, Path, description = "File kind from the media config"),
    ),
    request_body(content = Vec<u8>, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Variants generated and record saved", body = FileRecordResponse),
        (status = 400, description = "Unsupported entity type"),
        (status = 422, description = "Upload unreadable or no variant produced"),
        (status = 500, description = "Internal Server Error")
    ),
    tag = "Media"
)]
pub async fn upload_image(
    State(state): State<AppState>,
    Path((entity, owner_id, kind)): Path<(String, Uuid, String)>,
    multipart: Multipart,
) -> Result<Json<FileRecordResponse>, MediaError> {
    let owner = owner_from_path(&entity, owner_id)?;
    let mut form = read_form(multipart).await?;
    let source = form
        .take("file")
        .ok_or_else(|| MediaError::UnreadableSource("missing 'file' part".to_string()))?;

    let record = state
        .media
        .upload_model_image(owner, source, &kind, form.options)
        .await?;
    Ok(Json(record_response(&state, record)?))
}

#[utoipa::path(
    post,
    path = "/media/{entity}/{owner_id}/{kind}/responsive",
    params(
        ("entity" = String, Path, description = "content or category"),
        ("owner_id" = String, Path, description = "Owning entity id"),
        ("kind" = String, Path, description = "File kind from the media config"),
    ),
    request_body(content = Vec<u8>, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Mobile and desktop variants saved", body = FileRecordResponse),
        (status = 400, description = "Unsupported entity type"),
        (status = 422, description = "Upload unreadable or no variant produced"),
        (status = 500, description = "Internal Server Error")
    ),
    tag = "Media"
)]
pub async fn upload_responsive(
    State(state): State<AppState>,
    Path((entity, owner_id, kind)): Path<(String, Uuid, String)>,
    multipart: Multipart,
) -> Result<Json<FileRecordResponse>, MediaError> {
    let owner = owner_from_path(&entity, owner_id)?;
    let mut form = read_form(multipart).await?;
    let sources = ResponsiveSources {
        mobile: form.take(Profile::Mobile.as_str()),
        desktop: form.take(Profile::Desktop.as_str()),
    };

    let record = state
        .media
        .upload_model_responsive_images(owner, sources, &kind, form.options)
        .await?;
    Ok(Json(record_response(&state, record)?))
}

#[utoipa::path(
    post,
    path = "/media/{entity}/{owner_id}/{kind}/defaults",
    params(
        ("entity" = String, Path, description = "content or category"),
        ("owner_id" = String, Path, description = "Owning entity id"),
        ("kind" = String, Path, description = "File kind from the media config"),
    ),
    request_body(content = Vec<u8>, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Uploaded sizes merged into the record", body = FileRecordResponse),
        (status = 400, description = "Unsupported entity type"),
        (status = 422, description = "Upload unreadable or no variant produced"),
        (status = 500, description = "Internal Server Error")
    ),
    tag = "Media"
)]
pub async fn upload_with_defaults(
    State(state): State<AppState>,
    Path((entity, owner_id, kind)): Path<(String, Uuid, String)>,
    multipart: Multipart,
) -> Result<Json<FileRecordResponse>, MediaError> {
    let owner = owner_from_path(&entity, owner_id)?;
    let mut form = read_form(multipart).await?;

    let default = form.take("default");
    let sizes = std::mem::take(&mut form.files)
        .into_iter()
        .filter_map(|(field, data)| {
            field
                .strip_prefix(SIZE_FIELD_PREFIX)
                .map(|size| (size.to_string(), MediaSource::from(data)))
        })
        .collect();

    let record = state
        .media
        .upload_model_image_with_defaults(owner, DefaultSources { default, sizes }, &kind, form.options)
        .await?;
    Ok(Json(record_response(&state, record)?))
}

#[utoipa::path(
    patch,
    path = "/media/{entity}/{owner_id}/{kind}/names",
    params(
        ("entity" = String, Path, description = "content or category"),
        ("owner_id" = String, Path, description = "Owning entity id"),
        ("kind" = String, Path, description = "File kind from the media config"),
    ),
    request_body = PatchNamesRequest,
    responses(
        (status = 200, description = "Names patched", body = FileRecordResponse),
        (status = 404, description = "No active record"),
        (status = 409, description = "Profile does not match the stored names"),
        (status = 500, description = "Internal Server Error")
    ),
    tag = "Media"
)]
pub async fn patch_names(
    State(state): State<AppState>,
    Path((entity, owner_id, kind)): Path<(String, Uuid, String)>,
    Json(payload): Json<PatchNamesRequest>,
) -> Result<Json<FileRecordResponse>, MediaError> {
    let owner = owner_from_path(&entity, owner_id)?;
    let profile = match payload.profile.as_deref() {
        None => None,
        Some(raw) => Some(
            serde_json::from_value::<Profile>(Value::String(raw.to_string()))
                .map_err(|_| MediaError::InvalidRequest(format!("unknown profile '{}'", raw)))?,
        ),
    };

    let record = state
        .media
        .patch_names(owner, &kind, payload.subtype.as_deref(), profile, payload.names)
        .await?;
    Ok(Json(record_response(&state, record)?))
}

#[utoipa::path(
    get,
    path = "/media/{entity}/{owner_id}",
    params(
        ("entity" = String, Path, description = "content or category"),
        ("owner_id" = String, Path, description = "Owning entity id"),
    ),
    responses(
        (status = 200, description = "Active file records", body = Vec<FileRecordResponse>),
        (status = 400, description = "Unsupported entity type"),
        (status = 500, description = "Internal Server Error")
    ),
    tag = "Media"
)]
pub async fn list_records(
    State(state): State<AppState>,
    Path((entity, owner_id)): Path<(String, Uuid)>,
) -> Result<Json<Vec<FileRecordResponse>>, MediaError> {
    let owner = owner_from_path(&entity, owner_id)?;
    let records = state.media.records_for(owner).await?;

    let response = records
        .into_iter()
        .map(|record| record_response(&state, record))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Json(response))
}

#[utoipa::path(
    delete,
    path = "/media/{entity}/{owner_id}",
    params(
        ("entity" = String, Path, description = "content or category"),
        ("owner_id" = String, Path, description = "Owning entity id"),
    ),
    responses(
        (status = 200, description = "Records soft deleted", body = SoftDeleteResponse),
        (status = 400, description = "Unsupported entity type"),
        (status = 500, description = "Internal Server Error")
    ),
    tag = "Media"
)]
pub async fn soft_delete(
    State(state): State<AppState>,
    Path((entity, owner_id)): Path<(String, Uuid)>,
) -> Result<(StatusCode, Json<SoftDeleteResponse>), MediaError> {
    let owner = owner_from_path(&entity, owner_id)?;
    let affected = state.cleanup.soft_delete_owner_files(owner).await?;
    Ok((StatusCode::OK, Json(SoftDeleteResponse { affected })))
}
