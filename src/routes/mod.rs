mod media;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, patch, post},
    Router,
};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::services::cleanup::CleanupService;
use crate::services::media::MediaService;

/// Uploads carry full-size originals.
const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub media: MediaService,
    pub cleanup: CleanupService,
}

#[derive(OpenApi)]
#[openapi(
    paths(
        media::upload_image,
        media::upload_responsive,
        media::upload_with_defaults,
        media::patch_names,
        media::list_records,
        media::soft_delete,
    ),
    components(
        schemas(
            media::FileRecordResponse,
            media::SoftDeleteResponse,
            media::PatchNamesRequest,
        )
    ),
    tags(
        (name = "Media", description = "Image variant uploads and file records for content and categories")
    ),
    info(
        title = "CMS Media API",
        version = "0.1.0",
        description = "Generates resized image variants and keeps file records in sync with storage",
    )
)]
struct ApiDoc;

pub fn create_routes(state: AppState) -> Router {
    let swagger_router: Router = SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDoc::openapi())
        .into();

    let media_routes = Router::new()
        .route("/media/{entity}/{owner_id}/{kind}", post(media::upload_image))
        .route(
            "/media/{entity}/{owner_id}/{kind}/responsive",
            post(media::upload_responsive),
        )
        .route(
            "/media/{entity}/{owner_id}/{kind}/defaults",
            post(media::upload_with_defaults),
        )
        .route("/media/{entity}/{owner_id}/{kind}/names", patch(media::patch_names))
        .route(
            "/media/{entity}/{owner_id}",
            get(media::list_records).delete(media::soft_delete),
        )
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state);

    Router::new()
        .merge(swagger_router)
        .merge(media_routes)
        .layer(TraceLayer::new_for_http())
}
