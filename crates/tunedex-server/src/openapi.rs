use utoipa::OpenApi;

use crate::api;
use crate::db;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::search,
        api::stream,
        api::art,
        api::home,
    ),
    components(
        schemas(
            db::SongSummary,
        )
    ),
    tags(
        (name = "tunedex-server", description = "Song index and retrieval API")
    )
)]
pub struct ApiDoc;
