//! Song search handler.

use actix_web::{get, web, HttpResponse, Responder};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use crate::db::SongSummary;
use crate::state::AppState;

/// Query parameters for song search; any subset may be present.
#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct SearchQuery {
    /// Artist substring.
    pub artist: Option<String>,
    /// Album substring.
    pub album: Option<String>,
    /// Title substring.
    pub title: Option<String>,
}

#[utoipa::path(
    get,
    path = "/search",
    params(SearchQuery),
    responses(
        (status = 200, description = "Matching songs", body = [SongSummary]),
        (status = 400, description = "All search terms empty"),
        (status = 500, description = "Store failure")
    )
)]
#[get("/search")]
/// Substring search over the song index.
pub async fn search(state: web::Data<AppState>, query: web::Query<SearchQuery>) -> impl Responder {
    let artist = query.artist.as_deref().unwrap_or("");
    let album = query.album.as_deref().unwrap_or("");
    let title = query.title.as_deref().unwrap_or("");

    // An unbounded dump of the whole table is a client mistake; reject it
    // before touching the store.
    if artist.is_empty() && album.is_empty() && title.is_empty() {
        return HttpResponse::BadRequest()
            .body("at least one of artist, album, title is required");
    }

    let conn = match state.store.checkout() {
        Ok(conn) => conn,
        Err(err) => {
            tracing::error!(error = %err, "song db connection checkout failed");
            return HttpResponse::InternalServerError().finish();
        }
    };

    match conn.search(artist, album, title) {
        Ok(results) => HttpResponse::Ok().json(results),
        Err(err) => {
            tracing::warn!(error = %err, "song search failed");
            HttpResponse::InternalServerError().finish()
        }
    }
}
