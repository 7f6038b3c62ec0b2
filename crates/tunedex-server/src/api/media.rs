//! Streaming and cover art handlers.

use std::fs::File;
use std::path::Path;

use actix_files::NamedFile;
use actix_web::http::{header, StatusCode};
use actix_web::{get, web, HttpRequest, HttpResponse, Responder};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use crate::db::{SongRecord, StoreConn};
use crate::metadata::{read_tags, CoverImage};
use crate::state::AppState;

/// Path segments identifying one song exactly.
#[derive(Clone, Debug, Deserialize, IntoParams, ToSchema)]
pub struct SongPath {
    pub artist: String,
    pub album: String,
    pub title: String,
}

#[utoipa::path(
    get,
    path = "/stream/{artist}/{album}/{title}",
    params(SongPath),
    responses(
        (status = 200, description = "Audio bytes"),
        (status = 206, description = "Partial content"),
        (status = 404, description = "Unknown song or missing file"),
        (status = 500, description = "Store failure")
    )
)]
#[get("/stream/{artist}/{album}/{title}")]
/// Stream the audio bytes of an exactly identified song.
pub async fn stream(
    state: web::Data<AppState>,
    path: web::Path<SongPath>,
    req: HttpRequest,
) -> impl Responder {
    let conn = match checkout(&state) {
        Ok(conn) => conn,
        Err(resp) => return resp,
    };
    let song = match resolve_song(&conn, &path) {
        Ok(song) => song,
        Err(resp) => return resp,
    };

    // Content-type and byte-range negotiation are NamedFile's problem.
    match NamedFile::open(&song.path) {
        Ok(file) => file.into_response(&req),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!(path = %song.path, "indexed file vanished");
            HttpResponse::NotFound().finish()
        }
        Err(err) => {
            tracing::warn!(path = %song.path, error = %err, "stream open failed");
            HttpResponse::InternalServerError().finish()
        }
    }
}

#[utoipa::path(
    get,
    path = "/art/{artist}/{album}/{title}",
    params(SongPath),
    responses(
        (status = 200, description = "Cover image bytes"),
        (status = 206, description = "Partial content"),
        (status = 204, description = "No cover available"),
        (status = 404, description = "Unknown song"),
        (status = 500, description = "Store failure")
    )
)]
#[get("/art/{artist}/{album}/{title}")]
/// Serve the cover art of an exactly identified song.
pub async fn art(
    state: web::Data<AppState>,
    path: web::Path<SongPath>,
    req: HttpRequest,
) -> impl Responder {
    let conn = match checkout(&state) {
        Ok(conn) => conn,
        Err(resp) => return resp,
    };
    let song = match resolve_song(&conn, &path) {
        Ok(song) => song,
        Err(resp) => return resp,
    };

    let file = match File::open(&song.path) {
        Ok(file) => file,
        Err(err) => {
            // A vanished file degrades to "no content" rather than failing
            // the request.
            tracing::debug!(path = %song.path, error = %err, "art source file unreadable");
            return HttpResponse::NoContent().finish();
        }
    };

    let ext = Path::new(&song.path)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    let embedded = read_tags(file, ext.as_deref()).and_then(|tags| tags.cover);

    let cover = match embedded {
        Some(cover) => Some(cover),
        None => external_cover(&state, &song),
    };

    match cover {
        Some(cover) => ranged_bytes_response(&req, &cover.mime_type, cover.data),
        None => HttpResponse::NoContent().finish(),
    }
}

/// Check out the request's store connection; it stays alive until the
/// handler returns its response.
fn checkout(state: &AppState) -> Result<StoreConn, HttpResponse> {
    state.store.checkout().map_err(|err| {
        tracing::error!(error = %err, "song db connection checkout failed");
        HttpResponse::InternalServerError().finish()
    })
}

/// Exact lookup shared by the stream and art handlers, mapping miss and
/// failure to 404/500.
fn resolve_song(conn: &StoreConn, path: &SongPath) -> Result<SongRecord, HttpResponse> {
    match conn.lookup(&path.artist, &path.album, &path.title) {
        Ok(Some(song)) => Ok(song),
        Ok(None) => {
            tracing::debug!(
                artist = %path.artist,
                album = %path.album,
                title = %path.title,
                "request for unknown song"
            );
            Err(HttpResponse::NotFound().finish())
        }
        Err(err) => {
            tracing::warn!(error = %err, "song lookup failed");
            Err(HttpResponse::InternalServerError().finish())
        }
    }
}

/// Consult the external cover seam; any failure there degrades to a miss.
fn external_cover(state: &AppState, song: &SongRecord) -> Option<CoverImage> {
    let release_id = match state.covers.resolve_release(&song.artist, &song.album) {
        Ok(Some(id)) => id,
        Ok(None) => return None,
        Err(err) => {
            tracing::warn!(error = %err, album = %song.album, "release lookup failed");
            return None;
        }
    };
    match state.covers.front_cover(&release_id) {
        Ok(cover) => cover,
        Err(err) => {
            tracing::warn!(error = %err, release_id = %release_id, "external cover fetch failed");
            None
        }
    }
}

/// Serve in-memory image bytes with single-range support.
fn ranged_bytes_response(req: &HttpRequest, mime_type: &str, data: Vec<u8>) -> HttpResponse {
    let total_len = data.len() as u64;
    let range_header = req
        .headers()
        .get(header::RANGE)
        .and_then(|v| v.to_str().ok());
    let range = match range_header.and_then(|h| parse_single_range(h, total_len)) {
        Some(r) => Some(r),
        None if range_header.is_some() => {
            return HttpResponse::RangeNotSatisfiable()
                .insert_header((header::ACCEPT_RANGES, "bytes"))
                .finish();
        }
        None => None,
    };

    let content_type = if mime_type.is_empty() {
        "application/octet-stream"
    } else {
        mime_type
    };

    let mut resp;
    let body = if let Some((start, end)) = range {
        resp = HttpResponse::build(StatusCode::PARTIAL_CONTENT);
        resp.insert_header((
            header::CONTENT_RANGE,
            format!("bytes {start}-{end}/{total_len}"),
        ));
        data[start as usize..=end as usize].to_vec()
    } else {
        resp = HttpResponse::build(StatusCode::OK);
        data
    };
    resp.insert_header((header::ACCEPT_RANGES, "bytes"));
    resp.content_type(content_type);
    resp.body(body)
}

pub(crate) fn parse_single_range(header: &str, total_len: u64) -> Option<(u64, u64)> {
    let header = header.trim();
    if !header.starts_with("bytes=") {
        return None;
    }
    let range = header.trim_start_matches("bytes=");
    let first = range.split(',').next()?;
    let (start_s, end_s) = first.split_once('-')?;
    if start_s.is_empty() {
        return None;
    }
    let start = start_s.parse::<u64>().ok()?;
    let end = if end_s.is_empty() {
        total_len.saturating_sub(1)
    } else {
        end_s.parse::<u64>().ok()?
    };
    if start >= total_len || end < start {
        return None;
    }
    Some((start, end.min(total_len.saturating_sub(1))))
}
