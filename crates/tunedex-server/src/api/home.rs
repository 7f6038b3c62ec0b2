//! Static landing page.

use actix_files::NamedFile;
use actix_web::{get, web, HttpRequest, HttpResponse, Responder};

use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Landing page"),
        (status = 500, description = "Page unreadable")
    )
)]
#[get("/")]
/// Serve the static landing page.
pub async fn home(state: web::Data<AppState>, req: HttpRequest) -> impl Responder {
    let index = state.webapp_dir.join("index.html");
    match NamedFile::open(&index) {
        Ok(file) => file.into_response(&req),
        Err(err) => {
            tracing::error!(path = %index.display(), error = %err, "landing page open failed");
            HttpResponse::InternalServerError().finish()
        }
    }
}
