//! Shared application state.

use std::path::PathBuf;
use std::sync::Arc;

use crate::cover_art::CoverSource;
use crate::db::SongStore;

/// State shared by every request handler.
pub struct AppState {
    /// The song store; handlers check out one connection per request.
    pub store: SongStore,
    /// External cover art seam consulted when embedded art is absent.
    pub covers: Arc<dyn CoverSource>,
    /// Directory holding the static landing page.
    pub webapp_dir: PathBuf,
}

impl AppState {
    pub fn new(store: SongStore, covers: Arc<dyn CoverSource>, webapp_dir: PathBuf) -> Self {
        Self {
            store,
            covers,
            webapp_dir,
        }
    }
}
