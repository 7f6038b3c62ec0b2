//! HTTP API handlers.
//!
//! Defines the Actix routes for search, audio streaming, cover art, and the
//! landing page.

#[path = "home.rs"]
mod home_route;
pub mod media;
#[path = "search.rs"]
mod search_route;

pub use home_route::{__path_home, home};
pub use media::{__path_art, __path_stream, art, stream};
pub use search_route::{__path_search, search};
