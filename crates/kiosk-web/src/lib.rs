//! Kiosk screens: embedded static pages served by the gateway.
//!
//! Uses `rust-embed` to bake the `pages/` directory into the binary.
//! In debug mode (`debug-embed` feature), files are read from disk
//! so you can edit the HTML and just refresh the browser.

use axum::{
    extract::Path,
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use rust_embed::Embed;
use tracing::debug;

#[derive(Embed)]
#[folder = "pages/"]
struct KioskPages;

/// Every screen the kiosk can show, served at `/<name>`.
pub const PAGE_NAMES: [&str; 12] = [
    "add", "bread", "check", "credit", "dialog", "lastpage", "mainpage", "payment", "sandwich",
    "sc", "side", "vege",
];

/// Build an axum `Router` that serves one route per kiosk screen.
///
/// Register this **after** the API routes so `/stt`, `/tts` and friends
/// take priority over the page capture.
pub fn pages_router() -> Router {
    Router::new().route("/{page}", get(page_handler))
}

pub fn is_page(name: &str) -> bool {
    PAGE_NAMES.contains(&name)
}

async fn page_handler(Path(page): Path<String>) -> Response {
    if !is_page(&page) {
        debug!(page = %page, "Unknown kiosk page");
        return not_found();
    }
    serve_file(&format!("{page}.html"))
}

fn serve_file(path: &str) -> Response {
    match KioskPages::get(path) {
        Some(asset) => {
            let mime = mime_guess::from_path(path).first_or_octet_stream();
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, format!("{}; charset=utf-8", mime.as_ref()))],
                asset.data.into_owned(),
            )
                .into_response()
        }
        None => not_found(),
    }
}

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, Html("<h1>404</h1>")).into_response()
}
