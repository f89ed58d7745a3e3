use mime_guess::from_path;
use rust_embed::RustEmbed;
use spin_sdk::http::Response;

use crate::core::db::Db;
use crate::core::errors::ApiError;

#[derive(RustEmbed)]
#[folder = "static"]
struct Assets;

pub fn serve_static(path: &str) -> anyhow::Result<Response> {
    let file_path = path.trim_start_matches("/static/");

    let Some(file) = Assets::get(file_path) else {
        return Ok(ApiError::NotFound("File not found".to_string()).into());
    };

    let mime = from_path(file_path).first_or_octet_stream();

    Ok(Response::builder()
        .status(200)
        .header("Content-Type", mime.as_ref())
        .body(file.data.to_vec())
        .build())
}

/// Uploaded images live in the store, not the embedded assets.
pub fn serve_upload(path: &str) -> anyhow::Result<Response> {
    let name = path.trim_start_matches("/uploads/");
    if name.is_empty() || name.contains('/') {
        return Ok(ApiError::BadRequest("Invalid upload path".to_string()).into());
    }

    let db = Db::open();
    let Some(data) = db.uploads().get(name)? else {
        return Ok(ApiError::NotFound("Upload not found".to_string()).into());
    };

    let mime = from_path(name).first_or_octet_stream();

    Ok(Response::builder()
        .status(200)
        .header("Content-Type", mime.as_ref())
        .body(data)
        .build())
}
