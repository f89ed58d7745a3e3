use spin_sdk::http::Response;
use std::fmt;

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unauthorized,
    Forbidden,
    NotFound(String),
    Conflict(String),
    InternalError(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "Bad Request: {}", msg),
            ApiError::Unauthorized => write!(f, "Unauthorized"),
            ApiError::Forbidden => write!(f, "Forbidden"),
            ApiError::NotFound(msg) => write!(f, "Not Found: {}", msg),
            ApiError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            ApiError::InternalError(msg) => write!(f, "Internal Error: {}", msg),
        }
    }
}

fn error_page(status: u16, message: &str) -> Response {
    let body = format!(
        "<!DOCTYPE html><html><head><title>{status}</title>\
         <link rel=\"stylesheet\" href=\"/static/style.css\"></head>\
         <body><main class=\"error-page\"><h1>{status}</h1><p>{}</p>\
         <a href=\"/\">Back to PeopleConnect</a></main></body></html>",
        html_escape::encode_text(message)
    );
    Response::builder()
        .status(status)
        .header("Content-Type", "text/html; charset=utf-8")
        .body(body.into_bytes())
        .build()
}

impl From<ApiError> for Response {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::BadRequest(msg) => error_page(400, &msg),
            ApiError::Unauthorized => error_page(401, "You need to be logged in to do that"),
            ApiError::Forbidden => error_page(403, "You are not allowed to do that"),
            ApiError::NotFound(msg) => error_page(404, &msg),
            ApiError::Conflict(msg) => error_page(409, &msg),
            ApiError::InternalError(msg) => error_page(500, &msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::InternalError(err.to_string())
    }
}
