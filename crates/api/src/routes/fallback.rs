//! Handler for requests no route accepts.

use axum::extract::Request;

use crate::error::ApiError;
use crate::middleware::RequestedPath;

/// Any unmatched path, or an unsupported method on a known path, is a 404.
///
/// The message names the path as the client sent it, not the normalized one.
pub async fn not_found(request: Request) -> ApiError {
    let path = request
        .extensions()
        .get::<RequestedPath>()
        .map_or_else(|| request.uri().path(), |requested| requested.0.as_str());

    ApiError::NotFound(format!("Cannot {} {path}", request.method()))
}
