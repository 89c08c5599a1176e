//! Request middleware: path case folding and JSON body parsing.
//!
//! Both run for every request. Paths are matched case-insensitively, so
//! they are lowercased before routing. Bodies declared as
//! `application/json` are buffered, parsed and attached to the request as
//! [`JsonBody`]; anything else passes through untouched.

use axum::body::{Body, Bytes};
use axum::extract::Request;
use axum::http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::uri::PathAndQuery;
use axum::http::{HeaderMap, Uri};
use axum::middleware::Next;
use axum::response::Response;
use futures_util::StreamExt;
use serde_json::Value;

use crate::error::ApiError;

/// Largest JSON body accepted, in bytes.
pub const JSON_BODY_LIMIT: usize = 100 * 1024;

/// Parsed JSON request body, available to handlers as an `Extension`.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonBody(pub Value);

/// Path as the client sent it, before any normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestedPath(pub String);

/// Records the requested path and lowercases the URI path for routing.
pub async fn lowercase_path(mut request: Request) -> Request {
    let path = request.uri().path().to_string();
    request
        .extensions_mut()
        .insert(RequestedPath(path.clone()));

    let lowered = path.to_ascii_lowercase();
    if lowered != path {
        if let Some(uri) = with_path(request.uri(), &lowered) {
            *request.uri_mut() = uri;
        }
    }
    request
}

fn with_path(uri: &Uri, path: &str) -> Option<Uri> {
    let path_and_query = match uri.query() {
        Some(query) => format!("{path}?{query}"),
        None => path.to_string(),
    };

    let mut parts = uri.clone().into_parts();
    parts.path_and_query = Some(PathAndQuery::try_from(path_and_query).ok()?);
    Uri::from_parts(parts).ok()
}

/// Parses `application/json` request bodies before the handler runs.
pub async fn parse_json_body(request: Request, next: Next) -> Result<Response, ApiError> {
    if !is_json(request.headers()) {
        return Ok(next.run(request).await);
    }

    if let Some(charset) = charset(request.headers()) {
        if !charset.eq_ignore_ascii_case("utf-8") {
            return Err(ApiError::UnsupportedCharset(charset));
        }
    }

    if declared_length(request.headers()).is_some_and(|len| len > JSON_BODY_LIMIT) {
        return Err(ApiError::PayloadTooLarge {
            limit: JSON_BODY_LIMIT,
        });
    }

    let (mut parts, body) = request.into_parts();
    let bytes = read_limited(body, JSON_BODY_LIMIT).await?;

    let value = parse_strict(&bytes)?;
    parts.extensions.insert(JsonBody(value));

    Ok(next.run(Request::from_parts(parts, Body::from(bytes))).await)
}

/// Buffers `body`, failing with 413 past `limit` and 400 on a broken stream.
async fn read_limited(body: Body, limit: usize) -> Result<Bytes, ApiError> {
    let mut stream = body.into_data_stream();
    let mut buffer = Vec::new();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk
            .map_err(|e| ApiError::BadRequest(format!("failed to read request body: {e}")))?;
        if buffer.len() + chunk.len() > limit {
            return Err(ApiError::PayloadTooLarge { limit });
        }
        buffer.extend_from_slice(&chunk);
    }

    Ok(Bytes::from(buffer))
}

fn media_type(headers: &HeaderMap) -> Option<&str> {
    headers.get(CONTENT_TYPE).and_then(|value| value.to_str().ok())
}

fn is_json(headers: &HeaderMap) -> bool {
    media_type(headers)
        .and_then(|value| value.split(';').next())
        .is_some_and(|essence| essence.trim().eq_ignore_ascii_case("application/json"))
}

fn charset(headers: &HeaderMap) -> Option<String> {
    media_type(headers)?
        .split(';')
        .skip(1)
        .filter_map(|param| param.split_once('='))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("charset"))
        .map(|(_, value)| value.trim().trim_matches('"').to_ascii_lowercase())
}

fn declared_length(headers: &HeaderMap) -> Option<usize> {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse().ok())
}

/// Empty bodies become `{}`; top-level values must be objects or arrays.
fn parse_strict(bytes: &Bytes) -> Result<Value, ApiError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Object(Default::default()));
    }

    let value: Value = serde_json::from_slice(bytes)
        .map_err(|e| ApiError::BadRequest(format!("malformed JSON body: {e}")))?;

    match value {
        Value::Object(_) | Value::Array(_) => Ok(value),
        _ => Err(ApiError::BadRequest(
            "JSON body must be an object or an array".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;
    use axum::http::Request;
    use serde_json::json;

    use super::*;

    fn headers_with_type(content_type: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_str(content_type).unwrap());
        headers
    }

    #[test]
    fn test_is_json_matches_essence() {
        assert!(is_json(&headers_with_type("application/json")));
        assert!(is_json(&headers_with_type("application/json; charset=utf-8")));
        assert!(is_json(&headers_with_type("Application/JSON")));
        assert!(!is_json(&headers_with_type("text/plain")));
        assert!(!is_json(&headers_with_type("application/jsonp")));
        assert!(!is_json(&HeaderMap::new()));
    }

    #[test]
    fn test_charset_parameter() {
        assert_eq!(charset(&headers_with_type("application/json")), None);
        assert_eq!(
            charset(&headers_with_type("application/json; charset=UTF-8")).as_deref(),
            Some("utf-8")
        );
        assert_eq!(
            charset(&headers_with_type("application/json; foo=bar; charset=\"latin1\"")).as_deref(),
            Some("latin1")
        );
    }

    #[test]
    fn test_with_path_keeps_query() {
        let uri: Uri = "/HEALTH?Verbose=1".parse().unwrap();
        let rewritten = with_path(&uri, "/health").unwrap();
        assert_eq!(rewritten, "/health?Verbose=1");
    }

    #[tokio::test]
    async fn test_lowercase_path_records_original() {
        let request = Request::builder()
            .uri("/Health")
            .body(Body::empty())
            .unwrap();

        let request = lowercase_path(request).await;

        assert_eq!(request.uri().path(), "/health");
        assert_eq!(
            request.extensions().get::<RequestedPath>(),
            Some(&RequestedPath("/Health".to_string()))
        );
    }

    #[tokio::test]
    async fn test_read_limited_stops_past_limit() {
        let err = read_limited(Body::from(vec![b'x'; 11]), 10).await.unwrap_err();
        assert!(matches!(err, ApiError::PayloadTooLarge { limit: 10 }));

        let bytes = read_limited(Body::from("0123456789"), 10).await.unwrap();
        assert_eq!(bytes.len(), 10);
    }

    #[tokio::test]
    async fn test_read_limited_maps_stream_errors_to_bad_request() {
        let chunks: Vec<Result<Bytes, std::io::Error>> = vec![
            Ok(Bytes::from_static(b"{\"a\":")),
            Err(std::io::Error::from(std::io::ErrorKind::ConnectionReset)),
        ];
        let body = Body::from_stream(futures_util::stream::iter(chunks));

        let err = read_limited(body, JSON_BODY_LIMIT).await.unwrap_err();

        assert!(matches!(err, ApiError::BadRequest(_)));
    }

    #[test]
    fn test_declared_length() {
        let mut headers = HeaderMap::new();
        assert_eq!(declared_length(&headers), None);
        headers.insert(CONTENT_LENGTH, HeaderValue::from_static("42"));
        assert_eq!(declared_length(&headers), Some(42));
    }

    #[test]
    fn test_parse_strict_accepts_objects_and_arrays() {
        let value = parse_strict(&Bytes::from_static(br#"{"a":1}"#)).unwrap();
        assert_eq!(value, json!({"a": 1}));

        let value = parse_strict(&Bytes::from_static(b"[1, 2]")).unwrap();
        assert_eq!(value, json!([1, 2]));
    }

    #[test]
    fn test_parse_strict_empty_body_is_empty_object() {
        assert_eq!(parse_strict(&Bytes::new()).unwrap(), json!({}));
        assert_eq!(parse_strict(&Bytes::from_static(b" \n")).unwrap(), json!({}));
    }

    #[test]
    fn test_parse_strict_rejects_scalars_and_garbage() {
        let cases: [&[u8]; 5] = [b"42", b"\"text\"", b"null", b"{not json", b"{\"a\":}"];
        for raw in cases {
            let err = parse_strict(&Bytes::copy_from_slice(raw)).unwrap_err();
            assert!(matches!(err, ApiError::BadRequest(_)), "{raw:?}");
        }
    }
}
