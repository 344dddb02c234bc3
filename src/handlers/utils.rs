use axum::http::{header, HeaderMap};
use uuid::Uuid;

use crate::error::ApiError;

/// Raw query string as ordered `(key, value)` pairs, repeated keys kept
pub fn query_pairs(raw: Option<&str>) -> Vec<(String, String)> {
    raw.map(|q| {
        url::form_urlencoded::parse(q.as_bytes())
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    })
    .unwrap_or_default()
}

/// Replace (or add) query keys, keeping every other pair in order
pub fn preset_query(mut pairs: Vec<(String, String)>, presets: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs.retain(|(k, _)| !presets.iter().any(|(p, _)| p == k));
    pairs.extend(presets.iter().map(|(k, v)| (k.to_string(), v.to_string())));
    pairs
}

/// Path ids are UUIDs; anything else is a 400 cast error
pub fn parse_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::invalid_id(raw))
}

/// `<proto>://<host>` of the incoming request, honouring proxy headers.
/// `force_https` pins the scheme regardless of what the proxy reports.
pub fn request_origin(headers: &HeaderMap, force_https: bool) -> String {
    let proto = match force_https {
        true => "https",
        false => headers
            .get("x-forwarded-proto")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("http"),
    };
    let host = headers
        .get("x-forwarded-host")
        .or_else(|| headers.get(header::HOST))
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");
    format!("{}://{}", proto, host)
}
