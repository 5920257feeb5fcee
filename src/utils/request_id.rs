use axum::http::HeaderMap;
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Uses the caller-supplied `x-request-id` when present, otherwise a fresh one
pub fn extract_request_id(headers: &HeaderMap) -> String {
    if let Some(value) = headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
    {
        let value = value.trim();
        if !value.is_empty() {
            return value.to_string();
        }
    }

    generate_request_id()
}

pub fn generate_request_id() -> String {
    format!("req-{}", Uuid::new_v4())
}
