use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};

/// Header the chat platform echoes the configured secret in.
pub const SECRET_HEADER: &str = "x-bot-api-secret-token";

#[derive(Clone)]
pub struct SecretState {
    pub token: Arc<str>,
}

impl SecretState {
    pub fn new(token: impl Into<Arc<str>>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

/// Rejects webhook calls that do not carry the bot secret.
pub async fn secret_middleware(
    State(state): State<SecretState>,
    req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let presented = extract_secret(req.headers())?;
    if !constant_time_eq(presented.as_bytes(), state.token.as_bytes()) {
        return Err(StatusCode::UNAUTHORIZED);
    }
    Ok(next.run(req).await)
}

fn extract_secret(headers: &HeaderMap) -> Result<&str, StatusCode> {
    let header = headers
        .get(SECRET_HEADER)
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let token = header
        .to_str()
        .map_err(|_| StatusCode::UNAUTHORIZED)?
        .trim();
    if token.is_empty() {
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(token)
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn missing_or_blank_secret_is_unauthorized() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_secret(&headers), Err(StatusCode::UNAUTHORIZED));

        headers.insert(SECRET_HEADER, HeaderValue::from_static("  "));
        assert_eq!(extract_secret(&headers), Err(StatusCode::UNAUTHORIZED));
    }

    #[test]
    fn secret_is_trimmed() {
        let mut headers = HeaderMap::new();
        headers.insert(SECRET_HEADER, HeaderValue::from_static(" s3cret "));
        assert_eq!(extract_secret(&headers), Ok("s3cret"));
    }

    #[test]
    fn comparison_needs_equal_length_and_bytes() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"abcd"));
    }
}
