use crate::models::auth::{Claims, ErrorResponse};
use crate::AppState;
use axum::{
    extract::{Extension, Request},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use std::sync::Arc;

pub const ADMIN_TOKEN_HOURS: i64 = 24;

/// Issues a dashboard token. Returns the token and its expiry (unix seconds).
pub fn issue_admin_token(secret: &str) -> Result<(String, i64), jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let expiration = (now + Duration::hours(ADMIN_TOKEN_HOURS)).timestamp();

    let claims = Claims {
        sub: "admin".to_string(),
        is_admin: true,
        exp: expiration as usize,
        iat: now.timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_ref()),
    )?;

    Ok((token, expiration))
}

pub fn verify_admin_token(secret: &str, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &Validation::default(),
    )?;

    Ok(token_data.claims)
}

fn unauthorized(message: &str) -> (StatusCode, Json<ErrorResponse>) {
    (StatusCode::UNAUTHORIZED, Json(ErrorResponse::new(message)))
}

pub async fn admin_auth_middleware(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, impl IntoResponse> {
    let auth_str = match headers.get("Authorization").map(|h| h.to_str()) {
        Some(Ok(value)) => value,
        Some(Err(_)) => return Err(unauthorized("Invalid Authorization header format")),
        None => return Err(unauthorized("Missing Authorization header")),
    };

    // Extract token from "Bearer <token>" format
    let Some(token) = auth_str.strip_prefix("Bearer ") else {
        return Err(unauthorized(
            "Invalid Authorization header format. Expected 'Bearer <token>'",
        ));
    };

    let claims = match verify_admin_token(&state.config.jwt_secret, token) {
        Ok(claims) => claims,
        Err(e) => {
            tracing::warn!("JWT verification failed: {}", e);
            return Err(unauthorized("Invalid or expired token"));
        }
    };

    if !claims.is_admin {
        return Err((
            StatusCode::FORBIDDEN,
            Json(ErrorResponse::new("Admin access required.")),
        ));
    }

    request.extensions_mut().insert(claims);

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    #[test]
    fn test_issued_token_verifies() {
        let (token, expires_at) = issue_admin_token(SECRET).unwrap();
        let claims = verify_admin_token(SECRET, &token).unwrap();
        assert_eq!(claims.sub, "admin");
        assert!(claims.is_admin);
        assert_eq!(claims.exp as i64, expires_at);
    }

    #[test]
    fn test_token_signed_with_other_secret_rejected() {
        let (token, _) = issue_admin_token(SECRET).unwrap();
        assert!(verify_admin_token("another-secret-another-secret-xx", &token).is_err());
        assert!(verify_admin_token(SECRET, "not.a.token").is_err());
    }
}
