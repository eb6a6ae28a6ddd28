use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::AppState;

/// Container for the authenticated operator's id stored in request
/// extensions.
#[derive(Clone, Debug)]
pub struct CurrentUser(pub Uuid);

/// Claims expected inside the JWT for authenticated operators.
#[derive(Debug, Deserialize)]
pub struct Claims {
    /// Subject - should be the operator's UUID as a string.
    pub sub: String,
    pub exp: usize,
}

/// Middleware to validate a Bearer JWT in the `Authorization` header.
///
/// On success the operator id is attached to request extensions and the
/// request is forwarded; on failure a `401` is returned before anything in
/// the pipeline runs.
pub async fn jwt_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth_header = req.headers().get("authorization");
    let token = match auth_header.and_then(|v| v.to_str().ok()) {
        Some(s) if s.starts_with("Bearer ") => &s[7..],
        _ => return Err(AppError::Auth),
    };

    let decoding_key = DecodingKey::from_secret(state.config.jwt_secret.as_bytes());

    let decoded = match decode::<Claims>(token, &decoding_key, &Validation::new(Algorithm::HS256)) {
        Ok(c) => c.claims,
        Err(_) => return Err(AppError::Auth),
    };

    // Parse subject as UUID and attach to request extensions for downstream handlers.
    let user_id = match Uuid::parse_str(&decoded.sub) {
        Ok(id) => id,
        Err(_) => return Err(AppError::Auth),
    };

    req.extensions_mut().insert(CurrentUser(user_id));

    Ok(next.run(req).await)
}
