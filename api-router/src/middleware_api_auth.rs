use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::{api_state::ApiState, error::ApiError};

/// Checks the shared API key from `X-API-Key` or a bearer token. With no
/// key configured the endpoint is open (local development).
pub async fn api_auth(
    State(state): State<ApiState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(expected) = state.config.api_key.as_deref() else {
        return Ok(next.run(request).await);
    };

    let presented = extract_api_key(&request)
        .ok_or_else(|| ApiError::Unauthorized("You have to be authenticated".to_string()))?;

    if presented != expected {
        return Err(ApiError::Unauthorized(
            "You have to be authenticated".to_string(),
        ));
    }

    Ok(next.run(request).await)
}

fn extract_api_key(request: &Request) -> Option<String> {
    request
        .headers()
        .get("X-API-Key")
        .and_then(|v| v.to_str().ok())
        .or_else(|| {
            request
                .headers()
                .get("Authorization")
                .and_then(|v| v.to_str().ok())
                .and_then(|auth| auth.strip_prefix("Bearer ").map(str::trim))
        })
        .map(String::from)
}
