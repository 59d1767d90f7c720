//! Middleware for bearer token validation

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};
use tracing::warn;

use crate::{error::ServiceError, jwt::Principal, repositories::Database, state::AppState};

/// Validate the bearer token and expose the caller as a [`Principal`]
pub async fn auth_middleware<D: Database>(
    State(state): State<AppState<D>>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, ServiceError> {
    let TypedHeader(Authorization(bearer)) = bearer.ok_or(ServiceError::Unauthorized)?;

    let claims = state
        .jwt_service
        .validate_token(bearer.token())
        .map_err(|e| {
            warn!("Failed to validate token: {}", e);
            ServiceError::Unauthorized
        })?;

    req.extensions_mut().insert(Principal::from(claims));

    Ok(next.run(req).await)
}
