//! Social service routes

use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use axum_extra::extract::WithRejection;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::{
    error::{ServiceError, ServiceResult},
    jwt::Principal,
    middleware::auth_middleware,
    models::{LoginCredentials, NewPost, SignupRequest, UpdateProfile},
    repositories::Database,
    state::AppState,
};

/// JSON body whose rejection renders as a [`ServiceError`]
type ApiJson<T> = WithRejection<Json<T>, ServiceError>;

/// Path parameters whose rejection renders as a [`ServiceError`]
type ApiPath<T> = WithRejection<Path<T>, ServiceError>;

/// Request for a new activation email
#[derive(Deserialize)]
pub struct ResendActivationRequest {
    pub email: String,
}

/// Create the router for the social service
pub fn create_router<D: Database>(state: AppState<D>) -> Router {
    let protected_routes = Router::new()
        .route(
            "/users/me",
            get(current_user::<D>).patch(update_profile::<D>),
        )
        .route("/users/:id", get(get_user::<D>))
        .route("/users/:id/posts", get(user_posts::<D>))
        .route("/users/:id/followers", get(followers::<D>))
        .route("/users/:id/following", get(following::<D>))
        .route(
            "/users/:id/follow",
            post(follow::<D>).delete(unfollow::<D>),
        )
        .route("/posts", post(create_post::<D>))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware::<D>,
        ));

    Router::new()
        .route("/health", get(health_check::<D>))
        .route("/auth/signup", post(signup::<D>))
        .route(
            "/auth/accountVerification/:token",
            get(verify_account::<D>),
        )
        .route("/auth/resend-activation", post(resend_activation::<D>))
        .route("/auth/login", post(login::<D>))
        .merge(protected_routes)
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check<D: Database>(State(state): State<AppState<D>>) -> impl IntoResponse {
    let (status, label) = match state.db.health_check().await {
        Ok(true) => (StatusCode::OK, "ok"),
        _ => (StatusCode::SERVICE_UNAVAILABLE, "degraded"),
    };

    (
        status,
        Json(json!({
            "status": label,
            "service": "social-service",
        })),
    )
}

/// User registration endpoint
pub async fn signup<D: Database>(
    State(state): State<AppState<D>>,
    WithRejection(Json(payload), _): ApiJson<SignupRequest>,
) -> ServiceResult<impl IntoResponse> {
    let user = state.accounts.signup(&payload).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// Account verification link target
pub async fn verify_account<D: Database>(
    State(state): State<AppState<D>>,
    WithRejection(Path(token), _): ApiPath<String>,
) -> ServiceResult<impl IntoResponse> {
    if state.accounts.verify_account(&token).await? {
        Ok(Json(json!({"message": "Account Activated Successfully"})))
    } else {
        Err(ServiceError::InvalidInput(
            "Invalid verification token".to_string(),
        ))
    }
}

pub async fn resend_activation<D: Database>(
    State(state): State<AppState<D>>,
    WithRejection(Json(payload), _): ApiJson<ResendActivationRequest>,
) -> ServiceResult<impl IntoResponse> {
    state.accounts.resend_activation(&payload.email).await?;
    Ok(Json(json!({"message": "Activation email sent"})))
}

/// User login endpoint
pub async fn login<D: Database>(
    State(state): State<AppState<D>>,
    WithRejection(Json(payload), _): ApiJson<LoginCredentials>,
) -> ServiceResult<impl IntoResponse> {
    let token = state.accounts.login(&payload).await?;
    Ok(Json(token))
}

pub async fn current_user<D: Database>(
    State(state): State<AppState<D>>,
    Extension(principal): Extension<Principal>,
) -> ServiceResult<impl IntoResponse> {
    let user = state.accounts.get_current_user(&principal).await?;
    Ok(Json(user))
}

pub async fn update_profile<D: Database>(
    State(state): State<AppState<D>>,
    Extension(principal): Extension<Principal>,
    WithRejection(Json(payload), _): ApiJson<UpdateProfile>,
) -> ServiceResult<impl IntoResponse> {
    let user = state
        .accounts
        .update_account_type(&principal, payload.account_type)
        .await?;
    Ok(Json(user))
}

/// Get a user by ID
pub async fn get_user<D: Database>(
    State(state): State<AppState<D>>,
    WithRejection(Path(id), _): ApiPath<Uuid>,
) -> ServiceResult<impl IntoResponse> {
    let user = state
        .accounts
        .get_user_by_id(id)
        .await?
        .ok_or_else(|| ServiceError::UserNotFound(id.to_string()))?;
    Ok(Json(user))
}

pub async fn user_posts<D: Database>(
    State(state): State<AppState<D>>,
    WithRejection(Path(id), _): ApiPath<Uuid>,
) -> ServiceResult<impl IntoResponse> {
    Ok(Json(state.network.posts_by_user(id).await?))
}

pub async fn followers<D: Database>(
    State(state): State<AppState<D>>,
    WithRejection(Path(id), _): ApiPath<Uuid>,
) -> ServiceResult<impl IntoResponse> {
    Ok(Json(state.network.followers(id).await?))
}

pub async fn following<D: Database>(
    State(state): State<AppState<D>>,
    WithRejection(Path(id), _): ApiPath<Uuid>,
) -> ServiceResult<impl IntoResponse> {
    Ok(Json(state.network.following(id).await?))
}

pub async fn follow<D: Database>(
    State(state): State<AppState<D>>,
    Extension(principal): Extension<Principal>,
    WithRejection(Path(id), _): ApiPath<Uuid>,
) -> ServiceResult<impl IntoResponse> {
    let edge = state.network.follow(&principal, id).await?;
    Ok((StatusCode::CREATED, Json(edge)))
}

pub async fn unfollow<D: Database>(
    State(state): State<AppState<D>>,
    Extension(principal): Extension<Principal>,
    WithRejection(Path(id), _): ApiPath<Uuid>,
) -> ServiceResult<impl IntoResponse> {
    state.network.unfollow(&principal, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn create_post<D: Database>(
    State(state): State<AppState<D>>,
    Extension(principal): Extension<Principal>,
    WithRejection(Json(payload), _): ApiJson<NewPost>,
) -> ServiceResult<impl IntoResponse> {
    let post = state.network.create_post(&principal, &payload.content).await?;
    Ok((StatusCode::CREATED, Json(post)))
}
