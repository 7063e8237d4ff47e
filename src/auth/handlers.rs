use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{AuthResponse, LoginRequest, PublicUser, RegisterRequest},
        jwt::JwtKeys,
        password::{hash_password, verify_password},
        repo,
    },
    error::AppError,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
}

/// A freshly registered user is a created resource.
fn created(user: &repo::User, token: String) -> (StatusCode, Json<AuthResponse>) {
    (
        StatusCode::CREATED,
        Json(AuthResponse {
            user: PublicUser::from(user),
            token,
        }),
    )
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(mut payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    payload.normalize();
    if let Err(e) = payload.validate() {
        warn!(email = %payload.email, "register payload rejected");
        return Err(e);
    }

    let hash = hash_password(&payload.password)?;
    let user = repo::create(&state.db, &payload.email, &hash, payload.full_name.trim()).await?;

    let keys = JwtKeys::from_ref(&state);
    let token = keys.sign(&user.email, &user.full_name, &user.roles)?;

    info!(user_id = user.id, email = %user.email, "user registered");
    Ok(created(&user, token))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(mut payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    payload.email = payload.email.trim().to_lowercase();

    // Unknown email and wrong password are deliberately indistinguishable.
    let Some(user) = repo::find_by_email(&state.db, &payload.email).await? else {
        warn!(email = %payload.email, "login unknown email");
        return Err(AppError::Auth("Invalid credentials".into()));
    };

    if !verify_password(&payload.password, &user.password_hash)? {
        warn!(email = %payload.email, user_id = user.id, "login invalid password");
        return Err(AppError::Auth("Invalid credentials".into()));
    }

    let keys = JwtKeys::from_ref(&state);
    let token = keys.sign(&user.email, &user.full_name, &user.roles)?;

    info!(user_id = user.id, email = %user.email, "user logged in");
    Ok(Json(AuthResponse {
        user: PublicUser::from(&user),
        token,
    }))
}
