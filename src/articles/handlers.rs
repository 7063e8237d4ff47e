use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware,
    routing::{get, post},
    Extension, Json, Router,
};
use tracing::{info, instrument, warn};

use crate::{
    articles::{
        dto::{ArticleRequest, SuccessResponse},
        repo,
        repo::Article,
    },
    auth::guard::{self, RequiredRoles, Role},
    error::AppError,
    state::AppState,
};

/// Any authenticated user holding at least one valid role may manage articles.
const ARTICLE_ROLES: RequiredRoles =
    RequiredRoles(&[Role::Admin, Role::SuperUser, Role::User]);

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/article", post(create_article).get(list_articles))
        .route(
            "/article/:id",
            get(get_article).put(update_article).delete(delete_article),
        )
        // Layer order matters: the request passes through the declared roles
        // extension, then authentication, then the role gate.
        .route_layer(middleware::from_fn(guard::role_gate))
        .route_layer(middleware::from_fn_with_state(state, guard::authenticate))
        .route_layer(Extension(ARTICLE_ROLES))
}

#[instrument(skip(state, payload))]
pub async fn create_article(
    State(state): State<AppState>,
    Json(payload): Json<ArticleRequest>,
) -> Result<(StatusCode, Json<SuccessResponse>), AppError> {
    if let Err(e) = payload.validate() {
        warn!(name = %payload.name, "create article payload rejected");
        return Err(e);
    }

    let article = repo::insert(&state.db, &payload).await?;
    info!(article_id = article.id, name = %article.name, "article created");

    Ok((
        StatusCode::CREATED,
        Json(SuccessResponse::new(201, "Article created successfully")),
    ))
}

#[instrument(skip(state))]
pub async fn list_articles(
    State(state): State<AppState>,
) -> Result<Json<Vec<Article>>, AppError> {
    let articles = repo::list_active(&state.db).await?;
    Ok(Json(articles))
}

#[instrument(skip(state))]
pub async fn get_article(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<Article>, AppError> {
    repo::find_active(&state.db, id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Article with id {id} not found")))
}

#[instrument(skip(state, payload))]
pub async fn update_article(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(payload): Json<ArticleRequest>,
) -> Result<Json<SuccessResponse>, AppError> {
    if let Err(e) = payload.validate() {
        warn!(article_id = id, "update article payload rejected");
        return Err(e);
    }

    if !repo::update_active(&state.db, id, &payload).await? {
        return Err(AppError::NotFound(format!("Article with id {id} not found")));
    }

    info!(article_id = id, "article updated");
    Ok(Json(SuccessResponse::new(200, "Article updated successfully")))
}

#[instrument(skip(state))]
pub async fn delete_article(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<SuccessResponse>, AppError> {
    if !repo::soft_delete(&state.db, id).await? {
        return Err(AppError::NotFound(format!("Article with id {id} not found")));
    }

    info!(article_id = id, "article soft-deleted");
    Ok(Json(SuccessResponse::new(200, "Article deleted successfully")))
}
