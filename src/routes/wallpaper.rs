use axum::{
    Json, Router,
    extract::Extension,
    middleware,
    routing::{get, post},
};

use crate::container::AppContext;
use crate::error::ApiResult;
use crate::models::Wallpaper;
use crate::modules::client_gate::client_gate_middleware;
use crate::responses::WallpaperUrlRequest;

use super::auth::api_token_middleware;

pub fn routes() -> Router {
    let admin = Router::new()
        .route("/all", get(all))
        .route("/add", post(add))
        .route("/disable", post(disable))
        .route("/enable", post(enable))
        .route("/refresh", get(refresh))
        .route("/reset", get(reset))
        .route_layer(middleware::from_fn(api_token_middleware));

    let gated = Router::new()
        .route("/today", get(today))
        .route_layer(middleware::from_fn(client_gate_middleware));

    admin.merge(gated)
}

pub async fn all(Extension(ctx): Extension<AppContext>) -> ApiResult<Json<Vec<Wallpaper>>> {
    Ok(Json(ctx.wallpaper_service.all().await?))
}

pub async fn add(
    Extension(ctx): Extension<AppContext>,
    Json(wallpaper): Json<Wallpaper>,
) -> ApiResult<Json<Wallpaper>> {
    Ok(Json(ctx.wallpaper_service.add(wallpaper).await?))
}

pub async fn disable(
    Extension(ctx): Extension<AppContext>,
    Json(request): Json<WallpaperUrlRequest>,
) -> ApiResult<Json<bool>> {
    if request.url.is_empty() {
        return Ok(Json(false));
    }
    Ok(Json(ctx.wallpaper_service.set_disabled(&request.url, true).await?))
}

pub async fn enable(
    Extension(ctx): Extension<AppContext>,
    Json(request): Json<WallpaperUrlRequest>,
) -> ApiResult<Json<bool>> {
    if request.url.is_empty() {
        return Ok(Json(false));
    }
    Ok(Json(ctx.wallpaper_service.set_disabled(&request.url, false).await?))
}

/// 今日壁纸
#[utoipa::path(
    get,
    path = "/global/wallpaper/today",
    tag = "Wallpaper",
    summary = "Get today's wallpaper",
    responses(
        (status = 200, description = "Wallpaper of the day", body = Wallpaper),
        (status = 404, description = "No enabled wallpaper"),
        (status = 418, description = "Client is outdated")
    )
)]
pub async fn today(Extension(ctx): Extension<AppContext>) -> ApiResult<Json<Wallpaper>> {
    Ok(Json(ctx.wallpaper_service.today(false).await?))
}

pub async fn refresh(Extension(ctx): Extension<AppContext>) -> ApiResult<Json<Wallpaper>> {
    Ok(Json(ctx.wallpaper_service.today(true).await?))
}

pub async fn reset(Extension(ctx): Extension<AppContext>) -> ApiResult<Json<bool>> {
    Ok(Json(ctx.wallpaper_service.reset().await?))
}
