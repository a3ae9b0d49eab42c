use axum::{Json, Router, extract::Extension, routing::get};

use crate::container::AppContext;
use crate::error::ApiResult;
use crate::responses::StandardResponse;

pub fn routes() -> Router {
    Router::new().route("/status", get(status))
}

/// Crowdin 各语言翻译进度
#[utoipa::path(
    get,
    path = "/global/localization/status",
    tag = "Localization",
    summary = "Get translation progress",
    responses((status = 200, description = "Per-language progress", body = StandardResponse))
)]
pub async fn status(Extension(ctx): Extension<AppContext>) -> ApiResult<Json<StandardResponse>> {
    let progress = ctx.localization_service.status().await?;
    Ok(Json(StandardResponse::with_message("success", progress)))
}
