use axum::{
    Json, Router,
    extract::{Extension, Query},
    middleware,
    routing::get,
};
use serde::Deserialize;
use serde_json::json;

use crate::container::AppContext;
use crate::error::ApiResult;
use crate::responses::StandardResponse;
use crate::services::StrategyChannel;

use super::auth::api_token_middleware;

pub fn routes() -> Router {
    let admin = Router::new()
        .route("/refresh", get(refresh))
        .route_layer(middleware::from_fn(api_token_middleware));

    Router::new().route("/item", get(item)).merge(admin)
}

#[derive(Deserialize)]
pub struct RefreshQuery {
    #[serde(default)]
    pub channel: String,
}

#[derive(Deserialize)]
pub struct ItemQuery {
    pub item_id: i64,
}

/// 从米游社/HoYoLAB 刷新角色攻略
#[utoipa::path(
    get,
    path = "/global/strategy/refresh",
    tag = "Strategy",
    summary = "Refresh avatar strategy cache",
    params(("channel" = String, Query, description = "miyoushe, hoyolab or all")),
    responses(
        (status = 200, description = "Refresh result and the full cache", body = StandardResponse),
        (status = 400, description = "Invalid channel"),
        (status = 403, description = "API token is invalid")
    )
)]
pub async fn refresh(
    Extension(ctx): Extension<AppContext>,
    Query(query): Query<RefreshQuery>,
) -> ApiResult<Json<StandardResponse>> {
    let channel: StrategyChannel = query.channel.parse()?;
    let result = ctx.strategy_service.refresh(channel).await?;
    Ok(Json(StandardResponse::with_message(
        "Success",
        json!({ "db": result.updated, "cache": result.cache }),
    )))
}

#[utoipa::path(
    get,
    path = "/global/strategy/item",
    tag = "Strategy",
    summary = "Get strategy links of an avatar",
    params(("item_id" = i64, Query, description = "Avatar ID")),
    responses((status = 200, description = "Miyoushe and HoYoLAB links", body = StandardResponse))
)]
pub async fn item(
    Extension(ctx): Extension<AppContext>,
    Query(query): Query<ItemQuery>,
) -> ApiResult<Json<StandardResponse>> {
    let links = ctx.strategy_service.item(query.item_id).await?;
    Ok(Json(StandardResponse::with_message("Success", links)))
}
