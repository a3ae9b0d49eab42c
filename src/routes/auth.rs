use axum::{
    body::Body,
    extract::Extension,
    http::{HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use tracing::warn;

use crate::config::AppConfig;
use crate::container::AppContext;
use crate::error::{ApiError, ApiResult};

pub const API_TOKEN_HEADER: &str = "api-token";

/// 校验 `api-token` 请求头，未配置令牌时拒绝所有请求
pub fn verify_api_token(config: &AppConfig, headers: &HeaderMap) -> ApiResult<()> {
    let provided = headers
        .get(API_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    match config.api_token.as_deref() {
        Some(expected) if !expected.is_empty() && expected == provided => Ok(()),
        _ => Err(ApiError::PermissionDenied),
    }
}

/// 管理接口鉴权中间件
pub async fn api_token_middleware(
    Extension(ctx): Extension<AppContext>,
    headers: HeaderMap,
    request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    if let Err(e) = verify_api_token(&ctx.get_config(), &headers) {
        warn!("Unauthorized access attempt to {}", request.uri().path());
        return Err(e);
    }
    Ok(next.run(request).await)
}
