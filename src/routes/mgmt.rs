use axum::{
    Json, Router,
    extract::Extension,
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::json;
use tracing::{error, info, warn};

use crate::container::AppContext;
use crate::error::{ApiError, ApiResult};
use crate::modules::stats::{EmailCounter, StatsSnapshot};
use crate::responses::{EmailRequest, HealthResponse, RedirectRuleUpdateRequest, StandardResponse};

use super::auth::api_token_middleware;

pub fn routes() -> Router {
    Router::new()
        .route("/ping", get(ping))
        .route("/health", get(health_check))
        .route("/reload-config", get(reload_config))
        .route("/metrics", get(crate::metrics::metrics_handler))
        .route("/redirect-rules", get(list_redirect_rules).post(update_redirect_rule))
        .route("/stats", get(stats))
        .route("/email/send", post(send_email))
        .route_layer(middleware::from_fn(api_token_middleware))
}

/// 简单ping检查
#[utoipa::path(
    get,
    path = "/mgnt/ping",
    tag = "Management",
    summary = "Simple ping endpoint",
    responses(
        (status = 200, description = "Server is responding"),
        (status = 403, description = "API token is invalid")
    )
)]
pub async fn ping() -> impl IntoResponse {
    StatusCode::OK
}

/// 详细健康检查
#[utoipa::path(
    get,
    path = "/mgnt/health",
    tag = "Management",
    summary = "Get health check information",
    description = "Reports store connectivity, version and debug mode",
    responses(
        (status = 200, description = "Health check completed", body = HealthResponse),
        (status = 403, description = "API token is invalid")
    )
)]
#[tracing::instrument(skip(ctx))]
pub async fn health_check(Extension(ctx): Extension<AppContext>) -> Json<HealthResponse> {
    let store_status = match ctx.data_store.ping().await {
        Ok(_) => "connected".to_string(),
        Err(e) => {
            warn!("Data store connection check failed: {}", e);
            "disconnected".to_string()
        }
    };

    let health = HealthResponse {
        status: if store_status == "connected" {
            "healthy"
        } else {
            "degraded"
        }
        .to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        store_status,
        debug: ctx.get_config().is_debug(),
        last_check: chrono::Utc::now().to_rfc3339(),
    };

    info!(
        "Health check completed: status={}, store={}",
        health.status, health.store_status
    );
    Json(health)
}

/// 配置重载
#[utoipa::path(
    get,
    path = "/mgnt/reload-config",
    tag = "Management",
    summary = "Reload server configuration",
    responses(
        (status = 200, description = "Configuration reloaded", body = StandardResponse),
        (status = 500, description = "Failed to reload configuration", body = StandardResponse)
    )
)]
pub async fn reload_config(Extension(ctx): Extension<AppContext>) -> ApiResult<Json<StandardResponse>> {
    info!("Configuration reload requested");

    ctx.reload_config().await.map_err(|e| {
        error!("Failed to reload configuration: {}", e);
        ApiError::config_error(e.to_string())
    })?;

    info!("Configuration reloaded successfully");
    Ok(Json(StandardResponse::with_message(
        "Configuration reloaded",
        serde_json::Value::Null,
    )))
}

#[utoipa::path(
    get,
    path = "/mgnt/redirect-rules",
    tag = "Management",
    summary = "List redirect rule templates",
    responses((status = 200, description = "Rule name to template", body = StandardResponse))
)]
pub async fn list_redirect_rules(
    Extension(ctx): Extension<AppContext>,
) -> ApiResult<Json<StandardResponse>> {
    let rules = ctx.redirect_rules.list().await?;
    Ok(Json(StandardResponse::with_message("success", rules)))
}

#[utoipa::path(
    post,
    path = "/mgnt/redirect-rules",
    tag = "Management",
    summary = "Update a redirect rule template",
    request_body = RedirectRuleUpdateRequest,
    responses(
        (status = 200, description = "Rule updated", body = StandardResponse),
        (status = 400, description = "Invalid rule name", body = StandardResponse)
    )
)]
pub async fn update_redirect_rule(
    Extension(ctx): Extension<AppContext>,
    Json(request): Json<RedirectRuleUpdateRequest>,
) -> ApiResult<Json<StandardResponse>> {
    let updated = ctx
        .redirect_rules
        .update(&request.rule_name, &request.rule_template)
        .await?;
    Ok(Json(StandardResponse::with_message("success", updated)))
}

#[utoipa::path(
    get,
    path = "/mgnt/stats",
    tag = "Management",
    summary = "Get usage statistics",
    responses((status = 200, description = "Daily history and live counters", body = StatsSnapshot))
)]
pub async fn stats(Extension(ctx): Extension<AppContext>) -> ApiResult<Json<StandardResponse>> {
    let snapshot = ctx.stats.snapshot().await?;
    Ok(Json(StandardResponse::ok(snapshot)))
}

/// 发送邮件
#[utoipa::path(
    post,
    path = "/mgnt/email/send",
    tag = "Management",
    summary = "Send an email",
    request_body = EmailRequest,
    responses(
        (status = 200, description = "Email sent", body = StandardResponse),
        (status = 500, description = "Failed to send email", body = StandardResponse)
    )
)]
pub async fn send_email(
    Extension(ctx): Extension<AppContext>,
    Json(request): Json<EmailRequest>,
) -> Response {
    ctx.stats.incr_email(EmailCounter::Requested).await;

    match ctx
        .mailer
        .send(&request.subject, &request.content, &request.recipient)
        .await
    {
        Ok(()) => {
            ctx.stats.incr_email(EmailCounter::Sent).await;
            ctx.metrics.record_email(true);
            Json(StandardResponse::ok(json!({
                "code": 0,
                "message": "Email sent successfully"
            })))
            .into_response()
        }
        Err(e) => {
            ctx.stats.incr_email(EmailCounter::Failed).await;
            ctx.metrics.record_email(false);
            let reason = match e {
                ApiError::MailError { reason } => reason,
                other => other.to_string(),
            };
            error!("Failed to send email to {}: {}", request.recipient, reason);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(StandardResponse::error(500, format!("Failed to send email: {reason}"))),
            )
                .into_response()
        }
    }
}
