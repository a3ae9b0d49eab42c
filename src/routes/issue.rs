use axum::{Json, Router, extract::Extension, http::HeaderMap, routing::get};
use tracing::error;

use crate::container::AppContext;
use crate::models::IssueReport;
use crate::responses::StandardResponse;

pub fn routes() -> Router {
    Router::new().route("/bug", get(open_bugs))
}

/// 未关闭的 Bug 类 issue 及统计
#[utoipa::path(
    get,
    path = "/global/issue/bug",
    tag = "Issue",
    summary = "List open bug issues",
    responses((status = 200, description = "Issue details and stats; retcode 1 when GitHub is unreachable", body = StandardResponse))
)]
pub async fn open_bugs(
    Extension(ctx): Extension<AppContext>,
    headers: HeaderMap,
) -> Json<StandardResponse> {
    ctx.stats.record_from_headers(&headers).await;

    match ctx.issue_service.open_bugs().await {
        Ok((report, true)) => Json(StandardResponse::with_message("From cache", report)),
        Ok((report, false)) => Json(StandardResponse::with_message("Fetched from GitHub", report)),
        Err(e) => {
            error!("Failed to fetch issues: {}", e);
            Json(StandardResponse::with_retcode(
                1,
                "Failed to fetch issues",
                IssueReport::default(),
            ))
        }
    }
}
