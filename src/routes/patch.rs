use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::{HeaderMap, HeaderValue, StatusCode, header::USER_AGENT},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, patch},
};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::container::AppContext;
use crate::error::ApiResult;
use crate::region::Region;
use crate::responses::{MirrorCreateRequest, MirrorDeleteRequest, StandardResponse};

use super::auth::api_token_middleware;
use super::moved_permanently;

pub const SNAP_HUTAO: &str = "snap-hutao";
pub const SNAP_HUTAO_DEPLOYMENT: &str = "snap-hutao-deployment";
pub const SNAP_HUTAO_ALPHA: &str = "snap-hutao-alpha";

pub const CHECKSUM_HEADER: &str = "x-checksum-sha256";

pub fn routes() -> Router {
    let mirrors = Router::new()
        .route(
            "/mirror",
            get(list_mirrors).post(add_mirror).delete(delete_mirror),
        )
        .route_layer(middleware::from_fn(api_token_middleware));

    Router::new()
        .route("/hutao", get(hutao))
        .route("/hutao/download", get(hutao_download))
        .route("/hutao-deployment", get(deployment))
        .route("/hutao-deployment/download", get(deployment_download))
        .route("/alpha", get(alpha))
        .route("/{project}", patch(refresh_project))
        .merge(mirrors)
}

fn download_redirect(url: &str, checksum: Option<&str>) -> Response {
    let mut response = moved_permanently(url);
    if let Some(value) = checksum.and_then(|c| HeaderValue::from_str(c).ok()) {
        response.headers_mut().insert(CHECKSUM_HEADER, value);
    }
    response
}

async fn patch_response(
    ctx: &AppContext,
    project: &str,
    region: Region,
    headers: &HeaderMap,
) -> ApiResult<Json<StandardResponse>> {
    let user_agent = headers
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let lookup = ctx.patch_service.patch_view(project, region, user_agent).await?;
    Ok(Json(StandardResponse::with_retcode(
        lookup.retcode,
        lookup.message,
        lookup.view,
    )))
}

/// Snap Hutao 最新版本
#[utoipa::path(
    get,
    path = "/global/patch/hutao",
    tag = "Patch",
    summary = "Get latest Snap Hutao version",
    description = "China and Fujian prefixes serve the cn view. Outdated clients receive retcode 418",
    responses((status = 200, description = "Patch view", body = StandardResponse))
)]
#[tracing::instrument(skip(ctx, headers))]
pub async fn hutao(
    Extension(ctx): Extension<AppContext>,
    Extension(region): Extension<Region>,
    headers: HeaderMap,
) -> ApiResult<Json<StandardResponse>> {
    ctx.stats.record_from_headers(&headers).await;
    patch_response(&ctx, SNAP_HUTAO, region, &headers).await
}

/// 跳转到首选镜像，附带 SHA256
#[utoipa::path(
    get,
    path = "/global/patch/hutao/download",
    tag = "Patch",
    summary = "Download latest Snap Hutao package",
    responses(
        (status = 301, description = "Redirect to the preferred mirror"),
        (status = 404, description = "No patch data cached")
    )
)]
pub async fn hutao_download(
    Extension(ctx): Extension<AppContext>,
    Extension(region): Extension<Region>,
) -> ApiResult<Response> {
    let (url, checksum) = ctx.patch_service.download_target(SNAP_HUTAO, region).await?;
    Ok(download_redirect(&url, checksum.as_deref()))
}

pub async fn deployment(
    Extension(ctx): Extension<AppContext>,
    Extension(region): Extension<Region>,
    headers: HeaderMap,
) -> ApiResult<Json<StandardResponse>> {
    patch_response(&ctx, SNAP_HUTAO_DEPLOYMENT, region, &headers).await
}

pub async fn deployment_download(
    Extension(ctx): Extension<AppContext>,
    Extension(region): Extension<Region>,
) -> ApiResult<Response> {
    let (url, _) = ctx
        .patch_service
        .download_target(SNAP_HUTAO_DEPLOYMENT, region)
        .await?;
    Ok(moved_permanently(&url))
}

#[utoipa::path(
    get,
    path = "/global/patch/alpha",
    tag = "Patch",
    summary = "Get latest alpha build artifact",
    responses((status = 200, description = "Alpha build metadata, null when unavailable", body = StandardResponse))
)]
pub async fn alpha(Extension(ctx): Extension<AppContext>) -> ApiResult<Json<StandardResponse>> {
    let meta = ctx.patch_service.alpha(SNAP_HUTAO_ALPHA).await?;
    Ok(Json(StandardResponse::with_message("Alpha means testing", meta)))
}

/// 立即从上游刷新项目
#[utoipa::path(
    patch,
    path = "/global/patch/{project}",
    tag = "Patch",
    summary = "Refresh project patch data from upstream",
    params(("project" = String, Path, description = "Project key")),
    responses(
        (status = 201, description = "Project refreshed", body = StandardResponse),
        (status = 404, description = "Unknown project")
    )
)]
pub async fn refresh_project(
    Extension(ctx): Extension<AppContext>,
    Path(project): Path<String>,
) -> ApiResult<Response> {
    let outcome = ctx.patch_service.refresh(&project).await?;
    info!("Project {} refreshed on request", project);
    Ok((
        StatusCode::CREATED,
        Json(StandardResponse::ok(json!({ "version": outcome }))),
    )
        .into_response())
}

#[derive(Deserialize)]
pub struct MirrorQuery {
    #[serde(default)]
    pub project: String,
}

#[utoipa::path(
    get,
    path = "/global/patch/mirror",
    tag = "Management",
    summary = "List mirrors of the current version",
    params(("project" = String, Query, description = "Project key")),
    responses(
        (status = 200, description = "Mirror list", body = StandardResponse),
        (status = 400, description = "Invalid project key"),
        (status = 403, description = "API token is invalid")
    )
)]
pub async fn list_mirrors(
    Extension(ctx): Extension<AppContext>,
    Query(query): Query<MirrorQuery>,
) -> ApiResult<Json<StandardResponse>> {
    let mirrors = ctx.patch_service.list_mirrors(&query.project).await?;
    Ok(Json(StandardResponse::with_message(
        format!("Overwritten URL data for {}", query.project),
        mirrors,
    )))
}

#[utoipa::path(
    post,
    path = "/global/patch/mirror",
    tag = "Management",
    summary = "Add or update a mirror",
    request_body = MirrorCreateRequest,
    responses(
        (status = 201, description = "Mirror saved", body = StandardResponse),
        (status = 400, description = "Invalid request"),
        (status = 403, description = "API token is invalid"),
        (status = 404, description = "No version cached")
    )
)]
pub async fn add_mirror(
    Extension(ctx): Extension<AppContext>,
    Json(request): Json<MirrorCreateRequest>,
) -> ApiResult<Response> {
    let update = ctx
        .patch_service
        .add_mirror(
            &request.key,
            &request.url,
            &request.mirror_name,
            request.mirror_type,
        )
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(StandardResponse::with_message(update.message, update.mirrors)),
    )
        .into_response())
}

#[utoipa::path(
    delete,
    path = "/global/patch/mirror",
    tag = "Management",
    summary = "Delete a mirror, `all` clears the list",
    request_body = MirrorDeleteRequest,
    responses(
        (status = 201, description = "Mirror list updated", body = StandardResponse),
        (status = 400, description = "Invalid request"),
        (status = 403, description = "API token is invalid")
    )
)]
pub async fn delete_mirror(
    Extension(ctx): Extension<AppContext>,
    Json(request): Json<MirrorDeleteRequest>,
) -> ApiResult<Response> {
    let update = ctx
        .patch_service
        .delete_mirror(&request.project_name, &request.mirror_name)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(StandardResponse::with_message(update.message, update.mirrors)),
    )
        .into_response())
}
