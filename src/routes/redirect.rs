use axum::{
    Json, Router,
    extract::{Extension, Path},
    middleware,
    response::Response,
    routing::get,
};
use tracing::{debug, warn};

use crate::container::AppContext;
use crate::error::{ApiError, ApiResult};
use crate::modules::censor::CENSORED_FILES_KEY;
use crate::modules::client_gate::client_gate_middleware;
use crate::modules::redirect_rules::RuleKind;
use crate::modules::storage::get_json;
use crate::region::Region;

use super::found;

pub fn routes() -> Router {
    let gated = Router::new()
        .route("/metadata/{*file_path}", get(metadata))
        .route("/enka/{uid}", get(enka))
        .route("/enka/{uid}/info", get(enka_info))
        .route_layer(middleware::from_fn(client_gate_middleware));

    Router::new()
        .route("/client/{*file_path}", get(client_feature))
        .route("/static/zip/{*file_path}", get(static_zip))
        .route("/static/raw/{*file_path}", get(static_raw))
        .route("/static/tiny/{file_type}/{*file_path}", get(static_tiny))
        .route("/ban", get(banned_files))
        .merge(gated)
}

async fn redirect_to(
    ctx: &AppContext,
    region: Region,
    kind: RuleKind,
    params: &[(&str, &str)],
) -> ApiResult<Response> {
    let target = ctx.redirect_rules.resolve(region, kind, params).await?;
    ctx.metrics.record_redirect(kind.suffix());
    Ok(found(&target))
}

async fn censored_files(ctx: &AppContext) -> ApiResult<Vec<String>> {
    let files: Option<Vec<String>> = get_json(ctx.data_store.as_ref(), CENSORED_FILES_KEY)
        .await
        .map_err(|e| ApiError::store_error("get_censored_files", e))?;
    Ok(files.unwrap_or_default())
}

pub async fn client_feature(
    Extension(ctx): Extension<AppContext>,
    Extension(region): Extension<Region>,
    Path(file_path): Path<String>,
) -> ApiResult<Response> {
    redirect_to(&ctx, region, RuleKind::ClientFeature, &[("file_path", file_path.as_str())]).await
}

/// 元数据跳转；国内区域遇到被屏蔽的文件时改走福建节点
#[utoipa::path(
    get,
    path = "/cn/metadata/{file_path}",
    tag = "Redirect",
    summary = "Redirect to metadata file",
    params(("file_path" = String, Path, description = "Metadata file path")),
    responses(
        (status = 302, description = "Redirect to the regional metadata host"),
        (status = 404, description = "Redirect rule not configured"),
        (status = 418, description = "Client is outdated")
    )
)]
#[tracing::instrument(skip(ctx))]
pub async fn metadata(
    Extension(ctx): Extension<AppContext>,
    Extension(region): Extension<Region>,
    Path(file_path): Path<String>,
) -> ApiResult<Response> {
    let mut target_region = region;
    if region == Region::China {
        match censored_files(&ctx).await {
            Ok(files) if files.iter().any(|f| *f == file_path) => {
                debug!("Metadata file {} is censored, using fujian host", file_path);
                target_region = Region::Fujian;
            }
            Ok(_) => {}
            Err(e) => warn!("Failed to read censored file list: {}", e),
        }
    }
    redirect_to(&ctx, target_region, RuleKind::Metadata, &[("file_path", file_path.as_str())]).await
}

pub async fn static_zip(
    Extension(ctx): Extension<AppContext>,
    Extension(region): Extension<Region>,
    Path(file_path): Path<String>,
) -> ApiResult<Response> {
    redirect_to(&ctx, region, RuleKind::StaticZip, &[("file_path", file_path.as_str())]).await
}

pub async fn static_raw(
    Extension(ctx): Extension<AppContext>,
    Extension(region): Extension<Region>,
    Path(file_path): Path<String>,
) -> ApiResult<Response> {
    redirect_to(&ctx, region, RuleKind::StaticRaw, &[("file_path", file_path.as_str())]).await
}

pub async fn static_tiny(
    Extension(ctx): Extension<AppContext>,
    Extension(region): Extension<Region>,
    Path((file_type, file_path)): Path<(String, String)>,
) -> ApiResult<Response> {
    redirect_to(
        &ctx,
        region,
        RuleKind::StaticTiny,
        &[("file_type", file_type.as_str()), ("file_path", file_path.as_str())],
    )
    .await
}

pub async fn enka(
    Extension(ctx): Extension<AppContext>,
    Extension(region): Extension<Region>,
    Path(uid): Path<String>,
) -> ApiResult<Response> {
    redirect_to(&ctx, region, RuleKind::Enka, &[("uid", uid.as_str())]).await
}

pub async fn enka_info(
    Extension(ctx): Extension<AppContext>,
    Extension(region): Extension<Region>,
    Path(uid): Path<String>,
) -> ApiResult<Response> {
    redirect_to(&ctx, region, RuleKind::EnkaInfo, &[("uid", uid.as_str())]).await
}

/// 被屏蔽的元数据文件列表
#[utoipa::path(
    get,
    path = "/cn/ban",
    tag = "Redirect",
    summary = "List censored metadata files",
    responses((status = 200, description = "Censored file paths", body = Vec<String>))
)]
pub async fn banned_files(Extension(ctx): Extension<AppContext>) -> ApiResult<Json<Vec<String>>> {
    Ok(Json(censored_files(&ctx).await?))
}
