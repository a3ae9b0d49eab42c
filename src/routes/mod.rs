pub mod auth;
pub mod issue;
pub mod localization;
pub mod mgmt;
pub mod net;
pub mod patch;
pub mod redirect;
pub mod strategy;
pub mod wallpaper;

use axum::{
    Router,
    extract::Extension,
    http::{HeaderValue, StatusCode, header::LOCATION},
    middleware,
    response::{IntoResponse, Response},
    routing::get,
};
use tower_http::cors::{AllowHeaders, AllowMethods, CorsLayer};

use crate::container::AppContext;
use crate::docs::create_docs_router;
use crate::metrics::metrics_middleware;
use crate::modules::network::real_ip_middleware;
use crate::region::Region;

/// 302 跳转
pub(crate) fn found(url: &str) -> Response {
    (StatusCode::FOUND, [(LOCATION, url.to_string())]).into_response()
}

/// 301 跳转
pub(crate) fn moved_permanently(url: &str) -> Response {
    (StatusCode::MOVED_PERMANENTLY, [(LOCATION, url.to_string())]).into_response()
}

async fn homepage(Extension(ctx): Extension<AppContext>) -> Response {
    moved_permanently(&ctx.get_config().homepage_url)
}

/// 单个区域的全部路由，挂载在区域前缀下
pub fn region_router(region: Region) -> Router {
    let router = Router::new()
        .merge(net::routes())
        .merge(redirect::routes())
        .nest("/patch", patch::routes())
        .nest("/wallpaper", wallpaper::routes())
        .nest("/issue", issue::routes())
        .nest("/strategy", strategy::routes())
        .nest("/localization", localization::routes());

    // 福建区域不提供首页跳转
    let router = match region {
        Region::Fujian => router,
        _ => router.route("/", get(homepage)),
    };

    router.layer(Extension(region))
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin([
            HeaderValue::from_static("http://localhost"),
            HeaderValue::from_static("http://localhost:8080"),
        ])
        .allow_credentials(true)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
}

/// 组装完整应用路由
pub fn create_router(ctx: AppContext) -> Router {
    let mut app = Router::new().route("/", get(homepage));
    for region in Region::ALL {
        app = app.nest(region.route_prefix(), region_router(region));
    }

    app.nest("/mgnt", mgmt::routes())
        .merge(create_docs_router())
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(real_ip_middleware))
        .layer(cors_layer())
        .layer(Extension(ctx))
}
