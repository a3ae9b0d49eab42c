use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::models::*;
use crate::modules::stats::{LiveCounters, StatsSnapshot};
use crate::responses::*;

/// Hutao Generic API Documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Hutao Generic API",
        version = "0.3.0",
        description = "Multi-region gateway for Snap Hutao clients. Every regional endpoint is mounted under /cn, /global and /fj; the documented paths use one of them.",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    paths(
        // Management endpoints
        crate::routes::mgmt::ping,
        crate::routes::mgmt::health_check,
        crate::routes::mgmt::reload_config,
        crate::routes::mgmt::list_redirect_rules,
        crate::routes::mgmt::update_redirect_rule,
        crate::routes::mgmt::stats,
        crate::routes::mgmt::send_email,

        // Regional endpoints
        crate::routes::net::client_ip,
        crate::routes::redirect::metadata,
        crate::routes::redirect::banned_files,
        crate::routes::patch::hutao,
        crate::routes::patch::hutao_download,
        crate::routes::patch::alpha,
        crate::routes::patch::refresh_project,
        crate::routes::patch::list_mirrors,
        crate::routes::patch::add_mirror,
        crate::routes::patch::delete_mirror,
        crate::routes::wallpaper::today,
        crate::routes::issue::open_bugs,
        crate::routes::strategy::refresh,
        crate::routes::strategy::item,
        crate::routes::localization::status,
    ),
    components(
        schemas(
            StandardResponse,
            IpResponse,
            HealthResponse,
            RedirectRuleUpdateRequest,
            MirrorCreateRequest,
            MirrorDeleteRequest,
            EmailRequest,
            WallpaperUrlRequest,
            MirrorType,
            MirrorMeta,
            PatchMeta,
            PatchView,
            Wallpaper,
            StrategyLinks,
            IssueSummary,
            IssueStats,
            IssueReport,
            LanguageProgress,
            DailyActiveUserStats,
            DailyVersionStats,
            StatsSnapshot,
            LiveCounters,
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development server"),
        (url = "https://api.snapgenshin.com", description = "Production server")
    ),
    tags(
        (name = "Patch", description = "Client versions, downloads and mirrors"),
        (name = "Redirect", description = "Rule based redirects to regional hosts"),
        (name = "Network", description = "Client network information"),
        (name = "Wallpaper", description = "Daily wallpaper"),
        (name = "Issue", description = "Open bug reports"),
        (name = "Strategy", description = "Avatar strategy links"),
        (name = "Localization", description = "Translation progress"),
        (name = "Management", description = "Server management and monitoring endpoints")
    ),
)]
pub struct ApiDoc;

/// Check if OpenAPI docs are enabled via environment variable
pub fn is_openapi_docs_enabled() -> bool {
    std::env::var("ENABLE_OPENAPI_DOCS")
        .unwrap_or_else(|_| "false".to_string())
        .parse::<bool>()
        .unwrap_or(false)
}

/// Create API documentation router (only if enabled)
pub fn create_docs_router() -> Router {
    if is_openapi_docs_enabled() {
        Router::new()
            .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
    } else {
        Router::new()
    }
}
