use axum::{Json, Router, extract::Extension, routing::get};

use crate::modules::network::RealConnectInfo;
use crate::region::Region;
use crate::responses::IpResponse;

pub fn routes() -> Router {
    Router::new().route("/ip", get(client_ip))
}

/// 客户端 IP 与所属区域
#[utoipa::path(
    get,
    path = "/global/ip",
    tag = "Network",
    summary = "Get client IP and division",
    description = "Also mounted under /cn and /fj. Division is CN for /cn and /fj",
    responses((status = 200, description = "Client address", body = IpResponse))
)]
pub async fn client_ip(
    Extension(region): Extension<Region>,
    Extension(info): Extension<RealConnectInfo>,
) -> Json<IpResponse> {
    Json(IpResponse {
        ip: info.ip().to_string(),
        division: region.division().to_string(),
    })
}
