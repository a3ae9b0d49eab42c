use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

#[derive(Debug, Clone)]
pub struct RealConnectInfo {
    pub remote_addr: SocketAddr,
}

impl RealConnectInfo {
    pub fn from_headers_and_addr(headers: &HeaderMap, fallback_addr: SocketAddr) -> Self {
        // 尝试从 X-Real-IP 头获取真实IP
        let real_ip = headers
            .get("x-real-ip")
            .and_then(|value| value.to_str().ok())
            .and_then(|ip_str| ip_str.trim().parse::<IpAddr>().ok())
            .or_else(|| {
                // 如果没有 X-Real-IP，尝试从 X-Forwarded-For 头获取
                headers
                    .get("x-forwarded-for")
                    .and_then(|value| value.to_str().ok())
                    // X-Forwarded-For 可能包含多个IP，取第一个
                    .and_then(|forwarded_for| forwarded_for.split(',').next())
                    .and_then(|ip_str| ip_str.trim().parse::<IpAddr>().ok())
            })
            .unwrap_or_else(|| fallback_addr.ip());

        Self {
            remote_addr: SocketAddr::new(real_ip, fallback_addr.port()),
        }
    }

    pub fn ip(&self) -> IpAddr {
        self.remote_addr.ip()
    }
}

/// 将真实客户端地址写入请求扩展
pub async fn real_ip_middleware(mut req: Request<Body>, next: Next) -> Response {
    // 测试环境下没有 ConnectInfo
    let addr = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr)
        .unwrap_or_else(|| SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0));

    let real_connect_info = RealConnectInfo::from_headers_and_addr(req.headers(), addr);
    req.extensions_mut().insert(real_connect_info);

    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn fallback() -> SocketAddr {
        "10.0.0.1:4321".parse().unwrap()
    }

    #[test]
    fn test_prefers_x_real_ip() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("1.2.3.4"));
        headers.insert("x-forwarded-for", HeaderValue::from_static("5.6.7.8"));
        let info = RealConnectInfo::from_headers_and_addr(&headers, fallback());
        assert_eq!(info.ip().to_string(), "1.2.3.4");
        assert_eq!(info.remote_addr.port(), 4321);
    }

    #[test]
    fn test_uses_first_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("5.6.7.8, 9.9.9.9"),
        );
        let info = RealConnectInfo::from_headers_and_addr(&headers, fallback());
        assert_eq!(info.ip().to_string(), "5.6.7.8");
    }

    #[test]
    fn test_falls_back_to_socket_addr() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("not-an-ip"));
        let info = RealConnectInfo::from_headers_and_addr(&headers, fallback());
        assert_eq!(info.remote_addr, fallback());
    }
}
