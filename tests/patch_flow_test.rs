mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode, header::LOCATION},
};
use common::{TOKEN, TestApp, json_body};
use hutao_api::config::AppConfig;
use serde_json::json;

async fn app_with_github(server: &mockito::ServerGuard) -> TestApp {
    let mut config = AppConfig::default();
    config.api_token = Some(TOKEN.to_string());
    config.client_gate.bypass = true;
    config.github.api_base = server.url();
    TestApp::with_config(config).await
}

#[tokio::test]
async fn test_refresh_then_serve_and_override_mirror() {
    let mut server = mockito::Server::new_async().await;
    let msix_url = format!("{}/dl/Snap.Hutao_1.12.0_x64.msix", server.url());
    let sums_url = format!("{}/dl/SHA256SUMS", server.url());
    let release = json!({
        "tag_name": "1.12.0",
        "prerelease": false,
        "draft": false,
        "assets": [
            {"name": "Snap.Hutao_1.12.0_x64.msix", "browser_download_url": msix_url},
            {"name": "SHA256SUMS", "browser_download_url": sums_url}
        ]
    });
    server
        .mock("GET", "/repos/DGP-Studio/Snap.Hutao/releases/latest")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(release.to_string())
        .create_async()
        .await;
    server
        .mock("GET", "/dl/SHA256SUMS")
        .with_status(200)
        .with_body("ABC123\r\n")
        .create_async()
        .await;

    let app = app_with_github(&server).await;

    let request = Request::patch("/global/patch/snap-hutao")
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = app.send(request).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json_body(&body)["data"]["version"]["global"]["version"], "1.12.0.0");

    let request = Request::get("/cn/patch/hutao")
        .header("user-agent", "Snap Hutao/1.12.0.0")
        .header("x-device-id", "device-1")
        .header("x-region", "cn")
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = app.send(request).await;
    assert_eq!(status, StatusCode::OK);
    let body = json_body(&body);
    assert_eq!(body["retcode"], 0);
    assert_eq!(body["data"]["version"], "1.12.0.0");
    assert_eq!(body["data"]["sha256"], "ABC123");
    assert_eq!(body["data"]["urls"], json!([msix_url]));

    let request = Request::post("/global/patch/mirror")
        .header("api-token", TOKEN)
        .header("content-type", "application/json")
        .body(Body::from(
            json!({
                "key": "snap-hutao",
                "url": "https://mirror.example.com/Snap.Hutao.msix",
                "mirror_name": "Example",
                "mirror_type": "direct"
            })
            .to_string(),
        ))
        .unwrap();
    let (status, _, body) = app.send(request).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(
        json_body(&body)["message"],
        "Successfully added Example mirror URL for snap-hutao"
    );

    let (status, headers, _) = app.get("/cn/patch/hutao/download").await;
    assert_eq!(status, StatusCode::MOVED_PERMANENTLY);
    assert_eq!(headers[LOCATION], "https://mirror.example.com/Snap.Hutao.msix");
    assert_eq!(headers["x-checksum-sha256"], "ABC123");

    // 国际区不受国内镜像影响
    let (_, headers, _) = app.get("/global/patch/hutao/download").await;
    assert_eq!(headers[LOCATION], msix_url.as_str());

    let request = Request::get("/global/patch/mirror?project=snap-hutao")
        .header("api-token", TOKEN)
        .body(Body::empty())
        .unwrap();
    let (_, _, body) = app.send(request).await;
    assert_eq!(json_body(&body)["data"][0]["mirror_name"], "Example");
}

#[tokio::test]
async fn test_mirror_operations_validate_input() {
    let server = mockito::Server::new_async().await;
    let app = app_with_github(&server).await;

    let request = Request::post("/global/patch/mirror")
        .header("api-token", TOKEN)
        .header("content-type", "application/json")
        .body(Body::from(
            json!({
                "key": "snap-hutao",
                "url": "https://mirror.example.com/a.msix",
                "mirror_name": "Example",
                "mirror_type": "direct"
            })
            .to_string(),
        ))
        .unwrap();
    let (status, _, _) = app.send(request).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let request = Request::delete("/global/patch/mirror")
        .header("api-token", TOKEN)
        .header("content-type", "application/json")
        .body(Body::from(
            json!({"project_name": "snap-hutao-alpha", "mirror_name": "all"}).to_string(),
        ))
        .unwrap();
    let (status, _, _) = app.send(request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let request = Request::patch("/global/patch/unknown-project")
        .body(Body::empty())
        .unwrap();
    let (status, _, _) = app.send(request).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
