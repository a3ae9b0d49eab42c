#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{HeaderMap, Request, StatusCode},
};
use http_body_util::BodyExt;
use hutao_api::{
    config::AppConfig,
    container::{AppContainer, AppContext},
    modules::{
        mailer::NoopMailer,
        storage::{DataStore, FileDataStore},
    },
    routes::create_router,
};
use serde_json::Value;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

pub const TOKEN: &str = "integration-token";

pub struct TestApp {
    _dir: TempDir,
    pub store: DataStore,
    pub ctx: AppContext,
}

impl TestApp {
    pub async fn new() -> Self {
        let mut config = AppConfig::default();
        config.api_token = Some(TOKEN.to_string());
        config.client_gate.bypass = true;
        Self::with_config(config).await
    }

    pub async fn with_config(config: AppConfig) -> Self {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let store: DataStore = Arc::new(
            FileDataStore::with_path(dir.path())
                .await
                .expect("Failed to create file data store"),
        );
        let container = AppContainer::from_parts(config, store.clone(), Arc::new(NoopMailer))
            .expect("Failed to build container");
        let ctx = container.create_app_context();
        ctx.redirect_rules.seed_defaults().await.unwrap();

        Self {
            _dir: dir,
            store,
            ctx,
        }
    }

    pub fn router(&self) -> Router {
        create_router(self.ctx.clone())
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, HeaderMap, Vec<u8>) {
        let response = self.router().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.into_body().collect().await.unwrap().to_bytes().to_vec();
        (status, headers, body)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, HeaderMap, Vec<u8>) {
        self.send(Request::get(uri).body(Body::empty()).unwrap()).await
    }
}

pub fn json_body(body: &[u8]) -> Value {
    serde_json::from_slice(body).unwrap()
}
