use chrono::Utc;
use serde_json::{Value, json};

use crate::models::{MirrorMeta, MirrorType, PatchMeta};

/// PatchMeta构建器
pub struct PatchMetaBuilder {
    version: String,
    validation: String,
    file_name: String,
    mirrors: Vec<MirrorMeta>,
}

impl PatchMetaBuilder {
    pub fn new() -> Self {
        Self {
            version: "1.0.0.0".to_string(),
            validation: "ABCDEF".to_string(),
            file_name: "Snap.Hutao.msix".to_string(),
            mirrors: vec![MirrorMeta::new(
                "https://github.com/DGP-Studio/Snap.Hutao/releases/download/1.0/Snap.Hutao.msix",
                "GitHub",
                MirrorType::Direct,
            )],
        }
    }

    pub fn with_version(mut self, version: &str) -> Self {
        self.version = version.to_string();
        self
    }

    pub fn with_validation(mut self, validation: &str) -> Self {
        self.validation = validation.to_string();
        self
    }

    pub fn with_mirror(mut self, url: &str, name: &str, mirror_type: MirrorType) -> Self {
        self.mirrors.push(MirrorMeta::new(url, name, mirror_type));
        self
    }

    pub fn without_mirrors(mut self) -> Self {
        self.mirrors.clear();
        self
    }

    pub fn build(self) -> PatchMeta {
        PatchMeta {
            version: self.version,
            validation: self.validation,
            cache_time: Utc::now(),
            file_name: self.file_name,
            mirrors: self.mirrors,
        }
    }
}

/// GitHub release 响应体，assets 为 (文件名, 下载地址)
pub fn github_release_body(tag: &str, assets: &[(&str, &str)]) -> String {
    let assets: Vec<Value> = assets
        .iter()
        .map(|(name, url)| json!({"name": name, "browser_download_url": url}))
        .collect();
    json!({"tag_name": tag, "prerelease": false, "draft": false, "assets": assets}).to_string()
}
