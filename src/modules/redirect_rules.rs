use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::config::SharedConfig;
use crate::error::{ApiError, ApiResult};
use crate::modules::storage::DataStore;
use crate::region::Region;

/// 内置重定向模板，启动时写入存储（已存在的键不会被覆盖）
pub const DEFAULT_RULES: &[(&str, &str)] = &[
    ("china:client-feature", "https://static-next.snapgenshin.com/d/meta/client-feature/{file_path}"),
    ("global:client-feature", "https://hutao-client-pages.snapgenshin.cn/{file_path}"),
    ("fujian:client-feature", "https://client-feature.snapgenshin.com/{file_path}"),
    ("china:enka-network", "https://profile.microgg.cn/api/uid/{uid}"),
    ("global:enka-network", "https://enka.network/api/uid/{uid}/"),
    ("china:enka-network-info", "https://profile.microgg.cn/api/uid/{uid}?info"),
    ("global:enka-network-info", "https://enka.network/api/uid/{uid}?info"),
    ("china:metadata", "https://static-next.snapgenshin.com/d/meta/metadata/{file_path}"),
    ("global:metadata", "https://hutao-metadata-pages.snapgenshin.cn/{file_path}"),
    ("fujian:metadata", "https://metadata.snapgenshin.com/{file_path}"),
    ("china:static:zip", "https://open-7419b310-fc97-4a0c-bedf-b8faca13eb7e-s3.saturn.xxyy.co:8443/hutao/{file_path}"),
    ("global:static:zip", "https://static-zip.snapgenshin.cn/{file_path}"),
    ("fujian:static:zip", "https://static.snapgenshin.com/{file_path}"),
    ("china:static:raw", "https://open-7419b310-fc97-4a0c-bedf-b8faca13eb7e-s3.saturn.xxyy.co:8443/hutao/{file_path}"),
    ("global:static:raw", "https://static.snapgenshin.cn/{file_path}"),
    ("fujian:static:raw", "https://static.snapgenshin.com/{file_path}"),
    ("global:static:tiny", "https://static-tiny.snapgenshin.cn/{file_type}/{file_path}"),
];

/// 重定向目标类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    ClientFeature,
    Metadata,
    StaticZip,
    StaticRaw,
    StaticTiny,
    Enka,
    EnkaInfo,
}

impl RuleKind {
    pub fn suffix(&self) -> &'static str {
        match self {
            RuleKind::ClientFeature => "client-feature",
            RuleKind::Metadata => "metadata",
            RuleKind::StaticZip => "static:zip",
            RuleKind::StaticRaw => "static:raw",
            RuleKind::StaticTiny => "static:tiny",
            RuleKind::Enka => "enka-network",
            RuleKind::EnkaInfo => "enka-network-info",
        }
    }

    pub fn rule_name(&self, region: Region) -> String {
        format!("{}:{}", region.rule_key(), self.suffix())
    }
}

/// 按 `{name}` 占位符替换参数，参数值原样输出，未知占位符保留
pub fn render(template: &str, params: &[(&str, &str)]) -> String {
    let mut output = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        output.push_str(&rest[..start]);
        let tail = &rest[start..];
        let value = tail.find('}').and_then(|end| {
            let name = &tail[1..end];
            params
                .iter()
                .find(|(param, _)| *param == name)
                .map(|(_, value)| (end, *value))
        });
        match value {
            Some((end, value)) => {
                output.push_str(value);
                rest = &tail[end + 1..];
            }
            None => {
                output.push('{');
                rest = &tail[1..];
            }
        }
    }

    output.push_str(rest);
    output
}

pub fn is_known_rule(name: &str) -> bool {
    DEFAULT_RULES.iter().any(|(key, _)| *key == name)
}

#[derive(Clone)]
pub struct RedirectRuleService {
    store: DataStore,
    config: SharedConfig,
}

impl RedirectRuleService {
    pub fn new(store: DataStore, config: SharedConfig) -> Self {
        Self { store, config }
    }

    /// 配置文件中的覆盖值优先于内置模板
    fn default_template(&self, name: &str) -> Option<String> {
        let config = self.config.load();
        config.redirect_rules.get(name).cloned().or_else(|| {
            DEFAULT_RULES
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| value.to_string())
        })
    }

    /// 写入缺失的默认规则，返回新写入的数量
    pub async fn seed_defaults(&self) -> ApiResult<usize> {
        let mut seeded = 0;
        for (name, _) in DEFAULT_RULES {
            let Some(template) = self.default_template(name) else {
                continue;
            };
            let written = self
                .store
                .set_string_if_absent(name, &template)
                .await
                .map_err(|e| ApiError::store_error("seed_redirect_rule", e))?;
            if written {
                seeded += 1;
            }
        }
        info!("Redirect rules seeded: {} new of {}", seeded, DEFAULT_RULES.len());
        Ok(seeded)
    }

    pub async fn list(&self) -> ApiResult<BTreeMap<String, Option<String>>> {
        let mut rules = BTreeMap::new();
        for (name, _) in DEFAULT_RULES {
            let value = self
                .store
                .get_string(name)
                .await
                .map_err(|e| ApiError::store_error("list_redirect_rules", e))?;
            rules.insert(name.to_string(), value);
        }
        Ok(rules)
    }

    pub async fn update(&self, name: &str, template: &str) -> ApiResult<BTreeMap<String, String>> {
        if !is_known_rule(name) {
            return Err(ApiError::invalid_input("rule_name", "Invalid rule name"));
        }
        if template.trim().is_empty() {
            return Err(ApiError::invalid_input("rule_template", "template must not be empty"));
        }

        self.store
            .set_string(name, template, None)
            .await
            .map_err(|e| ApiError::store_error("update_redirect_rule", e))?;
        info!("Redirect rule {} updated to {}", name, template);

        Ok(BTreeMap::from([(name.to_string(), template.to_string())]))
    }

    async fn lookup(&self, name: &str) -> ApiResult<Option<String>> {
        let stored = self
            .store
            .get_string(name)
            .await
            .map_err(|e| ApiError::store_error("get_redirect_rule", e))?;
        Ok(stored
            .filter(|v| !v.is_empty())
            .or_else(|| self.default_template(name)))
    }

    /// 解析区域规则并渲染出目标地址
    pub async fn resolve(
        &self,
        region: Region,
        kind: RuleKind,
        params: &[(&str, &str)],
    ) -> ApiResult<String> {
        let mut candidates = vec![kind.rule_name(region)];
        match kind {
            // 福建区域没有独立的 enka 节点
            RuleKind::Enka | RuleKind::EnkaInfo if region == Region::Fujian => {
                candidates.push(kind.rule_name(Region::China));
            }
            RuleKind::StaticTiny => candidates.push(RuleKind::StaticRaw.rule_name(region)),
            _ => {}
        }

        for name in &candidates {
            if let Some(template) = self.lookup(name).await? {
                let target = render(&template, params);
                debug!("Redirect rule {} resolved to {}", name, target);
                return Ok(target);
            }
        }

        Err(ApiError::rule_not_found(kind.rule_name(region)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::tests::common::*;

    fn service(env: &TestEnvironment) -> RedirectRuleService {
        RedirectRuleService::new(env.data_store.clone(), env.shared_config.clone())
    }

    #[test]
    fn test_render_replaces_all_placeholders() {
        let url = render(
            "https://static-tiny.snapgenshin.cn/{file_type}/{file_path}",
            &[("file_type", "png"), ("file_path", "a/b.png")],
        );
        assert_eq!(url, "https://static-tiny.snapgenshin.cn/png/a/b.png");
        assert_eq!(render("https://x/{uid}", &[]), "https://x/{uid}");
    }

    #[test]
    fn test_render_does_not_expand_placeholders_inside_values() {
        let url = render(
            "https://static-tiny.snapgenshin.cn/{file_path}/{file_type}",
            &[("file_path", "a/{file_type}.png"), ("file_type", "webp")],
        );
        assert_eq!(url, "https://static-tiny.snapgenshin.cn/a/{file_type}.png/webp");
        assert_eq!(render("{{uid}}", &[("uid", "1")]), "{1}");
    }

    #[tokio::test]
    async fn test_seed_does_not_overwrite() {
        let env = TestEnvironment::new();
        let rules = service(&env);
        env.data_store
            .set_string("global:metadata", "https://custom/{file_path}", None)
            .await
            .unwrap();

        let seeded = rules.seed_defaults().await.unwrap();
        assert_eq!(seeded, DEFAULT_RULES.len() - 1);
        assert_eq!(
            env.data_store.get_string("global:metadata").await.unwrap(),
            Some("https://custom/{file_path}".to_string())
        );
        assert_eq!(rules.seed_defaults().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_update_rejects_unknown_rule() {
        let env = TestEnvironment::new();
        let err = service(&env)
            .update("mars:metadata", "https://x/{file_path}")
            .await
            .unwrap_err();
        assert_eq!(err.http_status_code(), 400);
        assert!(err.to_string().contains("Invalid rule name"));
    }

    #[tokio::test]
    async fn test_update_then_list() {
        let env = TestEnvironment::new();
        let rules = service(&env);
        rules
            .update("china:metadata", "https://cn.example/{file_path}")
            .await
            .unwrap();
        let listed = rules.list().await.unwrap();
        assert_eq!(listed.len(), DEFAULT_RULES.len());
        assert_eq!(
            listed["china:metadata"].as_deref(),
            Some("https://cn.example/{file_path}")
        );
        assert_eq!(listed["global:metadata"], None);
    }

    #[tokio::test]
    async fn test_resolve_fallbacks() {
        let env = TestEnvironment::new();
        let rules = service(&env);

        let enka = rules
            .resolve(Region::Fujian, RuleKind::Enka, &[("uid", "100000001")])
            .await
            .unwrap();
        assert_eq!(enka, "https://profile.microgg.cn/api/uid/100000001");

        let tiny = rules
            .resolve(
                Region::Fujian,
                RuleKind::StaticTiny,
                &[("file_type", "png"), ("file_path", "a.png")],
            )
            .await
            .unwrap();
        assert_eq!(tiny, "https://static.snapgenshin.com/a.png");

        let info = rules
            .resolve(Region::Fujian, RuleKind::EnkaInfo, &[("uid", "1")])
            .await
            .unwrap();
        assert_eq!(info, "https://profile.microgg.cn/api/uid/1?info");
    }

    #[tokio::test]
    async fn test_config_override_used_as_default() {
        let mut config = AppConfig::default();
        config
            .redirect_rules
            .insert("global:metadata".to_string(), "https://mirror/{file_path}".to_string());
        let env = TestEnvironment::with_config(config);
        let url = service(&env)
            .resolve(Region::Global, RuleKind::Metadata, &[("file_path", "Genshin/CHS/Meta.json")])
            .await
            .unwrap();
        assert_eq!(url, "https://mirror/Genshin/CHS/Meta.json");
    }
}
