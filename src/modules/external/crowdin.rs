use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

use crate::config::CrowdinConfig;
use crate::container::REQWEST_CLIENT;
use crate::error::{ApiError, ApiResult};
use crate::models::LanguageProgress;

async fn get_json(url: &str, api_key: &str) -> ApiResult<Value> {
    let response = REQWEST_CLIENT.get(url).bearer_auth(api_key).send().await?;
    if !response.status().is_success() {
        return Err(ApiError::upstream(
            "crowdin",
            format!("{} returned {}", url, response.status()),
        ));
    }
    Ok(response.json().await?)
}

/// 各语言的翻译进度，未配置 API key 时返回空表
pub async fn fetch_translation_progress(
    config: &CrowdinConfig,
) -> ApiResult<BTreeMap<String, LanguageProgress>> {
    let Some(api_key) = config.api_key.as_deref().filter(|k| !k.is_empty()) else {
        return Ok(BTreeMap::new());
    };
    let base = config.api_base.trim_end_matches('/');
    let project_url = format!("{}/projects/{}", base, config.project_id);

    let project = get_json(&project_url, api_key).await?;
    let language_ids: Vec<String> = project["data"]["targetLanguageIds"]
        .as_array()
        .map(|ids| {
            ids.iter()
                .filter_map(|id| id.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();

    let mut progress = BTreeMap::new();
    for language_id in language_ids {
        let url = format!("{project_url}/languages/{language_id}/progress");
        let resp = get_json(&url, api_key).await?;
        let words = &resp["data"][0]["data"]["words"];
        let (Some(total), Some(translated)) = (words["total"].as_u64(), words["translated"].as_u64())
        else {
            return Err(ApiError::upstream(
                "crowdin",
                format!("missing word counts for {language_id}"),
            ));
        };
        debug!("Crowdin {}: {}/{}", language_id, translated, total);
        progress.insert(language_id, LanguageProgress { total, translated });
    }
    Ok(progress)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_no_api_key_returns_empty() {
        let config = CrowdinConfig::default();
        assert!(fetch_translation_progress(&config).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_progress_per_language() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/projects/565845")
            .match_header("authorization", "Bearer key")
            .with_status(200)
            .with_body(r#"{"data":{"targetLanguageIds":["en","ja"]}}"#)
            .create_async()
            .await;
        for (lang, translated) in [("en", 90), ("ja", 40)] {
            server
                .mock("GET", format!("/projects/565845/languages/{lang}/progress").as_str())
                .with_status(200)
                .with_body(format!(
                    r#"{{"data":[{{"data":{{"words":{{"total":100,"translated":{translated}}}}}}}]}}"#
                ))
                .create_async()
                .await;
        }

        let config = CrowdinConfig {
            api_key: Some("key".to_string()),
            api_base: server.url(),
            ..CrowdinConfig::default()
        };
        let progress = fetch_translation_progress(&config).await.unwrap();
        assert_eq!(progress.len(), 2);
        assert_eq!(progress["ja"].translated, 40);
        assert_eq!(progress["en"].total, 100);
    }
}
