use serde_json::{Value, json};

use crate::config::StrategyConfig;
use crate::container::REQWEST_CLIENT;
use crate::error::{ApiError, ApiResult};

/// 攻略站点中的一个角色条目
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyEntry {
    pub name: String,
    pub id: i64,
}

fn as_id(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
}

/// 米游社：频道 -> 角色菜单 -> 角色列表
pub fn parse_miyoushe_list(body: &Value, channel_id: i64, menu_id: i64) -> Vec<StrategyEntry> {
    let Some(menus) = body["data"]["list"].as_array() else {
        return Vec::new();
    };
    menus
        .iter()
        .filter(|menu| as_id(&menu["id"]) == Some(channel_id))
        .filter_map(|menu| menu["children"].as_array())
        .flatten()
        .find(|item| as_id(&item["id"]) == Some(menu_id))
        .and_then(|item| item["children"].as_array())
        .map(|avatars| {
            avatars
                .iter()
                .filter_map(|avatar| {
                    Some(StrategyEntry {
                        name: avatar["name"].as_str()?.to_string(),
                        id: as_id(&avatar["id"])?,
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

pub fn parse_hoyolab_list(body: &Value) -> Vec<StrategyEntry> {
    body["data"]["grid_item_list"]
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| {
                    Some(StrategyEntry {
                        name: item["title"].as_str()?.to_string(),
                        id: as_id(&item["id"])?,
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

async fn read_body(source: &str, response: reqwest::Response) -> ApiResult<Value> {
    if !response.status().is_success() {
        return Err(ApiError::upstream(
            source,
            format!("status code: {}", response.status()),
        ));
    }
    Ok(response.json().await?)
}

pub async fn fetch_miyoushe_avatars(config: &StrategyConfig) -> ApiResult<Vec<StrategyEntry>> {
    let response = REQWEST_CLIENT.get(&config.miyoushe_list_url).send().await?;
    let body = read_body("miyoushe", response).await?;
    Ok(parse_miyoushe_list(
        &body,
        config.miyoushe_channel_id,
        config.miyoushe_avatar_menu_id,
    ))
}

pub async fn fetch_hoyolab_avatars(config: &StrategyConfig) -> ApiResult<Vec<StrategyEntry>> {
    let response = REQWEST_CLIENT
        .post(&config.hoyolab_list_url)
        .header("Accept-Language", "zh-CN,zh;q=0.9")
        .header("X-Rpc-Language", "zh-cn")
        .header("X-Rpc-Show-Translated", "true")
        .json(&json!({
            "id": config.hoyolab_guide_id,
            "offset": "",
            "selector_id_list": [],
            "size": 100
        }))
        .send()
        .await?;
    let body = read_body("hoyolab", response).await?;
    Ok(parse_hoyolab_list(&body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_miyoushe_list() {
        let body = json!({
            "data": {"list": [
                {"id": 12, "children": []},
                {"id": 37, "children": [
                    {"id": 40, "children": [{"name": "护摩之杖", "id": 1}]},
                    {"id": 39, "children": [
                        {"name": "胡桃", "id": 123},
                        {"name": "钟离", "id": "124"}
                    ]}
                ]}
            ]}
        });
        let entries = parse_miyoushe_list(&body, 37, 39);
        assert_eq!(
            entries,
            vec![
                StrategyEntry { name: "胡桃".to_string(), id: 123 },
                StrategyEntry { name: "钟离".to_string(), id: 124 },
            ]
        );
        assert!(parse_miyoushe_list(&json!({}), 37, 39).is_empty());
    }

    #[test]
    fn test_parse_hoyolab_list() {
        let body = json!({"data": {"grid_item_list": [
            {"title": "胡桃", "id": "555"},
            {"title": "broken"}
        ]}});
        assert_eq!(
            parse_hoyolab_list(&body),
            vec![StrategyEntry { name: "胡桃".to_string(), id: 555 }]
        );
    }
}
