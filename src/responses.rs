use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

/// 所有 JSON 接口共用的响应外壳，客户端依赖 `retcode` 判断结果
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StandardResponse {
    pub retcode: i32,
    pub message: String,
    #[schema(value_type = Object)]
    pub data: Value,
}

impl StandardResponse {
    pub fn ok<T: Serialize>(data: T) -> Self {
        Self::with_message("ok", data)
    }

    pub fn with_message<M: Into<String>, T: Serialize>(message: M, data: T) -> Self {
        Self {
            retcode: 0,
            message: message.into(),
            data: serde_json::to_value(data).unwrap_or(Value::Null),
        }
    }

    pub fn with_retcode<M: Into<String>, T: Serialize>(retcode: i32, message: M, data: T) -> Self {
        Self {
            retcode,
            message: message.into(),
            data: serde_json::to_value(data).unwrap_or(Value::Null),
        }
    }

    pub fn error<M: Into<String>>(retcode: i32, message: M) -> Self {
        Self {
            retcode,
            message: message.into(),
            data: Value::Null,
        }
    }
}

impl Default for StandardResponse {
    fn default() -> Self {
        Self::ok(Value::Null)
    }
}

#[derive(Serialize, ToSchema)]
pub struct IpResponse {
    pub ip: String,
    pub division: String,
}

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub store_status: String,
    pub debug: bool,
    pub last_check: String,
}

#[derive(Deserialize, ToSchema)]
pub struct RedirectRuleUpdateRequest {
    pub rule_name: String,
    pub rule_template: String,
}

#[derive(Deserialize, ToSchema)]
pub struct MirrorCreateRequest {
    pub key: String,
    pub url: String,
    pub mirror_name: String,
    pub mirror_type: crate::models::MirrorType,
}

#[derive(Deserialize, ToSchema)]
pub struct MirrorDeleteRequest {
    pub project_name: String,
    pub mirror_name: String,
}

#[derive(Deserialize, ToSchema)]
pub struct EmailRequest {
    pub subject: String,
    pub content: String,
    pub recipient: String,
}

#[derive(Deserialize, ToSchema)]
pub struct WallpaperUrlRequest {
    #[serde(default)]
    pub url: String,
}
