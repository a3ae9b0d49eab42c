use crate::responses::StandardResponse;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// 网关统一错误类型
#[derive(Debug, Error)]
pub enum ApiError {
    /// 重定向规则不存在
    #[error("Redirect rule not found: {rule}")]
    RuleNotFound { rule: String },

    /// 项目不存在
    #[error("Project not found: {project}")]
    ProjectNotFound { project: String },

    /// 尚未缓存任何补丁数据
    #[error("No patch data cached for '{project}'")]
    PatchNotCached { project: String },

    /// 尚未缓存当前版本号
    #[error("No version cached for '{project}'")]
    VersionNotCached { project: String },

    /// 通用资源不存在
    #[error("Not found: {what}")]
    NotFound { what: String },

    /// 客户端版本过旧
    #[error("Client is outdated.")]
    ClientOutdated { user_agent: String },

    /// 鉴权失败
    #[error("API token is invalid.")]
    PermissionDenied,

    /// 无效输入
    #[error("Invalid input: {field} - {reason}")]
    InvalidInput { field: String, reason: String },

    /// 上游接口返回了无法使用的数据
    #[error("Upstream '{source_name}' failed: {reason}")]
    Upstream { source_name: String, reason: String },

    /// 网络请求错误
    #[error("Network request failed: {reason}")]
    NetworkError { reason: String },

    /// 存储后端错误
    #[error("Store operation failed: {operation} - {reason}")]
    StoreError { operation: String, reason: String },

    /// 序列化/反序列化错误
    #[error("Serialization error: {reason}")]
    SerializationError { reason: String },

    /// 配置错误
    #[error("Configuration error: {reason}")]
    ConfigError { reason: String },

    /// 邮件发送错误
    #[error("Failed to send email: {reason}")]
    MailError { reason: String },

    /// IO 错误
    #[error("IO operation failed: {operation} - {reason}")]
    IoError { operation: String, reason: String },

    /// 内部错误
    #[error("Internal server error: {reason}")]
    InternalError { reason: String },
}

/// 便捷的结果类型别名
pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn rule_not_found<S: Into<String>>(rule: S) -> Self {
        Self::RuleNotFound { rule: rule.into() }
    }

    pub fn project_not_found<S: Into<String>>(project: S) -> Self {
        Self::ProjectNotFound {
            project: project.into(),
        }
    }

    pub fn patch_not_cached<S: Into<String>>(project: S) -> Self {
        Self::PatchNotCached {
            project: project.into(),
        }
    }

    pub fn version_not_cached<S: Into<String>>(project: S) -> Self {
        Self::VersionNotCached {
            project: project.into(),
        }
    }

    pub fn not_found<S: Into<String>>(what: S) -> Self {
        Self::NotFound { what: what.into() }
    }

    pub fn client_outdated<S: Into<String>>(user_agent: S) -> Self {
        Self::ClientOutdated {
            user_agent: user_agent.into(),
        }
    }

    pub fn invalid_input<S1: Into<String>, S2: Into<String>>(field: S1, reason: S2) -> Self {
        Self::InvalidInput {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn upstream<S1: Into<String>, S2: Into<String>>(source_name: S1, reason: S2) -> Self {
        Self::Upstream {
            source_name: source_name.into(),
            reason: reason.into(),
        }
    }

    pub fn network_error<S: Into<String>>(reason: S) -> Self {
        Self::NetworkError {
            reason: reason.into(),
        }
    }

    /// 存储后端统一返回 String 错误，这里补上操作名
    pub fn store_error<S1: Into<String>, S2: Into<String>>(operation: S1, reason: S2) -> Self {
        Self::StoreError {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    pub fn config_error<S: Into<String>>(reason: S) -> Self {
        Self::ConfigError {
            reason: reason.into(),
        }
    }

    pub fn mail_error<S: Into<String>>(reason: S) -> Self {
        Self::MailError {
            reason: reason.into(),
        }
    }

    pub fn io_error<S1: Into<String>, S2: Into<String>>(operation: S1, reason: S2) -> Self {
        Self::IoError {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    pub fn internal_error<S: Into<String>>(reason: S) -> Self {
        Self::InternalError {
            reason: reason.into(),
        }
    }

    /// 获取错误的 HTTP 状态码
    pub fn http_status_code(&self) -> u16 {
        match self {
            Self::RuleNotFound { .. }
            | Self::ProjectNotFound { .. }
            | Self::PatchNotCached { .. }
            | Self::VersionNotCached { .. }
            | Self::NotFound { .. } => 404,

            Self::ClientOutdated { .. } => 418,

            Self::PermissionDenied => 403,

            Self::InvalidInput { .. } => 400,

            Self::Upstream { .. } | Self::NetworkError { .. } => 502,

            Self::StoreError { .. }
            | Self::SerializationError { .. }
            | Self::ConfigError { .. }
            | Self::MailError { .. }
            | Self::IoError { .. }
            | Self::InternalError { .. } => 500,
        }
    }

    /// 检查错误是否为可重试类型
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::NetworkError { .. } | Self::Upstream { .. } | Self::StoreError { .. }
        )
    }

    /// 获取错误类别（用于日志与指标）
    pub fn category(&self) -> &'static str {
        match self {
            Self::RuleNotFound { .. } => "redirect",
            Self::ProjectNotFound { .. }
            | Self::PatchNotCached { .. }
            | Self::VersionNotCached { .. } => "patch",
            Self::NotFound { .. } => "resource",
            Self::ClientOutdated { .. } => "client",
            Self::PermissionDenied => "permission",
            Self::InvalidInput { .. } => "input",
            Self::Upstream { .. } => "upstream",
            Self::NetworkError { .. } => "network",
            Self::StoreError { .. } => "store",
            Self::SerializationError { .. } => "serialization",
            Self::ConfigError { .. } => "config",
            Self::MailError { .. } => "mail",
            Self::IoError { .. } => "io",
            Self::InternalError { .. } => "internal",
        }
    }
}

impl From<std::io::Error> for ApiError {
    fn from(err: std::io::Error) -> Self {
        Self::IoError {
            operation: "file_operation".to_string(),
            reason: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError {
            reason: err.to_string(),
        }
    }
}

impl From<serde_yaml::Error> for ApiError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::SerializationError {
            reason: err.to_string(),
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        Self::NetworkError {
            reason: err.to_string(),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::InternalError {
            reason: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status_code = StatusCode::from_u16(self.http_status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = StandardResponse::error(status_code.as_u16() as i32, self.to_string());
        (status_code, Json(body)).into_response()
    }
}
