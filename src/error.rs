//! 统一错误处理
//!
//! 提供 `ProvisionError` 枚举，所有组件通过 `ProvisionResult` 向上返回，
//! 只有 `main` 负责终止进程

use std::path::PathBuf;
use thiserror::Error;

/// 统一的 provisioning 错误类型
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// 模板校验失败（在任何变更操作之前）
    #[error("Template validation failed for {unit}: {message}")]
    Validation { unit: String, message: String },

    /// 服务端拒绝请求（权限、参数错误、命名冲突），消息原样透传
    #[error("{operation} rejected: {message}")]
    Rejected { operation: String, message: String },

    /// 轮询次数耗尽仍未完成
    #[error("Timed out waiting for {unit} after {attempts} attempts")]
    Timeout { unit: String, attempts: u32 },

    /// Stack 进入失败状态，或不处于完成状态
    #[error("Stack {unit} ended in status {status}{}", .reason.as_deref().map(|r| format!(" ({r})")).unwrap_or_default())]
    StackFailed {
        unit: String,
        status: String,
        reason: Option<String>,
    },

    /// 调用成功但缺少下游必须的字段
    #[error("Missing required field '{field}' in {source_name}")]
    MissingField { source_name: String, field: String },

    /// 服务端响应无法解析
    #[error("Unable to decode {operation} response: {message}")]
    Decode { operation: String, message: String },

    /// 配置错误
    #[error("Configuration error: {0}")]
    Config(String),

    /// 文件读取失败
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// 网络错误
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl ProvisionError {
    /// 创建校验失败错误
    pub fn validation(unit: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            unit: unit.into(),
            message: message.into(),
        }
    }

    /// 创建服务端拒绝错误
    pub fn rejected(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Rejected {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// 创建缺失字段错误
    pub fn missing_field(source_name: impl Into<String>, field: impl Into<String>) -> Self {
        Self::MissingField {
            source_name: source_name.into(),
            field: field.into(),
        }
    }

    /// 创建解码错误
    pub fn decode(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// 创建配置错误
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// 错误分类，用于日志字段
    pub fn kind(&self) -> &'static str {
        match self {
            ProvisionError::Validation { .. } => "validation",
            ProvisionError::Rejected { .. } | ProvisionError::Http(_) => "rejected",
            ProvisionError::Timeout { .. } => "timeout",
            ProvisionError::StackFailed { .. } => "stack_failed",
            ProvisionError::MissingField { .. } | ProvisionError::Decode { .. } => {
                "missing_field"
            }
            ProvisionError::Config(_) | ProvisionError::Io { .. } => "config",
        }
    }
}

/// 便捷类型别名
pub type ProvisionResult<T> = Result<T, ProvisionError>;
