//! Stack 相关领域模型

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// 模板参数覆盖（与 CloudFormation 参数文件格式一致）
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct Parameter {
    pub parameter_key: String,
    pub parameter_value: String,
}

impl Parameter {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            parameter_key: key.into(),
            parameter_value: value.into(),
        }
    }
}

/// 部署单元种类
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitKind {
    /// 子网 + 安全组
    Network,
    /// 跨账号 IAM 角色
    Identity,
    /// DBFS 根 bucket
    Storage,
    /// 客户托管 KMS key
    Key,
}

impl UnitKind {
    /// 按部署顺序排列
    pub const ALL: [UnitKind; 4] = [
        UnitKind::Network,
        UnitKind::Identity,
        UnitKind::Storage,
        UnitKind::Key,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            UnitKind::Network => "network",
            UnitKind::Identity => "identity",
            UnitKind::Storage => "storage",
            UnitKind::Key => "key",
        }
    }

    /// 是否创建 IAM 资源（需要 CAPABILITY_NAMED_IAM）
    pub fn requires_elevated_capability(&self) -> bool {
        matches!(self, UnitKind::Identity)
    }
}

/// 部署单元：名称唯一，提交后不可变
#[derive(Clone, Debug)]
pub struct DeploymentUnit {
    pub kind: UnitKind,
    pub name: String,
    pub template_body: String,
    pub parameters: Vec<Parameter>,
}

impl DeploymentUnit {
    pub fn new(kind: UnitKind, name: impl Into<String>, template_body: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            template_body: template_body.into(),
            parameters: Vec::new(),
        }
    }

    pub fn with_parameters(mut self, parameters: Vec<Parameter>) -> Self {
        self.parameters = parameters;
        self
    }

    /// 在参数文件内容之后追加参数（保持顺序）
    pub fn append_parameters(&mut self, extra: impl IntoIterator<Item = Parameter>) {
        self.parameters.extend(extra);
    }
}

/// Stack 状态
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StackStatus {
    Pending,
    Complete,
    Failed,
    Deleted,
}

impl StackStatus {
    /// 解析服务端状态字符串（如 `CREATE_IN_PROGRESS`）
    pub fn from_provider(raw: &str) -> Self {
        match raw {
            "CREATE_COMPLETE" | "UPDATE_COMPLETE" | "IMPORT_COMPLETE" => StackStatus::Complete,
            "DELETE_COMPLETE" => StackStatus::Deleted,
            s if s.contains("ROLLBACK") || s.ends_with("_FAILED") => StackStatus::Failed,
            s if s.ends_with("_IN_PROGRESS") => StackStatus::Pending,
            _ => StackStatus::Failed,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StackStatus::Pending => "pending",
            StackStatus::Complete => "complete",
            StackStatus::Failed => "failed",
            StackStatus::Deleted => "deleted",
        }
    }

    /// 是否为终态
    pub fn is_terminal(&self) -> bool {
        !matches!(self, StackStatus::Pending)
    }
}

/// 等待 stack 创建完成的轮询策略
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WaitPolicy {
    /// 两次轮询之间的间隔
    pub delay: Duration,
    /// 最大轮询次数，超过即超时
    pub max_attempts: u32,
}

impl WaitPolicy {
    pub fn new(delay: Duration, max_attempts: u32) -> Self {
        Self {
            delay,
            max_attempts,
        }
    }
}

/// list-stacks 返回的摘要
#[derive(Clone, Debug)]
pub struct StackSummary {
    pub name: String,
    pub raw_status: String,
}

impl StackSummary {
    pub fn status(&self) -> StackStatus {
        StackStatus::from_provider(&self.raw_status)
    }
}

/// 轮询得到的状态快照
#[derive(Clone, Debug)]
pub struct StatusSnapshot {
    pub raw_status: String,
    pub reason: Option<String>,
}

impl StatusSnapshot {
    pub fn status(&self) -> StackStatus {
        StackStatus::from_provider(&self.raw_status)
    }
}

/// Stack 完整描述：状态 + 输出映射
#[derive(Clone, Debug, Serialize)]
pub struct DeploymentResult {
    pub stack_id: String,
    pub name: String,
    pub status: StackStatus,
    pub raw_status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_reason: Option<String>,
    pub outputs: HashMap<String, String>,
}

impl DeploymentResult {
    pub fn is_complete(&self) -> bool {
        self.status == StackStatus::Complete
    }
}
