//! Workspace 与账号 API 对象模型
//!
//! 请求体与账号 API 的 JSON 格式一致；响应中的 id 字段都是可选的，
//! 由 registrar 在边界处校验

use serde::{Deserialize, Deserializer, Serialize};

/// 已注册对象种类
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObjectKind {
    Credentials,
    StorageConfig,
    Network,
    ManagedKey,
    Workspace,
}

impl ObjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectKind::Credentials => "credentials",
            ObjectKind::StorageConfig => "storage configuration",
            ObjectKind::Network => "network",
            ObjectKind::ManagedKey => "customer managed key",
            ObjectKind::Workspace => "workspace",
        }
    }
}

/// 控制面分配的对象
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegisteredObject {
    pub kind: ObjectKind,
    pub id: String,
}

/// Workspace 状态
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WorkspaceStatus {
    Provisioning,
    Running,
    Failed,
    Other(String),
}

impl WorkspaceStatus {
    pub fn from_provider(raw: &str) -> Self {
        match raw {
            "PROVISIONING" => WorkspaceStatus::Provisioning,
            "RUNNING" => WorkspaceStatus::Running,
            "FAILED" => WorkspaceStatus::Failed,
            other => WorkspaceStatus::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            WorkspaceStatus::Provisioning => "PROVISIONING",
            WorkspaceStatus::Running => "RUNNING",
            WorkspaceStatus::Failed => "FAILED",
            WorkspaceStatus::Other(s) => s,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, WorkspaceStatus::Provisioning)
    }
}

impl std::fmt::Display for WorkspaceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 创建 workspace 所需的全部引用
#[derive(Clone, Debug)]
pub struct WorkspaceSpec {
    pub name: String,
    pub deployment_name: String,
    pub region: String,
    pub credentials_id: String,
    pub network_id: String,
    pub storage_config_id: String,
    pub managed_key_id: String,
    pub no_public_ip: bool,
}

/// Workspace 访问地址
pub fn workspace_url(deployment_name: &str) -> String {
    use crate::config::env::constants::{WORKSPACE_DOMAIN_SUFFIX, WORKSPACE_URL_SCHEME};
    format!(
        "{}://{}{}",
        WORKSPACE_URL_SCHEME, deployment_name, WORKSPACE_DOMAIN_SUFFIX
    )
}

// ---- 请求体 ----

#[derive(Debug, Serialize)]
pub struct CredentialsRequest {
    pub credentials_name: String,
    pub aws_credentials: AwsCredentials,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AwsCredentials {
    pub sts_role: StsRole,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StsRole {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role_arn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StorageConfigRequest {
    pub storage_configuration_name: String,
    pub root_bucket_info: RootBucketInfo,
}

#[derive(Debug, Serialize)]
pub struct RootBucketInfo {
    pub bucket_name: String,
}

#[derive(Debug, Serialize)]
pub struct NetworkRequest {
    pub network_name: String,
    pub vpc_id: String,
    pub subnet_ids: Vec<String>,
    pub security_group_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ManagedKeyRequest {
    pub aws_key_info: AwsKeyInfo,
}

#[derive(Debug, Serialize)]
pub struct AwsKeyInfo {
    pub key_arn: String,
    pub key_alias: String,
    pub key_region: String,
}

#[derive(Debug, Serialize)]
pub struct WorkspaceRequest {
    pub workspace_name: String,
    pub deployment_name: String,
    pub aws_region: String,
    pub credentials_id: String,
    pub network_id: String,
    pub storage_configuration_id: String,
    pub customer_managed_key_id: String,
    pub is_no_public_ip_enabled: bool,
}

impl From<&WorkspaceSpec> for WorkspaceRequest {
    fn from(spec: &WorkspaceSpec) -> Self {
        Self {
            workspace_name: spec.name.clone(),
            deployment_name: spec.deployment_name.clone(),
            aws_region: spec.region.clone(),
            credentials_id: spec.credentials_id.clone(),
            network_id: spec.network_id.clone(),
            storage_configuration_id: spec.storage_config_id.clone(),
            customer_managed_key_id: spec.managed_key_id.clone(),
            is_no_public_ip_enabled: spec.no_public_ip,
        }
    }
}

// ---- 响应体 ----

#[derive(Debug, Default, Deserialize)]
pub struct CredentialsResponse {
    #[serde(default, deserialize_with = "opt_id")]
    pub credentials_id: Option<String>,
    #[serde(default)]
    pub aws_credentials: Option<AwsCredentials>,
}

impl CredentialsResponse {
    pub fn external_id(&self) -> Option<&str> {
        self.aws_credentials
            .as_ref()
            .and_then(|c| c.sts_role.external_id.as_deref())
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct StorageConfigResponse {
    #[serde(default, deserialize_with = "opt_id")]
    pub storage_configuration_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct NetworkResponse {
    #[serde(default, deserialize_with = "opt_id")]
    pub network_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ManagedKeyResponse {
    #[serde(default, deserialize_with = "opt_id")]
    pub customer_managed_key_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct WorkspaceResponse {
    #[serde(default, deserialize_with = "opt_id")]
    pub workspace_id: Option<String>,
    #[serde(default)]
    pub workspace_status: Option<String>,
    #[serde(default)]
    pub workspace_status_message: Option<String>,
}

/// 创建凭证的结果
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Credentials {
    pub id: String,
    pub external_id: Option<String>,
}

/// id 可能是字符串也可能是数字
fn opt_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) if !s.is_empty() => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}
