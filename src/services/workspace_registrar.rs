//! Workspace 注册
//!
//! 通过账号 API 创建四个前置对象（credentials、storage config、network、
//! customer managed key）与 workspace 本身，然后轮询 workspace 状态。
//! 响应中缺少 id 视为致命错误；服务端错误不重试，原样上抛。

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::ProvisionConfig;
use crate::domain::workspace::{
    AwsCredentials, AwsKeyInfo, Credentials, CredentialsRequest, ManagedKeyRequest, NetworkRequest,
    ObjectKind, RegisteredObject, RootBucketInfo, StorageConfigRequest, StsRole, WorkspaceRequest,
    WorkspaceSpec, WorkspaceStatus,
};
use crate::error::{ProvisionError, ProvisionResult};
use crate::infra::AccountsService;

use super::context::ProvisionContext;

/// Workspace 注册器
pub struct WorkspaceRegistrar {
    config: Arc<ProvisionConfig>,
    api: Arc<dyn AccountsService>,
    ctx: Arc<ProvisionContext>,
}

impl WorkspaceRegistrar {
    pub fn new(
        config: Arc<ProvisionConfig>,
        api: Arc<dyn AccountsService>,
        ctx: Arc<ProvisionContext>,
    ) -> Self {
        Self { config, api, ctx }
    }

    /// 创建 credentials 对象
    pub async fn create_credentials(&self, role_arn: &str) -> ProvisionResult<Credentials> {
        self.ctx
            .log_stdout("Creating the Databricks workspace credentials")
            .await;
        let request = CredentialsRequest {
            credentials_name: self.config.credentials_name.clone(),
            aws_credentials: AwsCredentials {
                sts_role: StsRole {
                    role_arn: Some(role_arn.to_string()),
                    external_id: None,
                },
            },
        };

        let response = self
            .api
            .create_credentials(&self.config.account_id, &request)
            .await?;
        let external_id = response.external_id().map(str::to_string);
        let id = require_id(ObjectKind::Credentials, response.credentials_id)?;

        if let Some(ref external_id) = external_id {
            debug!(credentials_id = %id, external_id = %external_id, "Credentials carry external id");
        }
        self.announce(ObjectKind::Credentials, &id).await;
        Ok(Credentials { id, external_id })
    }

    /// 创建 storage configuration 对象
    pub async fn create_storage_config(&self, bucket_name: &str) -> ProvisionResult<RegisteredObject> {
        self.ctx
            .log_stdout("Creating the Databricks workspace storage config")
            .await;
        let request = StorageConfigRequest {
            storage_configuration_name: self.config.storage_config_name.clone(),
            root_bucket_info: RootBucketInfo {
                bucket_name: bucket_name.to_string(),
            },
        };

        let response = self
            .api
            .create_storage_config(&self.config.account_id, &request)
            .await?;
        self.registered(ObjectKind::StorageConfig, response.storage_configuration_id)
            .await
    }

    /// 创建 network 对象
    pub async fn create_network(
        &self,
        vpc_id: &str,
        subnet_ids: [&str; 2],
        security_group_id: &str,
    ) -> ProvisionResult<RegisteredObject> {
        self.ctx
            .log_stdout("Creating the Databricks workspace network")
            .await;
        let request = NetworkRequest {
            network_name: self.config.network_name.clone(),
            vpc_id: vpc_id.to_string(),
            subnet_ids: subnet_ids.iter().map(|s| s.to_string()).collect(),
            security_group_ids: vec![security_group_id.to_string()],
        };

        let response = self
            .api
            .create_network(&self.config.account_id, &request)
            .await?;
        self.registered(ObjectKind::Network, response.network_id)
            .await
    }

    /// 创建 customer managed key 对象
    pub async fn create_managed_key(
        &self,
        key_arn: &str,
        key_alias: &str,
        region: &str,
    ) -> ProvisionResult<RegisteredObject> {
        self.ctx
            .log_stdout("Creating the Databricks workspace customer managed key")
            .await;
        let request = ManagedKeyRequest {
            aws_key_info: AwsKeyInfo {
                key_arn: key_arn.to_string(),
                key_alias: key_alias.to_string(),
                key_region: region.to_string(),
            },
        };

        let response = self
            .api
            .create_customer_managed_key(&self.config.account_id, &request)
            .await?;
        self.registered(ObjectKind::ManagedKey, response.customer_managed_key_id)
            .await
    }

    /// 创建 workspace，返回 workspace id
    pub async fn create_workspace(&self, spec: &WorkspaceSpec) -> ProvisionResult<String> {
        self.ctx.log_stdout("Creating the Databricks workspace").await;
        let request = WorkspaceRequest::from(spec);

        let response = self
            .api
            .create_workspace(&self.config.account_id, &request)
            .await?;
        let id = require_id(ObjectKind::Workspace, response.workspace_id)?;
        self.announce(ObjectKind::Workspace, &id).await;
        Ok(id)
    }

    /// 单次查询 workspace 状态
    pub async fn workspace_status(&self, workspace_id: &str) -> ProvisionResult<WorkspaceStatus> {
        let response = self
            .api
            .get_workspace(&self.config.account_id, workspace_id)
            .await?;
        let raw = response
            .workspace_status
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ProvisionError::missing_field("GetWorkspace response", "workspace_status"))?;
        if let Some(message) = response.workspace_status_message {
            debug!(workspace_id = %workspace_id, message = %message, "Workspace status message");
        }
        Ok(WorkspaceStatus::from_provider(&raw))
    }

    /// 轮询直到状态不再是 PROVISIONING
    ///
    /// 默认不限次数；配置了 `workspace_max_attempts` 时超过即超时
    pub async fn poll_workspace(&self, workspace_id: &str) -> ProvisionResult<WorkspaceStatus> {
        let delay = self.config.polling.workspace_delay();
        let max_attempts = self.config.polling.workspace_max_attempts;
        let mut attempt: u32 = 0;

        loop {
            if let Some(max) = max_attempts {
                if attempt >= max {
                    warn!(workspace_id = %workspace_id, attempts = max, "Workspace still provisioning");
                    return Err(ProvisionError::Timeout {
                        unit: format!("workspace {}", workspace_id),
                        attempts: max,
                    });
                }
            }
            attempt += 1;

            tokio::time::sleep(delay).await;
            let status = self.workspace_status(workspace_id).await?;
            debug!(workspace_id = %workspace_id, attempt, status = %status, "Polled workspace status");

            if status.is_terminal() {
                info!(workspace_id = %workspace_id, attempts = attempt, status = %status, "Workspace reached terminal status");
                return Ok(status);
            }
        }
    }

    async fn registered(
        &self,
        kind: ObjectKind,
        id: Option<String>,
    ) -> ProvisionResult<RegisteredObject> {
        let id = require_id(kind, id)?;
        self.announce(kind, &id).await;
        Ok(RegisteredObject { kind, id })
    }

    async fn announce(&self, kind: ObjectKind, id: &str) {
        info!(object = kind.as_str(), id = %id, "Registered object");
        self.ctx
            .log_stdout(&format!("{} id is {}", capitalize(kind.as_str()), id))
            .await;
    }
}

fn require_id(kind: ObjectKind, id: Option<String>) -> ProvisionResult<String> {
    id.filter(|id| !id.is_empty()).ok_or_else(|| {
        ProvisionError::missing_field(format!("create {} response", kind.as_str()), "id")
    })
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::provision::tests::sample_config;
    use crate::services::fakes::FakeAccountsService;

    fn registrar(api: &Arc<FakeAccountsService>) -> WorkspaceRegistrar {
        WorkspaceRegistrar::new(
            Arc::new(sample_config()),
            api.clone(),
            Arc::new(ProvisionContext::quiet()),
        )
    }

    #[tokio::test]
    async fn test_create_credentials_request_and_external_id() {
        let api = Arc::new(FakeAccountsService::new());
        let creds = registrar(&api)
            .create_credentials("arn:aws:iam::1:role/x")
            .await
            .unwrap();

        assert_eq!(creds.id, "cred-0001");
        assert_eq!(creds.external_id.as_deref(), Some("ext-0001"));
        let body = api.last_request("create_credentials").unwrap();
        assert_eq!(body["credentials_name"], "ws-creds");
        assert_eq!(body["aws_credentials"]["sts_role"]["role_arn"], "arn:aws:iam::1:role/x");
    }

    #[tokio::test]
    async fn test_create_network_request() {
        let api = Arc::new(FakeAccountsService::new());
        let network = registrar(&api)
            .create_network("vpc-0123", ["subnet-1", "subnet-2"], "sg-1")
            .await
            .unwrap();

        assert_eq!(network.kind, ObjectKind::Network);
        assert_eq!(network.id, "net-0001");
        let body = api.last_request("create_network").unwrap();
        assert_eq!(body["subnet_ids"], serde_json::json!(["subnet-1", "subnet-2"]));
        assert_eq!(body["security_group_ids"], serde_json::json!(["sg-1"]));
    }

    #[tokio::test]
    async fn test_create_managed_key_request() {
        let api = Arc::new(FakeAccountsService::new());
        registrar(&api)
            .create_managed_key("arn:aws:kms:us-west-2:1:key/abcd", "my-key", "us-west-2")
            .await
            .unwrap();

        let body = api.last_request("create_customer_managed_key").unwrap();
        assert_eq!(body["aws_key_info"]["key_alias"], "my-key");
        assert_eq!(body["aws_key_info"]["key_region"], "us-west-2");
    }

    #[tokio::test]
    async fn test_missing_id_is_fatal() {
        let api = Arc::new(FakeAccountsService::new());
        api.omit_id("create_storage_config");

        let err = registrar(&api)
            .create_storage_config("bucket")
            .await
            .unwrap_err();
        assert!(matches!(err, ProvisionError::MissingField { .. }));
        assert!(err.to_string().contains("storage configuration"));
    }

    #[tokio::test]
    async fn test_provider_error_is_propagated() {
        let api = Arc::new(FakeAccountsService::new());
        api.reject("create_network", "INVALID_PARAMETER_VALUE: subnet not found");

        let err = registrar(&api)
            .create_network("vpc", ["a", "b"], "sg")
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "create_network rejected: INVALID_PARAMETER_VALUE: subnet not found"
        );
        assert_eq!(api.calls_to("create_network"), 1);
    }

    #[tokio::test]
    async fn test_poll_until_terminal() {
        let api = Arc::new(
            FakeAccountsService::new()
                .with_workspace_statuses(&["PROVISIONING", "PROVISIONING", "RUNNING"]),
        );
        let status = registrar(&api).poll_workspace("42").await.unwrap();

        assert_eq!(status, WorkspaceStatus::Running);
        assert_eq!(api.calls_to("get_workspace"), 3);
    }

    #[tokio::test]
    async fn test_poll_returns_failure_status() {
        let api = Arc::new(FakeAccountsService::new().with_workspace_statuses(&["PROVISIONING", "FAILED"]));
        let status = registrar(&api).poll_workspace("42").await.unwrap();
        assert_eq!(status, WorkspaceStatus::Failed);
    }

    #[tokio::test]
    async fn test_bounded_poll_times_out() {
        let api = Arc::new(FakeAccountsService::new().with_workspace_statuses(&["PROVISIONING"]));
        let mut config = sample_config();
        config.polling.workspace_max_attempts = Some(4);
        let registrar = WorkspaceRegistrar::new(
            Arc::new(config),
            api.clone(),
            Arc::new(ProvisionContext::quiet()),
        );

        let err = registrar.poll_workspace("42").await.unwrap_err();
        assert!(matches!(err, ProvisionError::Timeout { attempts: 4, .. }));
        assert_eq!(api.calls_to("get_workspace"), 4);
    }

    #[tokio::test]
    async fn test_missing_workspace_status_is_fatal() {
        let api = Arc::new(FakeAccountsService::new());
        let err = registrar(&api).workspace_status("42").await.unwrap_err();
        assert!(matches!(err, ProvisionError::MissingField { ref field, .. } if field == "workspace_status"));
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("storage configuration"), "Storage configuration");
        assert_eq!(capitalize(""), "");
    }
}
