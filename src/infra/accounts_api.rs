//! Databricks 账号 API 客户端
//!
//! 封装与账号控制面的所有 HTTP 交互，复用连接池。
//! 所有接口都以账号 id 为作用域：`{host}/api/2.0/accounts/{account_id}/...`

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::env::constants::HTTP_TIMEOUT_SECS;
use crate::config::AccountCredentials;
use crate::domain::workspace::{
    CredentialsRequest, CredentialsResponse, ManagedKeyRequest, ManagedKeyResponse, NetworkRequest,
    NetworkResponse, StorageConfigRequest, StorageConfigResponse, WorkspaceRequest,
    WorkspaceResponse,
};
use crate::error::{ProvisionError, ProvisionResult};

/// 账号 API 接口
#[async_trait]
pub trait AccountsService: Send + Sync {
    async fn create_credentials(
        &self,
        account_id: &str,
        request: &CredentialsRequest,
    ) -> ProvisionResult<CredentialsResponse>;

    async fn create_storage_config(
        &self,
        account_id: &str,
        request: &StorageConfigRequest,
    ) -> ProvisionResult<StorageConfigResponse>;

    async fn create_network(
        &self,
        account_id: &str,
        request: &NetworkRequest,
    ) -> ProvisionResult<NetworkResponse>;

    async fn create_customer_managed_key(
        &self,
        account_id: &str,
        request: &ManagedKeyRequest,
    ) -> ProvisionResult<ManagedKeyResponse>;

    async fn create_workspace(
        &self,
        account_id: &str,
        request: &WorkspaceRequest,
    ) -> ProvisionResult<WorkspaceResponse>;

    async fn get_workspace(
        &self,
        account_id: &str,
        workspace_id: &str,
    ) -> ProvisionResult<WorkspaceResponse>;
}

/// 基于 reqwest 的账号 API 客户端
#[derive(Clone)]
pub struct AccountsApiClient {
    client: Client,
    host: String,
    credentials: AccountCredentials,
}

impl AccountsApiClient {
    /// 创建新的账号 API 客户端
    ///
    /// # Arguments
    /// * `host` - 账号 API 地址（如 `https://accounts.cloud.databricks.com`）
    /// * `credentials` - 基本认证凭证
    pub fn new(host: &str, credentials: AccountCredentials) -> ProvisionResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .pool_max_idle_per_host(5)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()?;

        Ok(Self {
            client,
            host: host.trim_end_matches('/').to_string(),
            credentials,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    fn url(&self, account_id: &str, path: &str) -> String {
        format!("{}/api/2.0/accounts/{}/{}", self.host, account_id, path)
    }

    async fn post<B, T>(&self, operation: &str, url: String, body: &B) -> ProvisionResult<T>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let request = self.client.post(&url).json(body);
        self.send(operation, request).await
    }

    async fn send<T: DeserializeOwned>(
        &self,
        operation: &str,
        request: RequestBuilder,
    ) -> ProvisionResult<T> {
        let response = request
            .basic_auth(&self.credentials.user, Some(self.credentials.password.expose()))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = error_message(&body).unwrap_or_else(|| format!("HTTP {}: {}", status, body));
            warn!(operation = %operation, status = %status, "Account API rejected request");
            return Err(ProvisionError::rejected(operation, message));
        }

        debug!(operation = %operation, status = %status, "Account API call succeeded");
        serde_json::from_str(&body).map_err(|e| ProvisionError::decode(operation, e.to_string()))
    }
}

#[async_trait]
impl AccountsService for AccountsApiClient {
    async fn create_credentials(
        &self,
        account_id: &str,
        request: &CredentialsRequest,
    ) -> ProvisionResult<CredentialsResponse> {
        self.post("CreateCredentials", self.url(account_id, "credentials"), request)
            .await
    }

    async fn create_storage_config(
        &self,
        account_id: &str,
        request: &StorageConfigRequest,
    ) -> ProvisionResult<StorageConfigResponse> {
        self.post(
            "CreateStorageConfiguration",
            self.url(account_id, "storage-configurations"),
            request,
        )
        .await
    }

    async fn create_network(
        &self,
        account_id: &str,
        request: &NetworkRequest,
    ) -> ProvisionResult<NetworkResponse> {
        self.post("CreateNetwork", self.url(account_id, "networks"), request)
            .await
    }

    async fn create_customer_managed_key(
        &self,
        account_id: &str,
        request: &ManagedKeyRequest,
    ) -> ProvisionResult<ManagedKeyResponse> {
        self.post(
            "CreateCustomerManagedKey",
            self.url(account_id, "customer-managed-keys"),
            request,
        )
        .await
    }

    async fn create_workspace(
        &self,
        account_id: &str,
        request: &WorkspaceRequest,
    ) -> ProvisionResult<WorkspaceResponse> {
        self.post("CreateWorkspace", self.url(account_id, "workspaces"), request)
            .await
    }

    async fn get_workspace(
        &self,
        account_id: &str,
        workspace_id: &str,
    ) -> ProvisionResult<WorkspaceResponse> {
        let url = self.url(account_id, &format!("workspaces/{}", workspace_id));
        self.send("GetWorkspace", self.client.get(&url)).await
    }
}

/// 错误响应体
#[derive(Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// 提取服务端错误消息（原样）
fn error_message(body: &str) -> Option<String> {
    let parsed: ApiErrorBody = serde_json::from_str(body).ok()?;
    match (parsed.error_code, parsed.message) {
        (Some(code), Some(message)) => Some(format!("{}: {}", code, message)),
        (None, Some(message)) => Some(message),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Secret;

    fn client(host: &str) -> AccountsApiClient {
        AccountsApiClient::new(
            host,
            AccountCredentials {
                user: "admin@example.com".to_string(),
                password: Secret::new("pw"),
            },
        )
        .unwrap()
    }

    #[test]
    fn test_url_building() {
        let client = client("https://accounts.cloud.databricks.com/");
        assert_eq!(client.host(), "https://accounts.cloud.databricks.com");
        assert_eq!(
            client.url("acc-1", "workspaces/42"),
            "https://accounts.cloud.databricks.com/api/2.0/accounts/acc-1/workspaces/42"
        );
    }

    #[test]
    fn test_error_message_extraction() {
        assert_eq!(
            error_message(r#"{"error_code": "INVALID_PARAMETER_VALUE", "message": "Bucket not found"}"#),
            Some("INVALID_PARAMETER_VALUE: Bucket not found".to_string())
        );
        assert_eq!(
            error_message(r#"{"message": "Unauthorized"}"#),
            Some("Unauthorized".to_string())
        );
        assert_eq!(error_message("<html>502</html>"), None);
    }
}
