//! 运行级配置
//!
//! 从一个 JSON 文件加载（兼容 `common_params.json` 的字段名），
//! 账号 API 凭证可由环境变量覆盖。加载后不可变，以 `Arc` 共享给各组件。

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::env::{self, constants::*};
use crate::domain::stack::{UnitKind, WaitPolicy};
use crate::error::{ProvisionError, ProvisionResult};

/// 不会出现在 Debug 输出里的字符串
#[derive(Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("\"***\"")
    }
}

/// 账号 API 基本认证
#[derive(Clone, Debug)]
pub struct AccountCredentials {
    pub user: String,
    pub password: Secret,
}

/// 单个 stack 的模板与参数文件
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct TemplateFiles {
    pub template: PathBuf,
    pub parameters: PathBuf,
}

impl TemplateFiles {
    fn new(template: &str, parameters: &str) -> Self {
        Self {
            template: PathBuf::from(template),
            parameters: PathBuf::from(parameters),
        }
    }
}

/// 四个 stack 的文件位置
#[derive(Clone, Debug, Deserialize)]
pub struct TemplatePaths {
    #[serde(default = "default_network_files")]
    pub network: TemplateFiles,
    #[serde(default = "default_identity_files")]
    pub identity: TemplateFiles,
    #[serde(default = "default_storage_files")]
    pub storage: TemplateFiles,
    #[serde(default = "default_key_files")]
    pub key: TemplateFiles,
}

impl Default for TemplatePaths {
    fn default() -> Self {
        Self {
            network: default_network_files(),
            identity: default_identity_files(),
            storage: default_storage_files(),
            key: default_key_files(),
        }
    }
}

fn default_network_files() -> TemplateFiles {
    TemplateFiles::new(
        "cf_templates/e2-existingvpc-cf_template.json",
        "cf_template_params/e2-existingvpc-cf_params.json",
    )
}

fn default_identity_files() -> TemplateFiles {
    TemplateFiles::new(
        "cf_templates/e2-iam_role_with_restricted_and_sg_policy.json",
        "cf_template_params/e2-iam_role_with_restricted_and_sg_policy_params.json",
    )
}

fn default_storage_files() -> TemplateFiles {
    TemplateFiles::new(
        "cf_templates/e2-dbfs_root_s3_bucket-cf_template.json",
        "cf_template_params/e2-dbfs_root_s3_bucket-cf_params.json",
    )
}

fn default_key_files() -> TemplateFiles {
    TemplateFiles::new(
        "cf_templates/e2-byok_kms_key-cf_template.json",
        "cf_template_params/e2-byok_kms_key-cf_params.json",
    )
}

/// 轮询配置
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    pub stack_delay_secs: u64,
    pub network_max_attempts: u32,
    pub identity_max_attempts: u32,
    pub storage_max_attempts: u32,
    pub key_max_attempts: u32,
    pub workspace_delay_secs: u64,
    /// 为空时不限次数
    pub workspace_max_attempts: Option<u32>,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            stack_delay_secs: STACK_POLL_DELAY_SECS,
            network_max_attempts: NETWORK_STACK_MAX_ATTEMPTS,
            identity_max_attempts: IDENTITY_STACK_MAX_ATTEMPTS,
            storage_max_attempts: STORAGE_STACK_MAX_ATTEMPTS,
            key_max_attempts: KEY_STACK_MAX_ATTEMPTS,
            workspace_delay_secs: WORKSPACE_POLL_DELAY_SECS,
            workspace_max_attempts: None,
        }
    }
}

impl PollingConfig {
    pub fn stack_wait_policy(&self, kind: UnitKind) -> WaitPolicy {
        let max_attempts = match kind {
            UnitKind::Network => self.network_max_attempts,
            UnitKind::Identity => self.identity_max_attempts,
            UnitKind::Storage => self.storage_max_attempts,
            UnitKind::Key => self.key_max_attempts,
        };
        WaitPolicy::new(Duration::from_secs(self.stack_delay_secs), max_attempts)
    }

    pub fn workspace_delay(&self) -> Duration {
        Duration::from_secs(self.workspace_delay_secs)
    }
}

/// 运行级配置
#[derive(Clone, Debug, Deserialize)]
pub struct ProvisionConfig {
    #[serde(alias = "region_name")]
    pub region: String,
    pub vpc_id: String,
    #[serde(alias = "vpc_stack_name")]
    pub network_stack_name: String,
    #[serde(alias = "iam_stack_name")]
    pub identity_stack_name: String,
    #[serde(alias = "s3_stack_name")]
    pub storage_stack_name: String,
    #[serde(alias = "kms_stack_name")]
    pub key_stack_name: String,
    /// Databricks 自身的 AWS 账号
    pub databricks_aws_account_id: String,
    /// Databricks 账号（E2 account）id
    #[serde(alias = "databricks_workspace_account_id")]
    pub account_id: String,
    pub credentials_name: String,
    pub storage_config_name: String,
    pub network_name: String,
    pub workspace_name: String,
    #[serde(alias = "deployment_cname")]
    pub deployment_name: String,

    #[serde(default)]
    pub aws_profile: Option<String>,
    #[serde(default = "default_accounts_host")]
    pub accounts_host: String,
    #[serde(default = "default_true")]
    pub no_public_ip: bool,
    #[serde(default)]
    pub templates: TemplatePaths,
    #[serde(default)]
    pub polling: PollingConfig,

    #[serde(default, alias = "api_user")]
    pub account_user: Option<String>,
    #[serde(default, alias = "api_password")]
    pub account_password: Option<Secret>,
}

fn default_accounts_host() -> String {
    DEFAULT_ACCOUNTS_HOST.to_string()
}

fn default_true() -> bool {
    true
}

impl ProvisionConfig {
    /// 从文件加载，应用环境变量覆盖并校验
    pub fn load(path: &Path) -> ProvisionResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|source| ProvisionError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_json_str(&raw)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// 仅解析，不做覆盖和校验
    pub fn from_json_str(raw: &str) -> ProvisionResult<Self> {
        serde_json::from_str(raw)
            .map_err(|e| ProvisionError::config(format!("invalid configuration file: {}", e)))
    }

    /// 环境变量优先于文件中的凭证
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(user) = env::lookup_with_fallback(
            &lookup,
            env::ENV_ACCOUNT_USER,
            env::ENV_ACCOUNT_USER_FALLBACK,
        ) {
            self.account_user = Some(user);
        }
        if let Some(password) = env::lookup_with_fallback(
            &lookup,
            env::ENV_ACCOUNT_PASSWORD,
            env::ENV_ACCOUNT_PASSWORD_FALLBACK,
        ) {
            self.account_password = Some(Secret::new(password));
        }
    }

    /// 所有命名字段都不能为空
    pub fn validate(&self) -> ProvisionResult<()> {
        let required = [
            ("region", &self.region),
            ("vpc_id", &self.vpc_id),
            ("network_stack_name", &self.network_stack_name),
            ("identity_stack_name", &self.identity_stack_name),
            ("storage_stack_name", &self.storage_stack_name),
            ("key_stack_name", &self.key_stack_name),
            ("databricks_aws_account_id", &self.databricks_aws_account_id),
            ("account_id", &self.account_id),
            ("credentials_name", &self.credentials_name),
            ("storage_config_name", &self.storage_config_name),
            ("network_name", &self.network_name),
            ("workspace_name", &self.workspace_name),
            ("deployment_name", &self.deployment_name),
            ("accounts_host", &self.accounts_host),
        ];
        if let Some((name, _)) = required.iter().find(|(_, v)| v.trim().is_empty()) {
            return Err(ProvisionError::config(format!("'{}' must not be empty", name)));
        }

        let stack_names = [
            &self.network_stack_name,
            &self.identity_stack_name,
            &self.storage_stack_name,
            &self.key_stack_name,
        ];
        for (i, name) in stack_names.iter().enumerate() {
            if stack_names[..i].contains(name) {
                return Err(ProvisionError::config(format!(
                    "stack name '{}' is used more than once",
                    name
                )));
            }
        }
        Ok(())
    }

    /// 账号 API 凭证，缺失时报错
    pub fn account_credentials(&self) -> ProvisionResult<AccountCredentials> {
        let user = self
            .account_user
            .clone()
            .filter(|u| !u.is_empty())
            .ok_or_else(|| {
                ProvisionError::config(format!(
                    "account API user is not set (config 'api_user' or {})",
                    env::ENV_ACCOUNT_USER
                ))
            })?;
        let password = self
            .account_password
            .clone()
            .filter(|p| !p.expose().is_empty())
            .ok_or_else(|| {
                ProvisionError::config(format!(
                    "account API password is not set (config 'api_password' or {})",
                    env::ENV_ACCOUNT_PASSWORD
                ))
            })?;
        Ok(AccountCredentials { user, password })
    }

    pub fn stack_name(&self, kind: UnitKind) -> &str {
        match kind {
            UnitKind::Network => &self.network_stack_name,
            UnitKind::Identity => &self.identity_stack_name,
            UnitKind::Storage => &self.storage_stack_name,
            UnitKind::Key => &self.key_stack_name,
        }
    }

    pub fn template_files(&self, kind: UnitKind) -> &TemplateFiles {
        match kind {
            UnitKind::Network => &self.templates.network,
            UnitKind::Identity => &self.templates.identity,
            UnitKind::Storage => &self.templates.storage,
            UnitKind::Key => &self.templates.key,
        }
    }
}
