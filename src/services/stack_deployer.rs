//! Stack 部署
//!
//! 按名称幂等地创建 stack：已存在则直接描述并复用，否则提交创建、
//! 同步轮询直到完成（次数有上限），最后取完整描述。
//!
//! 单个 stack 的状态机：`NotExists -> Creating -> {Complete | Failed | TimedOut}`，
//! 失败不重试，也没有更新/删除路径。

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::domain::stack::{DeploymentResult, DeploymentUnit, StackStatus, WaitPolicy};
use crate::error::{ProvisionError, ProvisionResult};
use crate::infra::StackService;

use super::context::ProvisionContext;

/// 一次 deploy 的结果
#[derive(Clone, Debug)]
pub struct StackDeployment {
    pub result: DeploymentResult,
    /// false 表示 stack 已存在，本次没有创建
    pub created: bool,
}

/// Stack 部署器
pub struct StackDeployer {
    service: Arc<dyn StackService>,
    ctx: Arc<ProvisionContext>,
}

impl StackDeployer {
    pub fn new(service: Arc<dyn StackService>, ctx: Arc<ProvisionContext>) -> Self {
        Self { service, ctx }
    }

    /// 校验模板，失败时不会有任何变更调用
    pub async fn validate(&self, unit: &DeploymentUnit) -> ProvisionResult<()> {
        self.ctx
            .log_stdout(&format!("Validating template for {}", unit.name))
            .await;
        self.service
            .validate_template(&unit.name, &unit.template_body)
            .await
    }

    /// 是否存在同名且未删除的 stack
    pub async fn exists(&self, name: &str) -> ProvisionResult<bool> {
        let stacks = self.service.list_stacks().await?;
        Ok(stacks
            .iter()
            .any(|s| s.name == name && s.status() != StackStatus::Deleted))
    }

    /// 部署（或复用）一个 stack，返回其完整描述
    pub async fn deploy(
        &self,
        unit: &DeploymentUnit,
        policy: WaitPolicy,
        elevated: bool,
    ) -> ProvisionResult<StackDeployment> {
        self.validate(unit).await?;

        if self.exists(&unit.name).await? {
            self.ctx
                .log_stdout(&format!(
                    "Stack {} already exists, reusing its outputs",
                    unit.name
                ))
                .await;
            info!(unit = %unit.name, "Stack exists, skipping creation");

            let result = self.service.describe_stack(&unit.name).await?;
            ensure_complete(&unit.name, &result)?;
            log_description(&result);
            return Ok(StackDeployment {
                result,
                created: false,
            });
        }

        self.ctx
            .log_stdout(&format!("Creating stack {}", unit.name))
            .await;
        let stack_id = self.service.create_stack(unit, elevated).await?;
        info!(unit = %unit.name, stack_id = %stack_id, elevated, "Stack creation submitted");

        self.ctx
            .log_stdout(&format!("...Waiting for stack {} to be created...", unit.name))
            .await;
        self.wait_for_completion(&unit.name, &stack_id, policy)
            .await?;

        let result = self.service.describe_stack(&stack_id).await?;
        ensure_complete(&unit.name, &result)?;
        log_description(&result);

        self.ctx
            .log_stdout(&format!("Stack {} created ({})", unit.name, result.raw_status))
            .await;
        Ok(StackDeployment {
            result,
            created: true,
        })
    }

    /// 同步轮询，最多 `policy.max_attempts` 次
    async fn wait_for_completion(
        &self,
        unit_name: &str,
        stack_id: &str,
        policy: WaitPolicy,
    ) -> ProvisionResult<()> {
        for attempt in 1..=policy.max_attempts {
            let snapshot = self.service.stack_status(stack_id).await?;
            match snapshot.status() {
                StackStatus::Complete => {
                    info!(unit = %unit_name, attempt, "Stack creation complete");
                    return Ok(());
                }
                StackStatus::Pending => {
                    debug!(unit = %unit_name, attempt, status = %snapshot.raw_status, "Stack still in progress");
                }
                StackStatus::Failed | StackStatus::Deleted => {
                    warn!(unit = %unit_name, attempt, status = %snapshot.raw_status, "Stack creation failed");
                    return Err(ProvisionError::StackFailed {
                        unit: unit_name.to_string(),
                        status: snapshot.raw_status,
                        reason: snapshot.reason,
                    });
                }
            }

            if attempt < policy.max_attempts {
                tokio::time::sleep(policy.delay).await;
            }
        }

        warn!(unit = %unit_name, attempts = policy.max_attempts, "Stack creation timed out");
        Err(ProvisionError::Timeout {
            unit: format!("stack {}", unit_name),
            attempts: policy.max_attempts,
        })
    }
}

fn ensure_complete(unit_name: &str, result: &DeploymentResult) -> ProvisionResult<()> {
    if result.is_complete() {
        return Ok(());
    }
    Err(ProvisionError::StackFailed {
        unit: unit_name.to_string(),
        status: result.raw_status.clone(),
        reason: result.status_reason.clone(),
    })
}

fn log_description(result: &DeploymentResult) {
    match serde_json::to_string_pretty(result) {
        Ok(json) => debug!(unit = %result.name, "Stack description:\n{}", json),
        Err(e) => debug!(unit = %result.name, error = %e, "Unable to render stack description"),
    }
}
