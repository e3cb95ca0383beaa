//! CloudFormation 客户端
//!
//! `StackService` 是部署服务的最小接口；`CloudFormationClient` 用 AWS SDK 实现它。
//! 所有 SDK 响应都在这里转换成领域类型，上层不接触 SDK 类型。

use async_trait::async_trait;
use aws_sdk_cloudformation::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_cloudformation::types::{Capability, Parameter as CfnParameter, Stack};
use aws_sdk_cloudformation::Client;
use std::collections::HashMap;
use tracing::debug;

use crate::domain::stack::{DeploymentResult, DeploymentUnit, StackStatus, StackSummary, StatusSnapshot};
use crate::error::{ProvisionError, ProvisionResult};

/// 部署服务接口
#[async_trait]
pub trait StackService: Send + Sync {
    /// 校验模板；失败返回 `ProvisionError::Validation`
    async fn validate_template(&self, unit_name: &str, template_body: &str) -> ProvisionResult<()>;

    /// 列出所有 stack（含已删除的）
    async fn list_stacks(&self) -> ProvisionResult<Vec<StackSummary>>;

    /// 提交创建，返回 stack id
    async fn create_stack(&self, unit: &DeploymentUnit, elevated: bool) -> ProvisionResult<String>;

    /// 轮询用：只取状态
    async fn stack_status(&self, stack: &str) -> ProvisionResult<StatusSnapshot>;

    /// 完整描述（状态 + 输出）
    async fn describe_stack(&self, stack: &str) -> ProvisionResult<DeploymentResult>;
}

/// 基于 AWS SDK 的实现
#[derive(Clone)]
pub struct CloudFormationClient {
    client: Client,
}

impl CloudFormationClient {
    /// 按区域和可选的 profile 创建客户端
    pub async fn new(region: &str, profile: Option<&str>) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_sdk_cloudformation::config::Region::new(region.to_string()));
        if let Some(profile) = profile {
            loader = loader.profile_name(profile);
        }
        let conf = loader.load().await;
        Self {
            client: Client::new(&conf),
        }
    }

    async fn describe_one(&self, stack: &str) -> ProvisionResult<Stack> {
        let output = self
            .client
            .describe_stacks()
            .stack_name(stack)
            .send()
            .await
            .map_err(|e| ProvisionError::rejected("DescribeStacks", provider_message(e)))?;

        output
            .stacks()
            .first()
            .cloned()
            .ok_or_else(|| ProvisionError::decode("DescribeStacks", format!("no stack named {}", stack)))
    }
}

#[async_trait]
impl StackService for CloudFormationClient {
    async fn validate_template(&self, unit_name: &str, template_body: &str) -> ProvisionResult<()> {
        self.client
            .validate_template()
            .template_body(template_body)
            .send()
            .await
            .map_err(|e| ProvisionError::validation(unit_name, provider_message(e)))?;
        Ok(())
    }

    async fn list_stacks(&self) -> ProvisionResult<Vec<StackSummary>> {
        let mut summaries = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let output = self
                .client
                .list_stacks()
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|e| ProvisionError::rejected("ListStacks", provider_message(e)))?;

            for summary in output.stack_summaries() {
                let name = summary.stack_name().unwrap_or_default();
                let raw_status = summary
                    .stack_status()
                    .map(|s| s.as_str())
                    .unwrap_or_default();
                summaries.push(StackSummary {
                    name: name.to_string(),
                    raw_status: raw_status.to_string(),
                });
            }

            match output.next_token() {
                Some(token) if !token.is_empty() => next_token = Some(token.to_string()),
                _ => break,
            }
        }

        debug!(count = summaries.len(), "Listed stacks");
        Ok(summaries)
    }

    async fn create_stack(&self, unit: &DeploymentUnit, elevated: bool) -> ProvisionResult<String> {
        let parameters = unit
            .parameters
            .iter()
            .map(|p| {
                CfnParameter::builder()
                    .parameter_key(&p.parameter_key)
                    .parameter_value(&p.parameter_value)
                    .build()
            })
            .collect::<Vec<_>>();

        let mut request = self
            .client
            .create_stack()
            .stack_name(&unit.name)
            .template_body(&unit.template_body)
            .set_parameters(Some(parameters));
        if elevated {
            request = request.capabilities(Capability::CapabilityNamedIam);
        }

        let output = request
            .send()
            .await
            .map_err(|e| ProvisionError::rejected("CreateStack", provider_message(e)))?;

        output
            .stack_id()
            .map(str::to_string)
            .ok_or_else(|| ProvisionError::missing_field("CreateStack response", "StackId"))
    }

    async fn stack_status(&self, stack: &str) -> ProvisionResult<StatusSnapshot> {
        let stack = self.describe_one(stack).await?;
        Ok(StatusSnapshot {
            raw_status: raw_status(&stack)?,
            reason: stack.stack_status_reason().map(str::to_string),
        })
    }

    async fn describe_stack(&self, stack: &str) -> ProvisionResult<DeploymentResult> {
        let described = self.describe_one(stack).await?;
        let raw_status = raw_status(&described)?;

        let outputs = described
            .outputs()
            .iter()
            .filter_map(|o| match (o.output_key(), o.output_value()) {
                (Some(k), Some(v)) => Some((k.to_string(), v.to_string())),
                _ => None,
            })
            .collect::<HashMap<_, _>>();

        Ok(DeploymentResult {
            stack_id: described.stack_id().unwrap_or(stack).to_string(),
            name: described.stack_name().unwrap_or(stack).to_string(),
            status: StackStatus::from_provider(&raw_status),
            raw_status,
            status_reason: described.stack_status_reason().map(str::to_string),
            outputs,
        })
    }
}

fn raw_status(stack: &Stack) -> ProvisionResult<String> {
    stack
        .stack_status()
        .map(|s| s.as_str().to_string())
        .ok_or_else(|| ProvisionError::missing_field("DescribeStacks response", "StackStatus"))
}

/// 取服务端返回的错误消息，没有则给出完整的错误链
fn provider_message<E, R>(err: SdkError<E, R>) -> String
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    match err.as_service_error().and_then(|e| e.message()) {
        Some(message) => message.to_string(),
        None => DisplayErrorContext(&err).to_string(),
    }
}
