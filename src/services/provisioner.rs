//! Provisioning 编排
//!
//! 固定的十个步骤，严格顺序执行，每一步依赖上一步的结果：
//!
//! 1. network stack -> security group + 两个 subnet
//! 2. IAM role stack（需要 CAPABILITY_NAMED_IAM）-> role ARN
//! 3. root bucket stack -> bucket 名称
//! 4. KMS key stack -> key ARN + alias
//! 5. ~ 8. 注册 credentials / storage config / network / managed key
//! 9. 创建 workspace
//! 10. 轮询 workspace，RUNNING 时给出访问地址
//!
//! 任一步失败即终止，后续步骤标记为 skipped；已创建的资源不回滚。

use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use tracing::{error, info};

use crate::config::ProvisionConfig;
use crate::domain::provision::{pipeline_stages, ProvisionReport, ProvisionStage, StageStatus};
use crate::domain::stack::{DeploymentResult, Parameter, UnitKind};
use crate::domain::workspace::{workspace_url, WorkspaceSpec, WorkspaceStatus};
use crate::error::{ProvisionError, ProvisionResult};
use crate::infra::{template, AccountsService, StackService};

use super::context::ProvisionContext;
use super::output_extractor::{
    IdentityOutputs, KeyOutputs, NetworkOutputs, OutputSummary, StorageOutputs,
};
use super::stack_deployer::{StackDeployer, StackDeployment};
use super::workspace_registrar::WorkspaceRegistrar;

const NETWORK_STACK: usize = 0;
const IDENTITY_STACK: usize = 1;
const STORAGE_STACK: usize = 2;
const KEY_STACK: usize = 3;
const REGISTER_CREDENTIALS: usize = 4;
const REGISTER_STORAGE: usize = 5;
const REGISTER_NETWORK: usize = 6;
const REGISTER_KEY: usize = 7;
const CREATE_WORKSPACE: usize = 8;
const AWAIT_WORKSPACE: usize = 9;

/// 复用已有 stack 时的阶段说明
pub const REUSED_STACK_MESSAGE: &str = "reused existing stack";

/// Provisioning 编排器
pub struct Provisioner {
    config: Arc<ProvisionConfig>,
    deployer: StackDeployer,
    registrar: WorkspaceRegistrar,
    ctx: Arc<ProvisionContext>,
}

impl Provisioner {
    pub fn new(
        config: Arc<ProvisionConfig>,
        stacks: Arc<dyn StackService>,
        accounts: Arc<dyn AccountsService>,
        ctx: Arc<ProvisionContext>,
    ) -> Self {
        Self {
            deployer: StackDeployer::new(stacks, ctx.clone()),
            registrar: WorkspaceRegistrar::new(config.clone(), accounts, ctx.clone()),
            config,
            ctx,
        }
    }

    /// 执行完整流程
    ///
    /// 返回 Ok 只代表 workspace 到达了终态；是否 RUNNING 看 `ProvisionReport::is_running`
    pub async fn run(&self) -> ProvisionResult<ProvisionReport> {
        let started_at = Utc::now();
        let mut stages = pipeline_stages();
        self.ctx.update_stages(&stages).await;

        let config = self.config.clone();
        info!(run_id = %self.ctx.run_id, workspace = %config.workspace_name, region = %config.region, "Starting workspace provisioning");

        // Step 1 - network
        let network = self
            .deploy_stage(
                &mut stages,
                NETWORK_STACK,
                UnitKind::Network,
                vec![Parameter::new("VpcId", &config.vpc_id)],
                NetworkOutputs::from_result,
            )
            .await?;

        // Step 2 - IAM role
        let identity = self
            .deploy_stage(
                &mut stages,
                IDENTITY_STACK,
                UnitKind::Identity,
                vec![
                    Parameter::new("DatabricksAWSAccount", &config.databricks_aws_account_id),
                    Parameter::new("DatabricksE2WorkspaceAccount", &config.account_id),
                    Parameter::new("WorkspaceRegion", &config.region),
                    Parameter::new("WorkspaceVPC", &config.vpc_id),
                    Parameter::new("WorkspaceSecurityGroup", &network.security_group_id),
                ],
                IdentityOutputs::from_result,
            )
            .await?;

        // Step 3 - root bucket
        let storage = self
            .deploy_stage(
                &mut stages,
                STORAGE_STACK,
                UnitKind::Storage,
                vec![Parameter::new("DatabricksAccount", &config.databricks_aws_account_id)],
                StorageOutputs::from_result,
            )
            .await?;

        // Step 4 - KMS key
        let key = self
            .deploy_stage(
                &mut stages,
                KEY_STACK,
                UnitKind::Key,
                vec![Parameter::new("DatabricksAccount", &config.databricks_aws_account_id)],
                KeyOutputs::from_result,
            )
            .await?;

        // Step 5 ~ 8 - 控制面对象
        let credentials = self
            .track(
                &mut stages,
                REGISTER_CREDENTIALS,
                self.registrar.create_credentials(&identity.iam_role_arn),
            )
            .await?;
        let storage_config = self
            .track(
                &mut stages,
                REGISTER_STORAGE,
                self.registrar.create_storage_config(&storage.bucket_name),
            )
            .await?;
        let network_object = self
            .track(
                &mut stages,
                REGISTER_NETWORK,
                self.registrar.create_network(
                    &config.vpc_id,
                    [network.subnet1_id.as_str(), network.subnet2_id.as_str()],
                    &network.security_group_id,
                ),
            )
            .await?;
        let managed_key = self
            .track(
                &mut stages,
                REGISTER_KEY,
                self.registrar
                    .create_managed_key(&key.key_arn, &key.key_alias, &config.region),
            )
            .await?;

        // Step 9 - workspace
        let spec = WorkspaceSpec {
            name: config.workspace_name.clone(),
            deployment_name: config.deployment_name.clone(),
            region: config.region.clone(),
            credentials_id: credentials.id,
            network_id: network_object.id,
            storage_config_id: storage_config.id,
            managed_key_id: managed_key.id,
            no_public_ip: config.no_public_ip,
        };
        let workspace_id = self
            .track(
                &mut stages,
                CREATE_WORKSPACE,
                self.registrar.create_workspace(&spec),
            )
            .await?;

        // Step 10 - 等待终态
        self.ctx
            .log_stdout(&format!(
                "...Waiting for workspace {} to leave PROVISIONING...",
                workspace_id
            ))
            .await;
        let status = self
            .track(
                &mut stages,
                AWAIT_WORKSPACE,
                self.registrar.poll_workspace(&workspace_id),
            )
            .await?;
        let running = status == WorkspaceStatus::Running;
        stages[AWAIT_WORKSPACE].settle(running, status.as_str());
        self.ctx.update_stages(&stages).await;

        self.ctx
            .log_stdout(&format!(
                "Final status for the workspace {} is {}",
                workspace_id, status
            ))
            .await;

        let url = if running {
            let url = workspace_url(&spec.deployment_name);
            self.ctx
                .log_stdout(&format!("URL for the workspace is {}", url))
                .await;
            info!(workspace_id = %workspace_id, url = %url, "Workspace is running");
            Some(url)
        } else {
            error!(workspace_id = %workspace_id, status = %status, "Workspace did not reach RUNNING");
            None
        };

        Ok(ProvisionReport {
            run_id: self.ctx.run_id.clone(),
            started_at,
            finished_at: Some(Utc::now()),
            workspace_id,
            workspace_status: status.to_string(),
            workspace_url: url,
            stages,
        })
    }

    /// 部署一个 stack 并提取输出，提取到的值逐行写到 stdout
    async fn deploy_stage<O: OutputSummary>(
        &self,
        stages: &mut [ProvisionStage],
        idx: usize,
        kind: UnitKind,
        overrides: Vec<Parameter>,
        extract: fn(&DeploymentResult) -> ProvisionResult<O>,
    ) -> ProvisionResult<O> {
        let (outputs, created) = self
            .track(stages, idx, async {
                let deployment = self.deploy_unit(kind, overrides).await?;
                let outputs = extract(&deployment.result)?;
                Ok::<_, ProvisionError>((outputs, deployment.created))
            })
            .await?;

        for line in outputs.summary_lines() {
            self.ctx.log_stdout(&line).await;
        }
        if !created {
            stages[idx].reuse(REUSED_STACK_MESSAGE);
            self.ctx.update_stages(stages).await;
        }
        Ok(outputs)
    }

    async fn deploy_unit(
        &self,
        kind: UnitKind,
        overrides: Vec<Parameter>,
    ) -> ProvisionResult<StackDeployment> {
        let mut unit = template::load_unit(
            kind,
            self.config.stack_name(kind),
            self.config.template_files(kind),
        )
        .await?;
        unit.append_parameters(overrides);

        self.deployer
            .deploy(
                &unit,
                self.config.polling.stack_wait_policy(kind),
                kind.requires_elevated_capability(),
            )
            .await
    }

    /// 记录单个步骤的开始与结束；失败时其余待执行步骤标记为 skipped
    async fn track<T, F>(
        &self,
        stages: &mut [ProvisionStage],
        idx: usize,
        step: F,
    ) -> ProvisionResult<T>
    where
        F: Future<Output = ProvisionResult<T>>,
    {
        stages[idx].start();
        self.ctx.update_stages(stages).await;

        match step.await {
            Ok(value) => {
                stages[idx].succeed();
                self.ctx.update_stages(stages).await;
                Ok(value)
            }
            Err(e) => {
                error!(stage = %stages[idx].name, kind = e.kind(), error = %e, "Provisioning step failed");
                stages[idx].fail(&e);
                self.ctx
                    .log_stderr(&format!("{} failed", stages[idx].display_name))
                    .await;
                let failed_stage = stages[idx].name.clone();
                for stage in stages.iter_mut().skip(idx + 1) {
                    if stage.status == StageStatus::Pending {
                        stage.skip_after(&failed_stage);
                    }
                }
                self.ctx.update_stages(stages).await;
                Err(e)
            }
        }
    }
}

/// 依次读取并校验四个模板，遇到第一个无效模板即返回
pub async fn validate_templates(
    config: &ProvisionConfig,
    deployer: &StackDeployer,
    ctx: &ProvisionContext,
) -> ProvisionResult<()> {
    for kind in UnitKind::ALL {
        let unit =
            template::load_unit(kind, config.stack_name(kind), config.template_files(kind)).await?;
        deployer.validate(&unit).await?;
        info!(unit = %unit.name, kind = kind.as_str(), "Template is valid");
    }
    ctx.log_stdout(&format!("All {} templates are valid", UnitKind::ALL.len()))
        .await;
    Ok(())
}
