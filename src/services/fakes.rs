//! 测试用的内存实现：部署服务与账号 API，记录每一次调用

use async_trait::async_trait;
use serde::Serialize;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

use crate::domain::stack::{
    DeploymentResult, DeploymentUnit, Parameter, StackStatus, StackSummary, StatusSnapshot,
};
use crate::domain::workspace::{
    AwsCredentials, CredentialsRequest, CredentialsResponse, ManagedKeyRequest, ManagedKeyResponse,
    NetworkRequest, NetworkResponse, StorageConfigRequest, StorageConfigResponse, StsRole,
    WorkspaceRequest, WorkspaceResponse,
};
use crate::error::{ProvisionError, ProvisionResult};
use crate::infra::{AccountsService, StackService};

const IN_PROGRESS: &str = "CREATE_IN_PROGRESS";
const COMPLETE: &str = "CREATE_COMPLETE";

#[derive(Default, Clone)]
struct Preset {
    outputs: HashMap<String, String>,
    pending_polls: u32,
    never_complete: bool,
    failure_status: Option<String>,
    reject_template: bool,
    reject_create: Option<String>,
}

struct FakeStack {
    id: String,
    name: String,
    raw_status: String,
    outputs: HashMap<String, String>,
}

#[derive(Default)]
struct StackState {
    presets: HashMap<String, Preset>,
    stacks: Vec<FakeStack>,
    list_calls: usize,
    create_calls: Vec<String>,
    elevated_creates: Vec<String>,
    submitted_parameters: HashMap<String, Vec<Parameter>>,
    status_calls: usize,
    describe_calls: Vec<String>,
}

impl StackState {
    fn preset(&mut self, name: &str) -> &mut Preset {
        self.presets.entry(name.to_string()).or_default()
    }

    fn find(&mut self, id_or_name: &str) -> Option<&mut FakeStack> {
        self.stacks
            .iter_mut()
            .rev()
            .find(|s| s.id == id_or_name || (s.name == id_or_name && s.raw_status != "DELETE_COMPLETE"))
    }
}

/// 内存中的部署服务
#[derive(Default)]
pub struct FakeStackService {
    state: Mutex<StackState>,
}

impl FakeStackService {
    pub fn new() -> Self {
        Self::default()
    }

    /// 创建后 stack 输出的内容
    pub fn set_outputs(&self, name: &str, outputs: &[(&str, &str)]) {
        let mut state = self.state.lock().unwrap();
        state.preset(name).outputs = to_map(outputs);
    }

    /// 预置一个已存在的 stack
    pub fn add_existing(&self, name: &str, raw_status: &str, outputs: &[(&str, &str)]) {
        let mut state = self.state.lock().unwrap();
        state.stacks.push(FakeStack {
            id: stack_id(name),
            name: name.to_string(),
            raw_status: raw_status.to_string(),
            outputs: to_map(outputs),
        });
    }

    pub fn never_complete(&self, name: &str) {
        self.state.lock().unwrap().preset(name).never_complete = true;
    }

    pub fn pending_polls(&self, name: &str, polls: u32) {
        self.state.lock().unwrap().preset(name).pending_polls = polls;
    }

    pub fn fail_creation_with_status(&self, name: &str, raw_status: &str) {
        self.state.lock().unwrap().preset(name).failure_status = Some(raw_status.to_string());
    }

    pub fn reject_template(&self, name: &str) {
        self.state.lock().unwrap().preset(name).reject_template = true;
    }

    pub fn reject_create(&self, name: &str, message: &str) {
        self.state.lock().unwrap().preset(name).reject_create = Some(message.to_string());
    }

    pub fn list_calls(&self) -> usize {
        self.state.lock().unwrap().list_calls
    }

    pub fn create_calls(&self) -> usize {
        self.state.lock().unwrap().create_calls.len()
    }

    pub fn create_calls_for(&self, name: &str) -> usize {
        let state = self.state.lock().unwrap();
        state.create_calls.iter().filter(|n| *n == name).count()
    }

    pub fn created_names(&self) -> Vec<String> {
        self.state.lock().unwrap().create_calls.clone()
    }

    pub fn elevated_creates(&self) -> Vec<String> {
        self.state.lock().unwrap().elevated_creates.clone()
    }

    /// 创建时提交的参数
    pub fn parameters_for(&self, name: &str) -> Vec<Parameter> {
        let state = self.state.lock().unwrap();
        state.submitted_parameters.get(name).cloned().unwrap_or_default()
    }

    pub fn status_calls(&self) -> usize {
        self.state.lock().unwrap().status_calls
    }

    pub fn describe_calls(&self) -> usize {
        self.state.lock().unwrap().describe_calls.len()
    }

    pub fn describe_calls_for(&self, name: &str) -> usize {
        let state = self.state.lock().unwrap();
        state.describe_calls.iter().filter(|n| *n == name).count()
    }
}

#[async_trait]
impl StackService for FakeStackService {
    async fn validate_template(&self, unit_name: &str, _template_body: &str) -> ProvisionResult<()> {
        let mut state = self.state.lock().unwrap();
        if state.preset(unit_name).reject_template {
            return Err(ProvisionError::validation(unit_name, "Template format error: JSON not well-formed"));
        }
        Ok(())
    }

    async fn list_stacks(&self) -> ProvisionResult<Vec<StackSummary>> {
        let mut state = self.state.lock().unwrap();
        state.list_calls += 1;
        Ok(state
            .stacks
            .iter()
            .map(|s| StackSummary {
                name: s.name.clone(),
                raw_status: s.raw_status.clone(),
            })
            .collect())
    }

    async fn create_stack(&self, unit: &DeploymentUnit, elevated: bool) -> ProvisionResult<String> {
        let mut state = self.state.lock().unwrap();
        state.create_calls.push(unit.name.clone());
        let preset = state.preset(&unit.name).clone();
        if let Some(message) = preset.reject_create {
            return Err(ProvisionError::rejected("CreateStack", message));
        }
        if elevated {
            state.elevated_creates.push(unit.name.clone());
        }
        state
            .submitted_parameters
            .insert(unit.name.clone(), unit.parameters.clone());

        let id = stack_id(&unit.name);
        state.stacks.push(FakeStack {
            id: id.clone(),
            name: unit.name.clone(),
            raw_status: IN_PROGRESS.to_string(),
            outputs: preset.outputs,
        });
        Ok(id)
    }

    async fn stack_status(&self, stack: &str) -> ProvisionResult<StatusSnapshot> {
        let mut state = self.state.lock().unwrap();
        state.status_calls += 1;

        let name = state
            .find(stack)
            .map(|s| s.name.clone())
            .ok_or_else(|| ProvisionError::rejected("DescribeStacks", format!("Stack with id {} does not exist", stack)))?;
        let preset = state.preset(&name).clone();

        let next = if let Some(failure) = preset.failure_status {
            failure
        } else if preset.never_complete {
            IN_PROGRESS.to_string()
        } else if preset.pending_polls > 0 {
            state.preset(&name).pending_polls -= 1;
            IN_PROGRESS.to_string()
        } else {
            COMPLETE.to_string()
        };

        let fake = state.find(stack).expect("stack resolved above");
        fake.raw_status = next.clone();
        Ok(StatusSnapshot {
            raw_status: next,
            reason: None,
        })
    }

    async fn describe_stack(&self, stack: &str) -> ProvisionResult<DeploymentResult> {
        let mut state = self.state.lock().unwrap();
        let fake = state
            .find(stack)
            .ok_or_else(|| ProvisionError::rejected("DescribeStacks", format!("Stack with id {} does not exist", stack)))?;
        let result = DeploymentResult {
            stack_id: fake.id.clone(),
            name: fake.name.clone(),
            status: StackStatus::from_provider(&fake.raw_status),
            raw_status: fake.raw_status.clone(),
            status_reason: None,
            outputs: fake.outputs.clone(),
        };
        state.describe_calls.push(result.name.clone());
        Ok(result)
    }
}

fn stack_id(name: &str) -> String {
    format!("arn:aws:cloudformation:us-west-2:123456789012:stack/{}/0001", name)
}

fn to_map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[derive(Default)]
struct AccountsState {
    calls: Vec<&'static str>,
    requests: Vec<(&'static str, serde_json::Value)>,
    workspace_statuses: VecDeque<String>,
    omit_ids: HashSet<&'static str>,
    reject: Option<(&'static str, String)>,
}

/// 内存中的账号 API
#[derive(Default)]
pub struct FakeAccountsService {
    state: Mutex<AccountsState>,
}

impl FakeAccountsService {
    pub fn new() -> Self {
        Self::default()
    }

    /// get-workspace 依次返回的状态；最后一个会一直重复
    pub fn with_workspace_statuses(self, statuses: &[&str]) -> Self {
        self.state.lock().unwrap().workspace_statuses =
            statuses.iter().map(|s| s.to_string()).collect();
        self
    }

    /// 某个操作的响应里不带 id
    pub fn omit_id(&self, operation: &'static str) {
        self.state.lock().unwrap().omit_ids.insert(operation);
    }

    pub fn reject(&self, operation: &'static str, message: &str) {
        self.state.lock().unwrap().reject = Some((operation, message.to_string()));
    }

    pub fn total_calls(&self) -> usize {
        self.state.lock().unwrap().calls.len()
    }

    pub fn calls_to(&self, operation: &str) -> usize {
        let state = self.state.lock().unwrap();
        state.calls.iter().filter(|c| **c == operation).count()
    }

    /// 某个操作最近一次的请求体
    pub fn last_request(&self, operation: &str) -> Option<serde_json::Value> {
        let state = self.state.lock().unwrap();
        state
            .requests
            .iter()
            .rev()
            .find(|(op, _)| *op == operation)
            .map(|(_, body)| body.clone())
    }

    fn record<B: Serialize>(&self, operation: &'static str, body: Option<&B>) -> ProvisionResult<bool> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(operation);
        if let Some(body) = body {
            let value = serde_json::to_value(body).expect("request serializes");
            state.requests.push((operation, value));
        }
        if let Some((op, message)) = &state.reject {
            if *op == operation {
                return Err(ProvisionError::rejected(operation, message.clone()));
            }
        }
        Ok(!state.omit_ids.contains(operation))
    }
}

#[async_trait]
impl AccountsService for FakeAccountsService {
    async fn create_credentials(
        &self,
        _account_id: &str,
        request: &CredentialsRequest,
    ) -> ProvisionResult<CredentialsResponse> {
        let with_id = self.record("create_credentials", Some(request))?;
        Ok(CredentialsResponse {
            credentials_id: with_id.then(|| "cred-0001".to_string()),
            aws_credentials: Some(AwsCredentials {
                sts_role: StsRole {
                    role_arn: request.aws_credentials.sts_role.role_arn.clone(),
                    external_id: Some("ext-0001".to_string()),
                },
            }),
        })
    }

    async fn create_storage_config(
        &self,
        _account_id: &str,
        request: &StorageConfigRequest,
    ) -> ProvisionResult<StorageConfigResponse> {
        let with_id = self.record("create_storage_config", Some(request))?;
        Ok(StorageConfigResponse {
            storage_configuration_id: with_id.then(|| "storage-0001".to_string()),
        })
    }

    async fn create_network(
        &self,
        _account_id: &str,
        request: &NetworkRequest,
    ) -> ProvisionResult<NetworkResponse> {
        let with_id = self.record("create_network", Some(request))?;
        Ok(NetworkResponse {
            network_id: with_id.then(|| "net-0001".to_string()),
        })
    }

    async fn create_customer_managed_key(
        &self,
        _account_id: &str,
        request: &ManagedKeyRequest,
    ) -> ProvisionResult<ManagedKeyResponse> {
        let with_id = self.record("create_customer_managed_key", Some(request))?;
        Ok(ManagedKeyResponse {
            customer_managed_key_id: with_id.then(|| "cmk-0001".to_string()),
        })
    }

    async fn create_workspace(
        &self,
        _account_id: &str,
        request: &WorkspaceRequest,
    ) -> ProvisionResult<WorkspaceResponse> {
        let with_id = self.record("create_workspace", Some(request))?;
        Ok(WorkspaceResponse {
            workspace_id: with_id.then(|| "1234567890".to_string()),
            workspace_status: Some("PROVISIONING".to_string()),
            workspace_status_message: None,
        })
    }

    async fn get_workspace(
        &self,
        _account_id: &str,
        workspace_id: &str,
    ) -> ProvisionResult<WorkspaceResponse> {
        let with_id = self.record::<()>("get_workspace", None)?;
        let mut state = self.state.lock().unwrap();
        let status = if state.workspace_statuses.len() > 1 {
            state.workspace_statuses.pop_front()
        } else {
            state.workspace_statuses.front().cloned()
        };
        Ok(WorkspaceResponse {
            workspace_id: with_id.then(|| workspace_id.to_string()),
            workspace_status: status,
            workspace_status_message: None,
        })
    }
}
