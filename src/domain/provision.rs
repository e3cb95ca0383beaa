//! Provisioning 运行记录：阶段、日志行、最终报告

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::ProvisionError;

/// 阶段状态
#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Pending,
    Running,
    Success,
    /// stack 已存在，直接使用其输出
    Reused,
    Failed,
    Skipped,
}

/// 十个步骤之一的执行记录
#[derive(Clone, Debug, Serialize)]
pub struct ProvisionStage {
    /// e.g. "network_stack", "register_credentials"
    pub name: String,
    /// 失败时写到 stderr 的 "{display_name} failed"
    pub display_name: String,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
    pub status: StageStatus,
    pub message: Option<String>,
    /// 失败原因分类，取自 `ProvisionError::kind`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<&'static str>,
}

impl ProvisionStage {
    pub fn new(name: &str, display_name: &str) -> Self {
        Self {
            name: name.to_string(),
            display_name: display_name.to_string(),
            started_at: None,
            finished_at: None,
            duration_ms: None,
            status: StageStatus::Pending,
            message: None,
            error_kind: None,
        }
    }

    pub fn start(&mut self) {
        self.started_at = Some(Utc::now());
        self.status = StageStatus::Running;
    }

    pub fn succeed(&mut self) {
        self.close(StageStatus::Success);
    }

    /// 已有 stack 被复用：步骤算完成，但没有创建任何资源
    pub fn reuse(&mut self, message: &str) {
        self.close(StageStatus::Reused);
        self.message = Some(message.to_string());
    }

    pub fn fail(&mut self, error: &ProvisionError) {
        self.close(StageStatus::Failed);
        self.message = Some(error.to_string());
        self.error_kind = Some(error.kind());
    }

    /// workspace 轮询的终态：只有 RUNNING 算成功
    pub fn settle(&mut self, running: bool, workspace_status: &str) {
        if running {
            self.close(StageStatus::Success);
        } else {
            self.close(StageStatus::Failed);
            self.error_kind = Some(WORKSPACE_NOT_RUNNING);
        }
        self.message = Some(workspace_status.to_string());
    }

    /// 前面的步骤失败，本步骤不再执行
    pub fn skip_after(&mut self, failed_stage: &str) {
        self.status = StageStatus::Skipped;
        self.message = Some(format!("not run, {} failed", failed_stage));
    }

    pub fn is_finished(&self) -> bool {
        matches!(
            self.status,
            StageStatus::Success | StageStatus::Reused | StageStatus::Failed
        )
    }

    fn close(&mut self, status: StageStatus) {
        let now = Utc::now();
        self.status = status;
        self.finished_at = Some(now);
        self.duration_ms = self
            .started_at
            .map(|started| (now - started).num_milliseconds());
    }
}

/// workspace 到达非 RUNNING 终态时的 error_kind
pub const WORKSPACE_NOT_RUNNING: &str = "workspace_not_running";

/// 固定的十个步骤
pub fn pipeline_stages() -> Vec<ProvisionStage> {
    vec![
        ProvisionStage::new("network_stack", "Deploy network stack"),
        ProvisionStage::new("identity_stack", "Deploy IAM role stack"),
        ProvisionStage::new("storage_stack", "Deploy root bucket stack"),
        ProvisionStage::new("key_stack", "Deploy KMS key stack"),
        ProvisionStage::new("register_credentials", "Register credentials"),
        ProvisionStage::new("register_storage", "Register storage configuration"),
        ProvisionStage::new("register_network", "Register network"),
        ProvisionStage::new("register_key", "Register customer managed key"),
        ProvisionStage::new("create_workspace", "Create workspace"),
        ProvisionStage::new("await_workspace", "Wait for workspace"),
    ]
}

/// 日志行
#[derive(Clone, Debug, Serialize)]
pub struct LogLine {
    pub timestamp: DateTime<Utc>,
    pub stream: String, // stdout | stderr
    pub content: String,
}

impl LogLine {
    pub fn new(stream: &str, content: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            stream: stream.to_string(),
            content: content.into(),
        }
    }

    pub fn stdout(content: impl Into<String>) -> Self {
        Self::new("stdout", content)
    }

    pub fn stderr(content: impl Into<String>) -> Self {
        Self::new("stderr", content)
    }
}

/// 一次完整运行的报告
#[derive(Clone, Debug, Serialize)]
pub struct ProvisionReport {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub workspace_id: String,
    pub workspace_status: String,
    /// 仅在 RUNNING 时给出
    pub workspace_url: Option<String>,
    pub stages: Vec<ProvisionStage>,
}

impl ProvisionReport {
    pub fn is_running(&self) -> bool {
        self.workspace_url.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_lifecycle() {
        let mut stage = ProvisionStage::new("network_stack", "Deploy network stack");
        assert_eq!(stage.status, StageStatus::Pending);
        assert!(!stage.is_finished());

        stage.start();
        assert_eq!(stage.status, StageStatus::Running);
        assert!(stage.started_at.is_some());

        stage.succeed();
        assert_eq!(stage.status, StageStatus::Success);
        assert!(stage.is_finished());
        assert!(stage.duration_ms.is_some());
        assert!(stage.error_kind.is_none());
    }

    #[test]
    fn test_failed_stage_records_error_kind() {
        let mut stage = ProvisionStage::new("identity_stack", "Deploy IAM role stack");
        stage.start();
        stage.fail(&ProvisionError::Timeout {
            unit: "stack E2-IAMRole-Deploy".to_string(),
            attempts: 60,
        });

        assert_eq!(stage.status, StageStatus::Failed);
        assert_eq!(stage.error_kind, Some("timeout"));
        assert_eq!(
            stage.message.as_deref(),
            Some("Timed out waiting for stack E2-IAMRole-Deploy after 60 attempts")
        );

        let json = serde_json::to_value(&stage).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["error_kind"], "timeout");
    }

    #[test]
    fn test_reused_and_skipped_stages() {
        let mut reused = ProvisionStage::new("network_stack", "Deploy network stack");
        reused.start();
        reused.reuse("reused existing stack");
        assert_eq!(reused.status, StageStatus::Reused);
        assert!(reused.is_finished());
        assert!(serde_json::to_value(&reused).unwrap().get("error_kind").is_none());

        let mut skipped = ProvisionStage::new("key_stack", "Deploy KMS key stack");
        skipped.skip_after("identity_stack");
        assert_eq!(skipped.status, StageStatus::Skipped);
        assert!(!skipped.is_finished());
        assert_eq!(skipped.message.as_deref(), Some("not run, identity_stack failed"));
    }

    #[test]
    fn test_settle_on_workspace_status() {
        let mut stage = ProvisionStage::new("await_workspace", "Wait for workspace");
        stage.start();
        stage.settle(false, "FAILED");
        assert_eq!(stage.status, StageStatus::Failed);
        assert_eq!(stage.error_kind, Some(WORKSPACE_NOT_RUNNING));
        assert_eq!(stage.message.as_deref(), Some("FAILED"));

        let mut stage = ProvisionStage::new("await_workspace", "Wait for workspace");
        stage.start();
        stage.settle(true, "RUNNING");
        assert_eq!(stage.status, StageStatus::Success);
        assert!(stage.error_kind.is_none());
    }

    #[test]
    fn test_pipeline_has_ten_steps() {
        let stages = pipeline_stages();
        assert_eq!(stages.len(), 10);
        assert_eq!(stages[0].name, "network_stack");
        assert_eq!(stages[9].name, "await_workspace");
    }

    #[test]
    fn test_log_line_creation() {
        let line = LogLine::stdout("Hello");
        assert_eq!(line.stream, "stdout");
        assert_eq!(line.content, "Hello");

        let line = LogLine::stderr("Error");
        assert_eq!(line.stream, "stderr");
    }
}
