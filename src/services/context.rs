//! Provisioning 上下文
//!
//! 统一的进度输出：人类可读的进度行写到 stdout，同时保留在内存中

use tokio::sync::Mutex;
use uuid::Uuid;

use crate::domain::provision::{LogLine, ProvisionStage};

/// 一次运行的上下文
pub struct ProvisionContext {
    /// 运行 ID
    pub run_id: String,
    /// 是否回显到终端
    echo: bool,
    lines: Mutex<Vec<LogLine>>,
    stages: Mutex<Vec<ProvisionStage>>,
}

impl ProvisionContext {
    /// 回显到 stdout/stderr
    pub fn new() -> Self {
        Self::with_echo(true)
    }

    /// 只记录，不回显（测试用）
    pub fn quiet() -> Self {
        Self::with_echo(false)
    }

    fn with_echo(echo: bool) -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            echo,
            lines: Mutex::new(Vec::new()),
            stages: Mutex::new(Vec::new()),
        }
    }

    /// 记录一行日志，需要时回显
    pub async fn log(&self, line: LogLine) {
        if self.echo {
            if line.stream == "stderr" {
                eprintln!("{}", line.content);
            } else {
                println!("{}", line.content);
            }
        }

        self.lines.lock().await.push(line);
    }

    /// 发送 stdout 日志
    pub async fn log_stdout(&self, content: &str) {
        self.log(LogLine::stdout(content)).await;
    }

    /// 发送 stderr 日志
    pub async fn log_stderr(&self, content: &str) {
        self.log(LogLine::stderr(content)).await;
    }

    /// 更新阶段快照
    pub async fn update_stages(&self, stages: &[ProvisionStage]) {
        *self.stages.lock().await = stages.to_vec();
    }

    /// 最近一次的阶段快照（失败时也可取到）
    pub async fn stages(&self) -> Vec<ProvisionStage> {
        self.stages.lock().await.clone()
    }

    /// 已记录的所有行
    pub async fn lines(&self) -> Vec<LogLine> {
        self.lines.lock().await.clone()
    }

    /// 已记录的 stdout 内容
    pub async fn stdout(&self) -> Vec<String> {
        self.lines
            .lock()
            .await
            .iter()
            .filter(|l| l.stream == "stdout")
            .map(|l| l.content.clone())
            .collect()
    }
}

impl Default for ProvisionContext {
    fn default() -> Self {
        Self::new()
    }
}
