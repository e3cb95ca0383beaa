//! 领域模型模块
//!
//! 纯数据结构，不依赖 AWS SDK / reqwest

pub mod provision;
pub mod stack;
pub mod workspace;

pub use provision::{LogLine, ProvisionReport, ProvisionStage, StageStatus};
pub use stack::{
    DeploymentResult, DeploymentUnit, Parameter, StackStatus, StackSummary, StatusSnapshot,
    UnitKind, WaitPolicy,
};
pub use workspace::{Credentials, ObjectKind, RegisteredObject, WorkspaceSpec, WorkspaceStatus};
