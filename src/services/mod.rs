//! 服务层模块
//!
//! 包含核心业务逻辑：stack 部署、输出提取、控制面注册与整体编排

pub mod context;
pub mod output_extractor;
pub mod provisioner;
pub mod stack_deployer;
pub mod workspace_registrar;

#[cfg(test)]
pub mod fakes;

pub use context::ProvisionContext;
pub use provisioner::Provisioner;
pub use stack_deployer::{StackDeployer, StackDeployment};
pub use workspace_registrar::WorkspaceRegistrar;
