//! 配置模块
//!
//! 配置文件解析、环境变量覆盖与常量

pub mod env;
pub mod provision;

pub use provision::{AccountCredentials, PollingConfig, ProvisionConfig, Secret, TemplateFiles};
