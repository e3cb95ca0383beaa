//! Databricks workspace provisioner
//!
//! 部署四个 CloudFormation stack（network、IAM role、root bucket、KMS key），
//! 通过账号 API 注册对应对象并创建 workspace，轮询直到终态。

pub mod config;
pub mod domain;
pub mod error;
pub mod infra;
pub mod services;

pub use config::ProvisionConfig;
pub use error::{ProvisionError, ProvisionResult};
pub use services::{ProvisionContext, Provisioner};
