//! 基础设施模块
//!
//! 封装外部依赖（CloudFormation、账号 API、模板文件）

pub mod accounts_api;
pub mod cloudformation;
pub mod template;

pub use accounts_api::{AccountsApiClient, AccountsService};
pub use cloudformation::{CloudFormationClient, StackService};
