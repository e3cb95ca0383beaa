//! 环境变量读取与常量

/// 账号 API 用户名
pub const ENV_ACCOUNT_USER: &str = "DATABRICKS_ACCOUNT_USER";
/// 账号 API 密码
pub const ENV_ACCOUNT_PASSWORD: &str = "DATABRICKS_ACCOUNT_PASSWORD";
/// 旧名称，兼容 databricks-cli 的变量
pub const ENV_ACCOUNT_USER_FALLBACK: &str = "DATABRICKS_USERNAME";
pub const ENV_ACCOUNT_PASSWORD_FALLBACK: &str = "DATABRICKS_PASSWORD";
/// 配置文件路径
pub const ENV_CONFIG_PATH: &str = "DBX_PROVISION_CONFIG";

/// 先查主变量，再查 fallback；空值视为未设置
pub fn lookup_with_fallback<F>(lookup: F, primary: &str, fallback: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(primary)
        .filter(|v| !v.is_empty())
        .or_else(|| lookup(fallback).filter(|v| !v.is_empty()))
}

/// 常量
pub mod constants {
    /// 默认配置文件
    pub const DEFAULT_CONFIG_PATH: &str = "./common_params.json";

    /// 账号 API 地址
    pub const DEFAULT_ACCOUNTS_HOST: &str = "https://accounts.cloud.databricks.com";

    /// Stack 轮询间隔（秒）
    pub const STACK_POLL_DELAY_SECS: u64 = 10;

    /// 各 stack 最大轮询次数
    pub const NETWORK_STACK_MAX_ATTEMPTS: u32 = 90;
    pub const IDENTITY_STACK_MAX_ATTEMPTS: u32 = 60;
    pub const STORAGE_STACK_MAX_ATTEMPTS: u32 = 90;
    pub const KEY_STACK_MAX_ATTEMPTS: u32 = 90;

    /// Workspace 状态轮询间隔（秒）
    pub const WORKSPACE_POLL_DELAY_SECS: u64 = 5;

    /// HTTP 请求超时（秒）
    pub const HTTP_TIMEOUT_SECS: u64 = 30;

    /// Workspace URL 组成部分
    pub const WORKSPACE_URL_SCHEME: &str = "https";
    pub const WORKSPACE_DOMAIN_SUFFIX: &str = ".cloud.databricks.com";

    /// 别名输出需要去掉的前缀长度（"alias/"）
    pub const KEY_ALIAS_PREFIX_LEN: usize = 6;

    /// 版本号
    pub const VERSION: &str = env!("CARGO_PKG_VERSION");
}
