//! Stack 输出提取
//!
//! 每个 stack 对应一张固定的 `outputKey -> fieldName` 表。提取时单次遍历输出映射，
//! 与输出顺序无关；遍历结束后任一字段缺失或为空即为致命错误。

use std::collections::HashMap;
use tracing::info;

use crate::config::env::constants::KEY_ALIAS_PREFIX_LEN;
use crate::domain::stack::DeploymentResult;
use crate::error::{ProvisionError, ProvisionResult};

/// 字段取值方式
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transform {
    Verbatim,
    /// 丢弃前 N 个字符（纯文本截断，不检查前缀内容）
    DropChars(usize),
}

impl Transform {
    fn apply(&self, value: &str) -> String {
        match self {
            Transform::Verbatim => value.to_string(),
            Transform::DropChars(n) => value.chars().skip(*n).collect(),
        }
    }
}

/// 单个输出到字段的映射
#[derive(Clone, Copy, Debug)]
pub struct OutputField {
    pub output_key: &'static str,
    pub field: &'static str,
    pub transform: Transform,
}

const fn verbatim(output_key: &'static str, field: &'static str) -> OutputField {
    OutputField {
        output_key,
        field,
        transform: Transform::Verbatim,
    }
}

pub const NETWORK_OUTPUTS: &[OutputField] = &[
    verbatim("WorkspaceSecurityGroupOut", "security_group_id"),
    verbatim("Subnet1Out", "subnet1_id"),
    verbatim("Subnet2Out", "subnet2_id"),
];

pub const IDENTITY_OUTPUTS: &[OutputField] = &[verbatim("IAMRoleOut", "iam_role_arn")];

pub const STORAGE_OUTPUTS: &[OutputField] =
    &[verbatim("DBFSRootS3BucketOut", "s3_bucket_name_final")];

pub const KEY_OUTPUTS: &[OutputField] = &[
    verbatim("BYOKKMSKeyOut", "kms_key_arn"),
    OutputField {
        output_key: "BYOKKMSKeyAliasOut",
        field: "kms_key_alias",
        transform: Transform::DropChars(KEY_ALIAS_PREFIX_LEN),
    },
];

/// 提取结果：fieldName -> value
#[derive(Debug)]
pub struct Extracted {
    source: String,
    values: HashMap<&'static str, String>,
}

impl Extracted {
    /// 取必需字段（extract 已保证存在）
    fn take(&mut self, field: &str) -> ProvisionResult<String> {
        self.values
            .remove(field)
            .ok_or_else(|| ProvisionError::missing_field(&self.source, field))
    }
}

/// 按映射表提取
pub fn extract(result: &DeploymentResult, fields: &[OutputField]) -> ProvisionResult<Extracted> {
    let mut values = HashMap::with_capacity(fields.len());

    for (key, value) in &result.outputs {
        if let Some(spec) = fields.iter().find(|f| f.output_key == key.as_str()) {
            values.insert(spec.field, spec.transform.apply(value));
        }
    }

    let source = format!("stack {} outputs", result.name);
    for spec in fields {
        match values.get(spec.field) {
            Some(v) if !v.is_empty() => {
                info!(stack = %result.name, field = spec.field, value = %v, "Extracted stack output");
            }
            _ => return Err(ProvisionError::missing_field(&source, spec.field)),
        }
    }

    Ok(Extracted { source, values })
}

/// 提取完成后写到 stdout 的进度行
pub trait OutputSummary {
    fn summary_lines(&self) -> Vec<String>;
}

/// 网络 stack 输出
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NetworkOutputs {
    pub security_group_id: String,
    pub subnet1_id: String,
    pub subnet2_id: String,
}

impl NetworkOutputs {
    pub fn from_result(result: &DeploymentResult) -> ProvisionResult<Self> {
        let mut out = extract(result, NETWORK_OUTPUTS)?;
        Ok(Self {
            security_group_id: out.take("security_group_id")?,
            subnet1_id: out.take("subnet1_id")?,
            subnet2_id: out.take("subnet2_id")?,
        })
    }
}

impl OutputSummary for NetworkOutputs {
    fn summary_lines(&self) -> Vec<String> {
        vec![
            format!("Security group id is {}", self.security_group_id),
            format!("Subnet 1 id is {}", self.subnet1_id),
            format!("Subnet 2 id is {}", self.subnet2_id),
        ]
    }
}

/// IAM stack 输出
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IdentityOutputs {
    pub iam_role_arn: String,
}

impl IdentityOutputs {
    pub fn from_result(result: &DeploymentResult) -> ProvisionResult<Self> {
        let mut out = extract(result, IDENTITY_OUTPUTS)?;
        Ok(Self {
            iam_role_arn: out.take("iam_role_arn")?,
        })
    }
}

impl OutputSummary for IdentityOutputs {
    fn summary_lines(&self) -> Vec<String> {
        vec![format!("IAM role ARN is {}", self.iam_role_arn)]
    }
}

/// S3 stack 输出
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StorageOutputs {
    pub bucket_name: String,
}

impl StorageOutputs {
    pub fn from_result(result: &DeploymentResult) -> ProvisionResult<Self> {
        let mut out = extract(result, STORAGE_OUTPUTS)?;
        Ok(Self {
            bucket_name: out.take("s3_bucket_name_final")?,
        })
    }
}

impl OutputSummary for StorageOutputs {
    fn summary_lines(&self) -> Vec<String> {
        vec![format!("Final S3 bucket name is {}", self.bucket_name)]
    }
}

/// KMS stack 输出
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyOutputs {
    pub key_arn: String,
    /// 已去掉 "alias/"
    pub key_alias: String,
}

impl KeyOutputs {
    pub fn from_result(result: &DeploymentResult) -> ProvisionResult<Self> {
        let mut out = extract(result, KEY_OUTPUTS)?;
        Ok(Self {
            key_arn: out.take("kms_key_arn")?,
            key_alias: out.take("kms_key_alias")?,
        })
    }
}

impl OutputSummary for KeyOutputs {
    fn summary_lines(&self) -> Vec<String> {
        vec![
            format!("KMS Key ARN is {}", self.key_arn),
            format!("KMS Key Alias is {}", self.key_alias),
        ]
    }
}
