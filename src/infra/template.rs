//! 模板与参数文件读取
//!
//! 模板内容不做解析，原样提交；参数文件是 `[{ParameterKey, ParameterValue}]` 列表

use std::path::Path;

use crate::config::TemplateFiles;
use crate::domain::stack::{DeploymentUnit, Parameter, UnitKind};
use crate::error::{ProvisionError, ProvisionResult};

/// 读取模板正文
pub async fn read_template(path: &Path) -> ProvisionResult<String> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ProvisionError::Io {
            path: path.to_path_buf(),
            source,
        })
}

/// 读取参数文件
pub async fn read_parameters(path: &Path) -> ProvisionResult<Vec<Parameter>> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ProvisionError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    serde_json::from_str(&raw).map_err(|e| {
        ProvisionError::config(format!("invalid parameter file {}: {}", path.display(), e))
    })
}

/// 读取一个部署单元的模板与参数
pub async fn load_unit(
    kind: UnitKind,
    name: &str,
    files: &TemplateFiles,
) -> ProvisionResult<DeploymentUnit> {
    let template = read_template(&files.template).await?;
    let parameters = read_parameters(&files.parameters).await?;
    Ok(DeploymentUnit::new(kind, name, template).with_parameters(parameters))
}
