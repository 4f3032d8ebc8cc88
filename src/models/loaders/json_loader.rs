use crate::error::LoadError;
use crate::models::repository::{RepositoryDescriptor, RepositoryList};
use std::path::Path;
use tokio::fs;

/// 从 JSON 文件加载仓库列表
///
/// 读不到或解析不了都是致命错误；单个仓库描述是否合法由编排层逐个判断。
pub async fn load_repositories(path: &Path) -> Result<Vec<RepositoryDescriptor>, LoadError> {
    if !path.exists() {
        return Err(LoadError::NotFound {
            path: path.display().to_string(),
        });
    }

    let content = fs::read_to_string(path)
        .await
        .map_err(|source| LoadError::ReadFailed {
            path: path.display().to_string(),
            source,
        })?;

    let list: RepositoryList =
        serde_json::from_str(&content).map_err(|source| LoadError::JsonParseFailed {
            path: path.display().to_string(),
            source,
        })?;

    let repositories = list.into_vec();
    tracing::info!(
        "正在加载: {} ({} 个仓库)",
        path.file_name().unwrap_or_default().to_string_lossy(),
        repositories.len()
    );

    Ok(repositories)
}
