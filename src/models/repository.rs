use crate::error::DescriptorError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::OnceLock;

/// 待分析的仓库
///
/// 输入文件中的形状为 `{ "name": ..., "repositoryLocation": { "url": ... } }`。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawRepository", into = "RawRepository")]
pub struct RepositoryDescriptor {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRepository {
    name: String,
    repository_location: RepositoryLocation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RepositoryLocation {
    url: String,
}

impl From<RawRepository> for RepositoryDescriptor {
    fn from(raw: RawRepository) -> Self {
        Self {
            name: raw.name,
            url: raw.repository_location.url,
        }
    }
}

impl From<RepositoryDescriptor> for RawRepository {
    fn from(descriptor: RepositoryDescriptor) -> Self {
        Self {
            name: descriptor.name,
            repository_location: RepositoryLocation {
                url: descriptor.url,
            },
        }
    }
}

fn git_url_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"^(?:(?:https?|ssh|git|file)://[^\s/]*(?:/[^\s]*)?[^\s/]|[A-Za-z0-9._-]+@[A-Za-z0-9.-]+:[^\s]+)$",
        )
        .expect("git URL pattern is valid")
    })
}

impl RepositoryDescriptor {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }

    /// 校验名称和地址
    ///
    /// 名称会被用作输出子目录和 `--mount` 的一部分，
    /// 因此不允许路径分隔符、`.`/`..` 以及 `,` `"`。
    pub fn validate(&self) -> Result<(), DescriptorError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(DescriptorError::EmptyName);
        }
        if name == "."
            || name == ".."
            || name.contains(['/', '\\', ',', '"'])
            || name != self.name
        {
            return Err(DescriptorError::UnsafeName(self.name.clone()));
        }
        if !git_url_pattern().is_match(self.url.trim()) {
            return Err(DescriptorError::InvalidUrl(self.url.clone()));
        }
        Ok(())
    }
}

impl From<&Value> for RepositoryDescriptor {
    /// 宽松转换：缺失或类型不对的字段留空，交给 `validate` 判定
    fn from(value: &Value) -> Self {
        let name = value.get("name").and_then(Value::as_str).unwrap_or_default();
        let url = value
            .get("repositoryLocation")
            .and_then(|location| location.get("url"))
            .and_then(Value::as_str)
            .unwrap_or_default();
        Self::new(name, url)
    }
}

impl std::fmt::Display for RepositoryDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.url)
    }
}

/// 输入文件整体结构
///
/// 只要求外层结构正确；单个条目不合法时仍会保留，由编排层记为失败。
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RepositoryList {
    Wrapped { repositories: Vec<Value> },
    Bare(Vec<Value>),
}

impl RepositoryList {
    pub fn into_vec(self) -> Vec<RepositoryDescriptor> {
        let entries = match self {
            RepositoryList::Wrapped { repositories } => repositories,
            RepositoryList::Bare(repositories) => repositories,
        };
        entries.iter().map(RepositoryDescriptor::from).collect()
    }
}
