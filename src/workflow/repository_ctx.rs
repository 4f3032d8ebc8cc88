//! 仓库处理上下文
//!
//! 封装"我正在处理第几个仓库"这一信息

use std::fmt::Display;

/// 仓库处理上下文
#[derive(Debug, Clone)]
pub struct RepositoryCtx {
    /// 仓库名称
    pub name: String,

    /// 在批次中的序号（从1开始，仅用于日志显示）
    pub index: usize,

    /// 批次中的仓库总数
    pub total: usize,
}

impl RepositoryCtx {
    pub fn new(name: impl Into<String>, index: usize, total: usize) -> Self {
        Self {
            name: name.into(),
            index,
            total,
        }
    }
}

impl Display for RepositoryCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[仓库 {}/{} {}]", self.index, self.total, self.name)
    }
}
