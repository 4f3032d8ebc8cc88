use crate::models::outcome::RunOutcome;
use crate::models::repository::RepositoryDescriptor;
use chrono::{DateTime, Local};
use serde::Serialize;
use std::path::Path;

/// 单个仓库的报告条目
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportEntry {
    pub repository: RepositoryDescriptor,
    pub outcome: RunOutcome,
}

/// 一次批量运行的报告
///
/// 条目顺序与输入顺序一致；只由编排层在运行期间追加，`finish` 之后不再修改。
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    entries: Vec<ReportEntry>,
    pub started_at: DateTime<Local>,
    pub finished_at: Option<DateTime<Local>>,
    /// 操作员中断后剩余仓库未处理
    pub interrupted: bool,
}

impl BatchReport {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            started_at: Local::now(),
            finished_at: None,
            interrupted: false,
        }
    }

    pub(crate) fn push(&mut self, repository: RepositoryDescriptor, outcome: RunOutcome) {
        self.entries.push(ReportEntry {
            repository,
            outcome,
        });
    }

    pub(crate) fn finish(mut self, interrupted: bool) -> Self {
        self.finished_at = Some(Local::now());
        self.interrupted = interrupted;
        self
    }

    pub fn entries(&self) -> &[ReportEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn success_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.outcome.is_success())
            .count()
    }

    pub fn failure_count(&self) -> usize {
        self.len() - self.success_count()
    }

    pub fn has_failures(&self) -> bool {
        self.failure_count() > 0
    }

    /// 进程退出码：全部成功为 0，否则为 1
    pub fn exit_code(&self) -> i32 {
        if self.has_failures() || self.interrupted {
            1
        } else {
            0
        }
    }

    /// 以 JSON 格式写出报告
    pub async fn write_json(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, json).await?;
        Ok(())
    }
}

impl Default for BatchReport {
    fn default() -> Self {
        Self::new()
    }
}
