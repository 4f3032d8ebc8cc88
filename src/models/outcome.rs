use serde::{Deserialize, Serialize};
use std::fmt;

/// 远程服务中的应用
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationRef {
    pub id: String,
    pub name: String,
}

/// 失败发生在哪个阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureStage {
    /// 描述校验或远程注册
    Registration,
    /// 容器没能启动，分析从未运行
    ContainerLaunch,
    /// 容器运行了但失败
    ContainerExecution,
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FailureStage::Registration => "Registration",
            FailureStage::ContainerLaunch => "ContainerLaunch",
            FailureStage::ContainerExecution => "ContainerExecution",
        };
        f.write_str(label)
    }
}

/// 单个仓库完整流程（注册 + 容器分析）的结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    Success { duration_ms: u64 },
    Failure { stage: FailureStage, message: String },
}

impl RunOutcome {
    pub fn failure(stage: FailureStage, message: impl Into<String>) -> Self {
        RunOutcome::Failure {
            stage,
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Success { .. })
    }

    pub fn stage(&self) -> Option<FailureStage> {
        match self {
            RunOutcome::Success { .. } => None,
            RunOutcome::Failure { stage, .. } => Some(*stage),
        }
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunOutcome::Success { duration_ms } => {
                write!(f, "✓ 成功 (耗时 {:.1}s)", *duration_ms as f64 / 1000.0)
            }
            RunOutcome::Failure { stage, message } => write!(f, "✗ 失败 [{}] {}", stage, message),
        }
    }
}
