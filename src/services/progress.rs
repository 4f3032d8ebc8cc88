//! 进度输出 - 业务能力层
//!
//! 编排层只通过 `ProgressSink` 报告进度，不直接依赖终端。

use tracing::{error, info};

/// 进度接收方
pub trait ProgressSink: Send + Sync {
    /// 开始处理某个仓库
    fn start(&self, label: &str);
    /// 处理中的一条消息（例如分析器的一行输出）
    fn update(&self, label: &str, message: &str);
    /// 结束处理，`success` 决定使用 ✓ 还是 ✗
    fn stop(&self, label: &str, success: bool, summary: &str);
}

/// 默认实现：全部写入 tracing 日志
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingProgress;

impl ProgressSink for TracingProgress {
    fn start(&self, label: &str) {
        info!("[{}] ▶ starting {}", label, label);
    }

    fn update(&self, label: &str, message: &str) {
        info!(target: "analyzer", "[{}] │ {}", label, message);
    }

    fn stop(&self, label: &str, success: bool, summary: &str) {
        if success {
            info!("[{}] finished {}: {}", label, label, summary);
        } else {
            error!("[{}] finished {}: {}", label, label, summary);
        }
    }
}
