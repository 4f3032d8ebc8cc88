//! 批量仓库处理器 - 编排层
//!
//! ## 职责
//!
//! 本模块是整个应用的入口，负责批量仓库的处理和资源管理。
//!
//! ## 核心功能
//!
//! 1. **应用初始化**：运行日志、Docker 引擎、Highlight 客户端
//! 2. **批量加载**：读取仓库列表（`Vec<RepositoryDescriptor>`）
//! 3. **顺序处理**：一次只处理一个仓库，等当前容器结束后再处理下一个
//! 4. **失败隔离**：任何仓库的失败只记录为该仓库的结果，不中断批次
//! 5. **中断处理**：收到中断信号后停止当前容器，剩余仓库不再处理
//! 6. **全局统计**：汇总为 `BatchReport`
//!
//! ## 设计特点
//!
//! - **顶层编排**：不处理单个仓库的细节，委托给 `RepositoryFlow`
//! - **单写者**：报告只在本模块中追加

use crate::clients::HighlightClient;
use crate::config::Config;
use crate::infrastructure::{DockerCli, ShutdownSignal};
use crate::models::{load_repositories, BatchReport, RepositoryDescriptor};
use crate::services::{
    AnalysisRunner, ApplicationRegistrar, ContainerRunner, ProgressSink, TracingProgress,
};
use crate::utils::logging;
use crate::workflow::{RepositoryCtx, RepositoryFlow};
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

/// 批量编排器
pub struct BatchOrchestrator {
    flow: RepositoryFlow,
    progress: Arc<dyn ProgressSink>,
    shutdown: ShutdownSignal,
    run_log: Option<PathBuf>,
}

impl BatchOrchestrator {
    pub fn new(
        registrar: Arc<dyn ApplicationRegistrar>,
        runner: Arc<dyn AnalysisRunner>,
        progress: Arc<dyn ProgressSink>,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self {
            flow: RepositoryFlow::new(registrar, runner),
            progress,
            shutdown,
            run_log: None,
        }
    }

    /// 每个仓库结束后把结果追加到运行日志
    pub fn with_run_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.run_log = Some(path.into());
        self
    }

    /// 按输入顺序逐个处理仓库
    ///
    /// 未被中断时，报告条目数与输入数量相同且一一对应。
    pub async fn run(&self, repositories: &[RepositoryDescriptor], config: &Config) -> BatchReport {
        let total = repositories.len();
        let mut report = BatchReport::new();

        for (idx, descriptor) in repositories.iter().enumerate() {
            if self.shutdown.is_triggered() {
                warn!(
                    "⚠️ 运行已中断，剩余 {} 个仓库不再处理",
                    total - idx
                );
                break;
            }

            let ctx = RepositoryCtx::new(&descriptor.name, idx + 1, total);
            log_repository_start(&ctx, descriptor);
            self.progress.start(&descriptor.name);

            let outcome = self.flow.run(descriptor, &ctx, config).await;

            report.push(descriptor.clone(), outcome.clone());
            self.progress
                .stop(&descriptor.name, outcome.is_success(), &outcome.to_string());

            if let Some(path) = &self.run_log {
                if let Err(e) = logging::append_outcome(path, descriptor, &outcome) {
                    warn!("{} ⚠️ 写入运行日志失败: {}", ctx, e);
                }
            }
        }

        report.finish(self.shutdown.is_triggered())
    }
}

/// 应用主结构
pub struct App {
    config: Config,
    input_path: PathBuf,
    orchestrator: BatchOrchestrator,
}

impl App {
    /// 初始化应用
    pub async fn initialize(
        config: Config,
        input_path: impl Into<PathBuf>,
        shutdown: ShutdownSignal,
    ) -> Result<Self> {
        let log_file = config.log_file_path();

        // 初始化运行日志
        logging::init_log_file(&log_file)
            .with_context(|| format!("无法创建运行日志: {}", log_file.display()))?;

        logging::log_startup(&config);

        let progress: Arc<dyn ProgressSink> = Arc::new(TracingProgress);
        let runner = ContainerRunner::new(
            Arc::new(DockerCli::new()),
            progress.clone(),
            shutdown.clone(),
        );
        let orchestrator = BatchOrchestrator::new(
            Arc::new(HighlightClient::new()),
            Arc::new(runner),
            progress,
            shutdown,
        )
        .with_run_log(log_file);

        Ok(Self {
            config,
            input_path: input_path.into(),
            orchestrator,
        })
    }

    /// 运行应用主逻辑
    ///
    /// 只有仓库列表无法读取时返回错误；单个仓库的失败体现在报告中。
    pub async fn run(&self) -> Result<BatchReport> {
        // 加载所有待分析的仓库
        let repositories = self.load_repositories().await?;

        if repositories.is_empty() {
            warn!("⚠️ 仓库列表为空，没有需要分析的仓库");
        } else {
            logging::log_repositories_loaded(repositories.len());
        }

        let report = self.orchestrator.run(&repositories, &self.config).await;

        // 输出最终统计
        let log_file = self.config.log_file_path();
        if let Err(e) = logging::append_summary(&log_file, &report) {
            warn!("⚠️ 写入运行日志失败: {}", e);
        }
        logging::print_final_stats(&report, &log_file);

        if let Some(path) = &self.config.output.report_file {
            match report.write_json(path).await {
                Ok(()) => info!("📄 JSON 报告已保存至: {}", path.display()),
                Err(e) => error!("✗ 写入 JSON 报告失败 ({}): {}", path.display(), e),
            }
        }

        Ok(report)
    }

    /// 加载仓库列表
    async fn load_repositories(&self) -> Result<Vec<RepositoryDescriptor>> {
        info!("\n📁 正在读取仓库列表: {}", self.input_path.display());
        let repositories = load_repositories(&self.input_path).await?;
        Ok(repositories)
    }
}

// ========== 日志辅助函数 ==========

fn log_repository_start(ctx: &RepositoryCtx, descriptor: &RepositoryDescriptor) {
    info!("\n{}", "─".repeat(60));
    info!("{} 开始处理", ctx);
    info!("{} 地址: {}", ctx, descriptor.url);
}
