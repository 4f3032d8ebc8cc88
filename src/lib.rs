//! # Highlight Batch
//!
//! 批量调度 CAST Highlight 代码分析的 Rust 应用程序
//!
//! 读取仓库列表，为每个仓库在 Highlight 中创建应用，
//! 然后用 Docker 运行分析器镜像，最后汇总每个仓库的结果。
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有外部资源（docker 进程、系统信号），只暴露能力
//! - `ContainerEngine` - 容器引擎抽象，`DockerCli` 为默认实现
//! - `ShutdownSignal` - 中断信号
//!
//! ### ② 业务能力层（Services / Clients）
//! - `ApplicationRegistrar` - 远程应用注册能力，`HighlightClient` 为默认实现
//! - `ContainerRunner` - 运行一次分析容器并保证清理
//! - `ProgressSink` - 进度通知
//!
//! ### ③ 流程层（Workflow）
//! - `RepositoryCtx` - 上下文封装（序号 + 仓库名）
//! - `RepositoryFlow` - 流程编排（校验 → 注册 → 分析）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/batch_processor` - 批量仓库处理器，顺序执行并生成报告
//!
//! ## 模块结构

pub mod clients;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use clients::HighlightClient;
pub use config::Config;
pub use error::{AppError, AppResult};
pub use infrastructure::{ContainerEngine, DockerCli, ShutdownSignal};
pub use models::{BatchReport, FailureStage, RepositoryDescriptor, RunOutcome};
pub use orchestrator::{App, BatchOrchestrator};
pub use services::{AnalysisRunner, ApplicationRegistrar, ContainerRunner, ProgressSink};
pub use workflow::{RepositoryCtx, RepositoryFlow};
