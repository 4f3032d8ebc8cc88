//! 仓库处理流程 - 流程层
//!
//! 核心职责：定义"一个仓库"的完整处理流程
//!
//! 流程顺序：
//! 1. 校验仓库描述
//! 2. 在远程服务中创建应用
//! 3. 运行分析容器
//!
//! 每一步的错误都转换成 `RunOutcome::Failure`，不会向上传播。

use crate::config::Config;
use crate::models::{FailureStage, RepositoryDescriptor, RunOutcome};
use crate::services::{AnalysisRunner, ApplicationRegistrar};
use crate::workflow::repository_ctx::RepositoryCtx;
use std::sync::Arc;
use tracing::{error, info};

/// 仓库处理流程
///
/// - 决定何时注册、何时启动容器
/// - 注册失败时不启动容器
/// - 不持有任何资源，只依赖业务能力（services）
pub struct RepositoryFlow {
    registrar: Arc<dyn ApplicationRegistrar>,
    runner: Arc<dyn AnalysisRunner>,
}

impl RepositoryFlow {
    pub fn new(registrar: Arc<dyn ApplicationRegistrar>, runner: Arc<dyn AnalysisRunner>) -> Self {
        Self { registrar, runner }
    }

    pub async fn run(
        &self,
        descriptor: &RepositoryDescriptor,
        ctx: &RepositoryCtx,
        config: &Config,
    ) -> RunOutcome {
        // ========== 步骤 1: 校验 ==========
        if let Err(e) = descriptor.validate() {
            error!("{} ✗ 仓库描述不合法: {}", ctx, e);
            return RunOutcome::failure(
                FailureStage::Registration,
                format!("invalid descriptor: {}", e),
            );
        }

        // ========== 步骤 2: 注册远程应用 ==========
        info!("{} 📝 正在注册远程应用...", ctx);
        let application = match self.registrar.create_application(descriptor, config).await {
            Ok(application) => application,
            Err(e) => {
                error!("{} ✗ 注册应用失败: {}", ctx, e);
                return RunOutcome::failure(FailureStage::Registration, e.to_string());
            }
        };
        info!(
            "{} ✓ 应用 '{}' 已就绪 (ID: {})",
            ctx, application.name, application.id
        );

        // ========== 步骤 3: 运行分析容器 ==========
        info!("{} 🔍 开始分析 {} (可能需要几分钟)...", ctx, descriptor.url);
        self.runner.run(descriptor, &application, config).await
    }
}
