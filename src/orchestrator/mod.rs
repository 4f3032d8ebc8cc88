//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责批量处理和流程调度，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `batch_processor` - 批量仓库处理器
//! - 管理应用生命周期（初始化、运行、收尾）
//! - 批量加载仓库列表（Vec<RepositoryDescriptor>）
//! - 严格顺序处理，同一时刻最多一个分析容器
//! - 监听中断信号
//! - 输出全局统计信息和 JSON 报告
//!
//! ## 层次关系
//!
//! ```text
//! batch_processor (处理 Vec<RepositoryDescriptor>)
//!     ↓
//! workflow::RepositoryFlow (处理单个仓库)
//!     ↓
//! services (能力层：registrar / container_runner / progress)
//!     ↓
//! infrastructure (基础设施：ContainerEngine / ShutdownSignal)
//! ```
//!
//! ## 设计原则
//!
//! 1. **资源隔离**：只有编排层创建 Docker 引擎和 HTTP 客户端
//! 2. **向下依赖**：编排层 → workflow → services → infrastructure
//! 3. **无业务逻辑**：只做调度和统计，不做具体业务判断

pub mod batch_processor;

// 重新导出主要类型
pub use batch_processor::{App, BatchOrchestrator};
