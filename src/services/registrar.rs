//! 远程应用注册能力 - 业务能力层
//!
//! 只描述"为一个仓库创建远程应用"，HTTP 细节在 `clients::HighlightClient`。

use crate::config::Config;
use crate::error::RegistrationError;
use crate::models::{ApplicationRef, RepositoryDescriptor};
use async_trait::async_trait;

/// 远程应用注册
///
/// 约定：
/// - 每次调用只发一次请求，不重试
/// - 同名重复注册交给远程服务处理，本地不去重
#[async_trait]
pub trait ApplicationRegistrar: Send + Sync {
    async fn create_application(
        &self,
        descriptor: &RepositoryDescriptor,
        config: &Config,
    ) -> Result<ApplicationRef, RegistrationError>;
}
