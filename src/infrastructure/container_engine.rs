//! 容器引擎 - 基础设施层
//!
//! 只暴露"检查镜像 / 运行容器 / 删除容器"三个能力，
//! 不认识仓库、应用或分析结果。

use crate::error::ContainerError;
use async_trait::async_trait;
use std::path::PathBuf;

/// 挂载卷
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeMount {
    /// 宿主机上的绝对路径
    pub host: PathBuf,
    pub container: String,
}

/// 传入容器的环境变量
///
/// `secret` 为 true 时值不会出现在命令行参数里。
#[derive(Clone, PartialEq, Eq)]
pub struct EnvVar {
    pub name: String,
    pub value: String,
    pub secret: bool,
}

impl EnvVar {
    pub fn plain(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            secret: false,
        }
    }

    pub fn secret(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            secret: true,
        }
    }
}

impl std::fmt::Debug for EnvVar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let value = if self.secret { "***" } else { &self.value };
        write!(f, "{}={}", self.name, value)
    }
}

/// 一次容器调用的完整描述
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerInvocation {
    pub container_name: String,
    pub image: String,
    pub volumes: Vec<VolumeMount>,
    pub env: Vec<EnvVar>,
    /// 传给镜像入口程序的参数
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// 容器输出的一行
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLine {
    pub stream: OutputStream,
    pub text: String,
}

/// 运行期间的事件回调
pub trait ContainerEvents: Send + Sync {
    /// 进程已经启动
    fn started(&self);
    /// 收到一行输出（到达即回调，不缓冲）
    fn output(&self, line: OutputLine);
}

/// 容器引擎
#[async_trait]
pub trait ContainerEngine: Send + Sync {
    /// 镜像是否存在于本地
    ///
    /// 引擎本身不可用（守护进程不可达等）时返回 `ContainerError::Launch`。
    async fn image_exists(&self, image: &str) -> Result<bool, ContainerError>;

    /// 启动容器并等待其退出，返回退出码
    ///
    /// 无法启动时返回 `ContainerError::Launch`，此时不会回调 `started`。
    /// 返回的 future 被丢弃时必须终止本地进程。
    async fn run(
        &self,
        invocation: &ContainerInvocation,
        events: &dyn ContainerEvents,
    ) -> Result<i32, ContainerError>;

    /// 强制删除容器（正在运行时先停止），容器不存在视为成功
    async fn remove(&self, container_name: &str) -> Result<(), ContainerError>;
}
