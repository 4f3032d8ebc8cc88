use thiserror::Error;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 仓库列表加载错误
    #[error("加载错误: {0}")]
    Load(#[from] LoadError),
    /// 仓库描述不合法
    #[error("仓库描述错误: {0}")]
    Descriptor(#[from] DescriptorError),
    /// 远程应用注册错误
    #[error("注册错误: {0}")]
    Registration(#[from] RegistrationError),
    /// 容器相关错误
    #[error("容器错误: {0}")]
    Container(#[from] ContainerError),
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 必填项缺失
    #[error("缺少必填配置项 {key}")]
    Missing { key: String },
    /// 配置值不合法
    #[error("配置项 {key} 的值 '{value}' 不合法: {reason}")]
    Invalid {
        key: String,
        value: String,
        reason: String,
    },
    /// 环境变量解析失败
    #[error("环境变量 {var_name} 解析失败: 值 '{value}' 无法转换为 {expected_type}")]
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },
    /// 读取配置文件失败
    #[error("读取配置文件失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// `.env` 文件格式错误
    #[error(".env 文件解析失败: {source}")]
    DotenvFailed {
        #[source]
        source: dotenvy::Error,
    },
    /// TOML 解析失败
    #[error("TOML解析失败 ({path}): {source}")]
    TomlParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

/// 仓库列表加载错误
#[derive(Debug, Error)]
pub enum LoadError {
    /// 文件不存在
    #[error("文件不存在: {path}")]
    NotFound { path: String },
    /// 读取文件失败
    #[error("读取文件失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// JSON 解析失败
    #[error("JSON解析失败 ({path}): {source}")]
    JsonParseFailed {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// 仓库描述校验错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DescriptorError {
    #[error("仓库名称为空")]
    EmptyName,
    #[error("仓库名称 '{0}' 不能用作目录名")]
    UnsafeName(String),
    #[error("仓库地址 '{0}' 不是合法的 git URL")]
    InvalidUrl(String),
}

/// 远程应用注册失败
///
/// `code` 为 HTTP 状态码；超时或网络错误时为 `None`。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", describe_registration(*code, body))]
pub struct RegistrationError {
    pub code: Option<u16>,
    pub body: String,
}

impl RegistrationError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            code: None,
            body: message.into(),
        }
    }

    pub fn status(code: u16, body: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            body: body.into(),
        }
    }
}

fn describe_registration(code: Option<u16>, body: &str) -> String {
    match code {
        Some(code) => format!("HTTP {}: {}", code, body),
        None => format!("请求未完成: {}", body),
    }
}

/// 容器错误
///
/// `Launch` 表示分析从未开始（镜像缺失、Docker 守护进程不可达），
/// `Execution` 表示容器已经运行但过程出错。
#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("容器启动失败: {0}")]
    Launch(String),
    #[error("容器执行失败: {0}")]
    Execution(String),
    #[error("IO错误 ({context}): {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl ContainerError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        ContainerError::Io {
            context: context.into(),
            source,
        }
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
