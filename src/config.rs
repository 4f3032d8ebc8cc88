use crate::error::ConfigError;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// 默认配置文件名
pub const DEFAULT_CONFIG_FILE: &str = "highlight.toml";

/// 程序配置
///
/// 启动时解析一次，之后以只读引用传给各组件。
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub cast: CastConfig,
    pub github: GithubConfig,
    pub output: OutputConfig,
}

/// CAST Highlight 相关配置
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct CastConfig {
    /// REST API 根地址
    #[serde(alias = "baseUrl")]
    pub base_url: String,
    /// 公司（domain）ID
    #[serde(alias = "companyId", deserialize_with = "deserialize_id")]
    pub company_id: String,
    /// Bearer token，优先于 login/password
    pub token: Option<String>,
    pub login: Option<String>,
    pub password: Option<String>,
    /// 分析器 CLI 镜像
    #[serde(alias = "dockerImage")]
    pub docker_image: String,
    /// 远程应用名 = 仓库名 + 后缀
    #[serde(alias = "applicationSuffix")]
    pub application_suffix: String,
    #[serde(alias = "httpTimeoutSecs")]
    pub http_timeout_secs: u64,
    /// 单个仓库分析的最长时间，未设置或为 0 表示不限制
    #[serde(alias = "analysisTimeoutSecs")]
    pub analysis_timeout_secs: Option<u64>,
    /// 失败时附带的输出行数
    #[serde(alias = "outputTailLines")]
    pub output_tail_lines: usize,
}

impl Default for CastConfig {
    fn default() -> Self {
        Self {
            base_url: "https://rpa.casthighlight.com/WS2".to_string(),
            company_id: String::new(),
            token: None,
            login: None,
            password: None,
            docker_image: String::new(),
            application_suffix: "-analysis".to_string(),
            http_timeout_secs: 30,
            analysis_timeout_secs: None,
            output_tail_lines: 20,
        }
    }
}

/// GitHub 配置（克隆私有仓库时使用）
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct GithubConfig {
    pub token: Option<String>,
}

/// 输出目录配置
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// 每个仓库在该目录下拥有 `<name>/` 子目录
    #[serde(alias = "baseDir")]
    pub base_dir: PathBuf,
    /// 运行日志，默认 `<base_dir>/run.log`
    #[serde(alias = "logFile")]
    pub log_file: Option<PathBuf>,
    /// JSON 报告，未设置则不写
    #[serde(alias = "reportFile")]
    pub report_file: Option<PathBuf>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("highlight_output"),
            log_file: None,
            report_file: None,
        }
    }
}

/// `.env` 不存在是正常情况，格式错误则视为配置错误
fn check_dotenv<T>(result: Result<T, dotenvy::Error>) -> Result<(), ConfigError> {
    match result {
        Ok(_) => Ok(()),
        Err(e) if e.not_found() => Ok(()),
        Err(source) => Err(ConfigError::DotenvFailed { source }),
    }
}

impl Config {
    /// 解析完整配置：`.env` → 配置文件 → 环境变量覆盖 → 校验
    ///
    /// `path` 为 `None` 时读取当前目录下的 `highlight.toml`（不存在则只用默认值和环境变量）。
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        check_dotenv(dotenvy::dotenv())?;

        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// 从 TOML 文件读取
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::TomlParseFailed {
            path: path.display().to_string(),
            source,
        })
    }

    /// 用环境变量覆盖配置项
    ///
    /// `lookup` 便于测试时不修改进程环境。
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("CAST_BASE_URL") {
            self.cast.base_url = v;
        }
        if let Some(v) = lookup("CAST_COMPANY_ID") {
            self.cast.company_id = v;
        }
        if let Some(v) = lookup("CAST_TOKEN") {
            self.cast.token = Some(v);
        }
        if let Some(v) = lookup("CAST_LOGIN") {
            self.cast.login = Some(v);
        }
        if let Some(v) = lookup("CAST_PASSWORD") {
            self.cast.password = Some(v);
        }
        if let Some(v) = lookup("CAST_DOCKER_IMAGE") {
            self.cast.docker_image = v;
        }
        if let Some(v) = lookup("CAST_HTTP_TIMEOUT_SECS") {
            self.cast.http_timeout_secs = parse_env("CAST_HTTP_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = lookup("CAST_ANALYSIS_TIMEOUT_SECS") {
            self.cast.analysis_timeout_secs = Some(parse_env("CAST_ANALYSIS_TIMEOUT_SECS", &v)?);
        }
        if let Some(v) = lookup("GITHUB_TOKEN") {
            self.github.token = Some(v);
        }
        if let Some(v) = lookup("OUTPUT_BASE_DIR") {
            self.output.base_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("OUTPUT_LOG_FILE") {
            self.output.log_file = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("OUTPUT_REPORT_FILE") {
            self.output.report_file = Some(PathBuf::from(v));
        }
        Ok(())
    }

    /// 校验必填项
    pub fn validate(&self) -> Result<(), ConfigError> {
        require("cast.base_url", &self.cast.base_url)?;
        require("cast.company_id", &self.cast.company_id)?;
        require("cast.docker_image", &self.cast.docker_image)?;

        if !self.cast.base_url.starts_with("http://") && !self.cast.base_url.starts_with("https://")
        {
            return Err(ConfigError::Invalid {
                key: "cast.base_url".to_string(),
                value: self.cast.base_url.clone(),
                reason: "必须以 http:// 或 https:// 开头".to_string(),
            });
        }

        if self.cast.company_id.trim().parse::<u64>().is_err() {
            return Err(ConfigError::Invalid {
                key: "cast.company_id".to_string(),
                value: self.cast.company_id.clone(),
                reason: "必须是数字".to_string(),
            });
        }

        let has_token = self.cast.token.as_deref().is_some_and(|t| !t.is_empty());
        let has_basic = self.cast.login.as_deref().is_some_and(|l| !l.is_empty())
            && self.cast.password.is_some();
        if !has_token && !has_basic {
            return Err(ConfigError::Missing {
                key: "cast.token (或 cast.login + cast.password)".to_string(),
            });
        }

        Ok(())
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.cast.http_timeout_secs)
    }

    pub fn analysis_timeout(&self) -> Option<Duration> {
        self.cast
            .analysis_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }

    pub fn log_file_path(&self) -> PathBuf {
        self.output
            .log_file
            .clone()
            .unwrap_or_else(|| self.output.base_dir.join("run.log"))
    }

    /// 某个仓库专属的输出根目录
    pub fn repository_dir(&self, repository_name: &str) -> PathBuf {
        self.output.base_dir.join(repository_name)
    }
}

fn require(key: &str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Missing {
            key: key.to_string(),
        });
    }
    Ok(())
}

fn parse_env<T: std::str::FromStr>(var_name: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::EnvVarParseFailed {
            var_name: var_name.to_string(),
            value: value.to_string(),
            expected_type: std::any::type_name::<T>().to_string(),
        })
}

// company_id 在 TOML 中既可以写成字符串也可以写成整数
fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Visitor;
    use std::fmt;

    struct IdVisitor;

    impl<'de> Visitor<'de> for IdVisitor {
        type Value = String;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a string or an integer")
        }

        fn visit_str<E>(self, value: &str) -> Result<String, E>
        where
            E: serde::de::Error,
        {
            Ok(value.to_string())
        }

        fn visit_i64<E>(self, value: i64) -> Result<String, E>
        where
            E: serde::de::Error,
        {
            Ok(value.to_string())
        }

        fn visit_u64<E>(self, value: u64) -> Result<String, E>
        where
            E: serde::de::Error,
        {
            Ok(value.to_string())
        }
    }

    deserializer.deserialize_any(IdVisitor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn valid_config() -> Config {
        let mut config = Config::default();
        config.cast.company_id = "1234".to_string();
        config.cast.token = Some("secret".to_string());
        config.cast.docker_image = "casthighlight/hl-agent-cli:latest".to_string();
        config
    }

    #[test]
    fn test_parse_toml_with_camel_case_keys() {
        let toml = r#"
            [cast]
            baseUrl = "https://example.test/WS2"
            companyId = 42
            token = "t"
            dockerImage = "img:1"

            [output]
            baseDir = "/tmp/out"
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.cast.base_url, "https://example.test/WS2");
        assert_eq!(config.cast.company_id, "42");
        assert_eq!(config.cast.docker_image, "img:1");
        assert_eq!(config.output.base_dir, PathBuf::from("/tmp/out"));
        // 未写的项保持默认值
        assert_eq!(config.cast.http_timeout_secs, 30);
        assert_eq!(config.cast.application_suffix, "-analysis");
    }

    #[test]
    fn test_parse_toml_with_snake_case_keys() {
        let toml = r#"
            [cast]
            base_url = "https://example.test"
            company_id = "77"
            login = "user"
            password = "pw"
            docker_image = "img"
            analysis_timeout_secs = 600
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.cast.company_id, "77");
        assert_eq!(config.analysis_timeout(), Some(Duration::from_secs(600)));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides_file_values() {
        let mut config = valid_config();
        let env: HashMap<&str, &str> = [
            ("CAST_COMPANY_ID", "999"),
            ("CAST_HTTP_TIMEOUT_SECS", "5"),
            ("OUTPUT_BASE_DIR", "/data/out"),
            ("GITHUB_TOKEN", "ghp"),
        ]
        .into_iter()
        .collect();

        config
            .apply_env(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.cast.company_id, "999");
        assert_eq!(config.http_timeout(), Duration::from_secs(5));
        assert_eq!(config.output.base_dir, PathBuf::from("/data/out"));
        assert_eq!(config.github.token.as_deref(), Some("ghp"));
    }

    #[test]
    fn test_env_parse_failure_is_reported() {
        let mut config = valid_config();
        let err = config
            .apply_env(|key| (key == "CAST_HTTP_TIMEOUT_SECS").then(|| "soon".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::EnvVarParseFailed { .. }));
    }

    #[test]
    fn test_validate_requires_credentials() {
        let mut config = valid_config();
        config.cast.token = None;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Missing { .. })
        ));

        config.cast.login = Some("user".to_string());
        config.cast.password = Some("pw".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_non_numeric_company() {
        let mut config = valid_config();
        config.cast.company_id = "acme".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn test_validate_requires_docker_image() {
        let mut config = valid_config();
        config.cast.docker_image = String::new();
        match config.validate() {
            Err(ConfigError::Missing { key }) => assert_eq!(key, "cast.docker_image"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_zero_analysis_timeout_means_unbounded() {
        let mut config = valid_config();
        config.cast.analysis_timeout_secs = Some(0);
        assert_eq!(config.analysis_timeout(), None);
    }

    #[test]
    fn test_from_file_reads_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[cast]\ncompany_id = 5\ntoken = \"x\"\ndocker_image = \"img\"\n"
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.cast.company_id, "5");
        assert_eq!(config.log_file_path(), PathBuf::from("highlight_output/run.log"));
    }

    #[test]
    fn test_missing_dotenv_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let result = dotenvy::from_path(dir.path().join(".env"));
        assert!(check_dotenv(result).is_ok());
    }

    #[test]
    fn test_malformed_dotenv_is_config_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "this is not valid").unwrap();

        let err = check_dotenv(dotenvy::from_path(file.path())).unwrap_err();
        assert!(matches!(err, ConfigError::DotenvFailed { .. }));
    }

    #[test]
    fn test_from_file_missing_is_read_error() {
        let err = Config::from_file(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::ReadFailed { .. }));
    }
}
