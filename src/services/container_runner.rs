//! 容器分析服务 - 业务能力层
//!
//! 为单个仓库运行分析器容器：准备目录、检查镜像、启动容器、
//! 实时转发输出、把退出码映射为 `RunOutcome`，最后删除容器。

use crate::config::Config;
use crate::error::ContainerError;
use crate::infrastructure::{
    ContainerEngine, ContainerEvents, ContainerInvocation, EnvVar, OutputLine, ShutdownSignal,
    VolumeMount,
};
use crate::models::{ApplicationRef, FailureStage, RepositoryDescriptor, RunOutcome};
use crate::services::ProgressSink;
use async_trait::async_trait;
use regex::Regex;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Instant;
use tracing::{debug, info, warn};

/// 容器内的工作目录
pub const CONTAINER_WORKING_DIR: &str = "/workingDir";
/// 容器内的结果目录
pub const CONTAINER_OUTPUT_DIR: &str = "/output";
/// 容器内源码克隆目录
pub const CONTAINER_SOURCE_DIR: &str = "/source";

/// 单个仓库的分析能力
#[async_trait]
pub trait AnalysisRunner: Send + Sync {
    async fn run(
        &self,
        descriptor: &RepositoryDescriptor,
        application: &ApplicationRef,
        config: &Config,
    ) -> RunOutcome;
}

/// 单次调用的状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    NotStarted,
    Launching,
    Running,
    Completed,
    LaunchFailed,
    ExecutionFailed,
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RunState::Completed | RunState::LaunchFailed | RunState::ExecutionFailed
        )
    }

    /// 合法的状态迁移
    pub fn can_transition_to(self, next: RunState) -> bool {
        matches!(
            (self, next),
            (RunState::NotStarted, RunState::Launching)
                | (RunState::Launching, RunState::Running)
                | (RunState::Launching, RunState::LaunchFailed)
                | (RunState::Running, RunState::Completed)
                | (RunState::Running, RunState::ExecutionFailed)
        )
    }
}

/// 跟踪一次调用：状态、输出尾部、进度转发
struct RunTracker<'a> {
    label: &'a str,
    progress: &'a dyn ProgressSink,
    state: Mutex<RunState>,
    tail: Mutex<VecDeque<String>>,
    tail_capacity: usize,
}

impl<'a> RunTracker<'a> {
    fn new(label: &'a str, progress: &'a dyn ProgressSink, tail_capacity: usize) -> Self {
        Self {
            label,
            progress,
            state: Mutex::new(RunState::NotStarted),
            tail: Mutex::new(VecDeque::with_capacity(tail_capacity)),
            tail_capacity,
        }
    }

    fn state(&self) -> RunState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn transition(&self, next: RunState) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.can_transition_to(next) {
            debug!("[{}] 状态 {:?} → {:?}", self.label, *state, next);
            *state = next;
        } else {
            warn!("[{}] 忽略非法状态迁移 {:?} → {:?}", self.label, *state, next);
        }
    }

    fn tail_text(&self) -> String {
        let tail = self.tail.lock().unwrap_or_else(|e| e.into_inner());
        tail.iter().cloned().collect::<Vec<_>>().join("\n")
    }
}

impl ContainerEvents for RunTracker<'_> {
    fn started(&self) {
        self.transition(RunState::Running);
    }

    fn output(&self, line: OutputLine) {
        self.progress.update(self.label, &line.text);
        if self.tail_capacity == 0 {
            return;
        }
        let mut tail = self.tail.lock().unwrap_or_else(|e| e.into_inner());
        if tail.len() == self.tail_capacity {
            tail.pop_front();
        }
        tail.push_back(line.text);
    }
}

/// 一次尝试失败的原因
enum AttemptError {
    Container(ContainerError),
    TimedOut(u64),
    Interrupted,
}

impl From<ContainerError> for AttemptError {
    fn from(err: ContainerError) -> Self {
        AttemptError::Container(err)
    }
}

/// 容器分析服务
pub struct ContainerRunner {
    engine: Arc<dyn ContainerEngine>,
    progress: Arc<dyn ProgressSink>,
    shutdown: ShutdownSignal,
}

impl ContainerRunner {
    pub fn new(
        engine: Arc<dyn ContainerEngine>,
        progress: Arc<dyn ProgressSink>,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self {
            engine,
            progress,
            shutdown,
        }
    }

    /// 容器名：`highlight-<仓库名>-<应用ID>`，只保留 docker 允许的字符
    pub fn container_name(descriptor: &RepositoryDescriptor, application: &ApplicationRef) -> String {
        static INVALID: OnceLock<Regex> = OnceLock::new();
        let invalid = INVALID.get_or_init(|| {
            Regex::new(r"[^A-Za-z0-9_.-]+").expect("container name pattern is valid")
        });
        let raw = format!("highlight-{}-{}", descriptor.name, application.id);
        invalid.replace_all(&raw, "-").into_owned()
    }

    /// 构建容器调用
    pub fn build_invocation(
        descriptor: &RepositoryDescriptor,
        application: &ApplicationRef,
        config: &Config,
        workspace_dir: &Path,
        output_dir: &Path,
    ) -> ContainerInvocation {
        let cast = &config.cast;

        let mut env = vec![
            EnvVar::plain("HIGHLIGHT_SERVER_URL", &cast.base_url),
            EnvVar::plain("HIGHLIGHT_COMPANY_ID", &cast.company_id),
            EnvVar::plain("HIGHLIGHT_APPLICATION_ID", &application.id),
            EnvVar::plain("HIGHLIGHT_GIT_URL", &descriptor.url),
        ];
        match cast.token.as_deref().filter(|t| !t.is_empty()) {
            Some(token) => env.push(EnvVar::secret("HIGHLIGHT_TOKEN", token)),
            None => {
                if let Some(login) = &cast.login {
                    env.push(EnvVar::secret("HIGHLIGHT_LOGIN", login));
                }
                if let Some(password) = &cast.password {
                    env.push(EnvVar::secret("HIGHLIGHT_PASSWORD", password));
                }
            }
        }
        if let Some(token) = config.github.token.as_deref().filter(|t| !t.is_empty()) {
            env.push(EnvVar::secret("GITHUB_TOKEN", token));
        }

        let args = [
            ("--gitUrl", descriptor.url.as_str()),
            ("--sourceDir", CONTAINER_SOURCE_DIR),
            ("--workingDir", CONTAINER_WORKING_DIR),
            ("--analysisResultsDir", CONTAINER_OUTPUT_DIR),
            ("--applicationId", application.id.as_str()),
            ("--companyId", cast.company_id.as_str()),
            ("--serverUrl", cast.base_url.as_str()),
        ]
        .into_iter()
        .flat_map(|(flag, value)| [flag.to_string(), value.to_string()])
        .collect();

        ContainerInvocation {
            container_name: Self::container_name(descriptor, application),
            image: cast.docker_image.clone(),
            volumes: vec![
                VolumeMount {
                    host: workspace_dir.to_path_buf(),
                    container: CONTAINER_WORKING_DIR.to_string(),
                },
                VolumeMount {
                    host: output_dir.to_path_buf(),
                    container: CONTAINER_OUTPUT_DIR.to_string(),
                },
            ],
            env,
            args,
        }
    }

    /// 创建仓库专属目录并返回 (workspace, output) 的绝对路径
    async fn prepare_dirs(
        descriptor: &RepositoryDescriptor,
        config: &Config,
    ) -> Result<(PathBuf, PathBuf), ContainerError> {
        let root = config.repository_dir(&descriptor.name);
        let workspace = root.join("workspace");
        let output = root.join("output");

        for dir in [&workspace, &output] {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| ContainerError::io(format!("创建目录 {}", dir.display()), e))?;
        }

        // docker -v 需要绝对路径，相对路径会被当成命名卷
        let workspace = tokio::fs::canonicalize(&workspace)
            .await
            .map_err(|e| ContainerError::io(format!("解析目录 {}", workspace.display()), e))?;
        let output = tokio::fs::canonicalize(&output)
            .await
            .map_err(|e| ContainerError::io(format!("解析目录 {}", output.display()), e))?;

        Ok((workspace, output))
    }

    /// 启动并等待容器结束，返回退出码
    async fn attempt(
        &self,
        descriptor: &RepositoryDescriptor,
        application: &ApplicationRef,
        config: &Config,
        tracker: &RunTracker<'_>,
    ) -> Result<i32, AttemptError> {
        let (workspace, output) = Self::prepare_dirs(descriptor, config)
            .await
            .map_err(|e| ContainerError::Launch(e.to_string()))?;

        if !self.engine.image_exists(&config.cast.docker_image).await? {
            return Err(ContainerError::Launch(format!(
                "镜像 {} 不存在，请先执行 docker pull",
                config.cast.docker_image
            ))
            .into());
        }

        // 注册或镜像检查期间收到中断，不再启动容器
        if self.shutdown.is_triggered() {
            return Err(AttemptError::Interrupted);
        }

        let invocation =
            Self::build_invocation(descriptor, application, config, &workspace, &output);
        info!(
            "[{}] 🐳 启动分析容器 {} (镜像 {})",
            descriptor.name, invocation.container_name, invocation.image
        );

        let execution = self.engine.run(&invocation, tracker);
        let deadline = async {
            match config.analysis_timeout() {
                Some(limit) => tokio::time::sleep(limit).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = self.shutdown.triggered() => Err(AttemptError::Interrupted),
            _ = deadline => Err(AttemptError::TimedOut(config.cast.analysis_timeout_secs.unwrap_or_default())),
            result = execution => Ok(result?),
        }
    }

    fn failure_stage(tracker: &RunTracker<'_>) -> (RunState, FailureStage) {
        if tracker.state() == RunState::Running {
            (RunState::ExecutionFailed, FailureStage::ContainerExecution)
        } else {
            (RunState::LaunchFailed, FailureStage::ContainerLaunch)
        }
    }
}

#[async_trait]
impl AnalysisRunner for ContainerRunner {
    async fn run(
        &self,
        descriptor: &RepositoryDescriptor,
        application: &ApplicationRef,
        config: &Config,
    ) -> RunOutcome {
        let tracker = RunTracker::new(
            &descriptor.name,
            self.progress.as_ref(),
            config.cast.output_tail_lines,
        );
        let container_name = Self::container_name(descriptor, application);
        let started_at = Instant::now();

        tracker.transition(RunState::Launching);
        let result = self.attempt(descriptor, application, config, &tracker).await;

        // 无论结果如何都删除容器
        if let Err(e) = self.engine.remove(&container_name).await {
            warn!("[{}] ⚠️ 清理容器 {} 失败: {}", descriptor.name, container_name, e);
        }

        let outcome = match result {
            Ok(0) => {
                tracker.transition(RunState::Completed);
                RunOutcome::Success {
                    duration_ms: started_at.elapsed().as_millis() as u64,
                }
            }
            Ok(code) => {
                tracker.transition(RunState::ExecutionFailed);
                let tail = tracker.tail_text();
                let message = if tail.is_empty() {
                    format!("exit code {}", code)
                } else {
                    format!("exit code {}; {}", code, tail)
                };
                RunOutcome::failure(FailureStage::ContainerExecution, message)
            }
            Err(AttemptError::Container(ContainerError::Launch(message))) => {
                tracker.transition(RunState::LaunchFailed);
                RunOutcome::failure(FailureStage::ContainerLaunch, message)
            }
            Err(AttemptError::Container(e)) => {
                let (state, stage) = Self::failure_stage(&tracker);
                tracker.transition(state);
                RunOutcome::failure(stage, e.to_string())
            }
            Err(AttemptError::TimedOut(secs)) => {
                let (state, stage) = Self::failure_stage(&tracker);
                tracker.transition(state);
                RunOutcome::failure(stage, format!("timed out after {}s", secs))
            }
            Err(AttemptError::Interrupted) => {
                let (state, stage) = Self::failure_stage(&tracker);
                tracker.transition(state);
                RunOutcome::failure(stage, "interrupted")
            }
        };

        debug!("[{}] 最终状态 {:?}", descriptor.name, tracker.state());
        outcome
    }
}
