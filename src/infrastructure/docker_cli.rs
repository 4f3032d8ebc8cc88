//! Docker CLI 容器引擎
//!
//! 通过 `docker` 命令行实现 `ContainerEngine`

use crate::error::ContainerError;
use crate::infrastructure::container_engine::{
    ContainerEngine, ContainerEvents, ContainerInvocation, OutputLine, OutputStream,
};
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, warn};

/// Docker CLI 引擎
#[derive(Debug, Clone)]
pub struct DockerCli {
    binary: PathBuf,
}

impl DockerCli {
    /// 使用 PATH 中的 `docker`
    pub fn new() -> Self {
        Self {
            binary: PathBuf::from("docker"),
        }
    }

    /// 使用指定的 docker 可执行文件
    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// 构建 `docker run` 命令
    ///
    /// 机密环境变量只写 `-e NAME`，值通过 docker 客户端自身的环境传入。
    /// 挂载使用 `--mount`，主机路径里的 `:` 不会被误当成分隔符。
    pub fn build_run_command(&self, invocation: &ContainerInvocation) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("run").arg("--name").arg(&invocation.container_name);

        for volume in &invocation.volumes {
            cmd.arg("--mount").arg(format!(
                "type=bind,source={},target={}",
                volume.host.display(),
                volume.container
            ));
        }

        for var in &invocation.env {
            if var.secret {
                cmd.arg("-e").arg(&var.name);
                cmd.env(&var.name, &var.value);
            } else {
                cmd.arg("-e").arg(format!("{}={}", var.name, var.value));
            }
        }

        cmd.arg(&invocation.image).args(&invocation.args);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::new()
    }
}

/// 逐行读取输出并回调
///
/// 按字节读取，非 UTF-8 内容做有损转换；一直读到 EOF，
/// 提前关闭管道会让 docker 客户端因 SIGPIPE 退出。
async fn pump_lines<R>(reader: Option<R>, stream: OutputStream, events: &dyn ContainerEvents)
where
    R: AsyncRead + Unpin,
{
    let Some(reader) = reader else {
        return;
    };
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = buf.strip_suffix(b"\n").unwrap_or(&buf[..]);
                let line = line.strip_suffix(b"\r").unwrap_or(line);
                events.output(OutputLine {
                    stream,
                    text: String::from_utf8_lossy(line).into_owned(),
                });
            }
            Err(e) => {
                debug!("读取容器输出失败: {}", e);
                break;
            }
        }
    }
}

#[async_trait]
impl ContainerEngine for DockerCli {
    async fn image_exists(&self, image: &str) -> Result<bool, ContainerError> {
        let output = Command::new(&self.binary)
            .args(["image", "inspect", "--format", "{{.Id}}", image])
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| {
                ContainerError::Launch(format!("无法执行 {}: {}", self.binary.display(), e))
            })?;

        if output.status.success() {
            return Ok(true);
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr.to_lowercase().contains("no such image") {
            Ok(false)
        } else {
            Err(ContainerError::Launch(format!(
                "Docker 不可用: {}",
                stderr.trim()
            )))
        }
    }

    async fn run(
        &self,
        invocation: &ContainerInvocation,
        events: &dyn ContainerEvents,
    ) -> Result<i32, ContainerError> {
        debug!(
            "docker run --name {} {:?} {:?} {} {:?}",
            invocation.container_name,
            invocation.volumes,
            invocation.env,
            invocation.image,
            invocation.args
        );

        // 同名容器可能是上次异常退出留下的，不删掉 docker run 会因名称冲突失败
        if let Err(e) = self.remove(&invocation.container_name).await {
            warn!(
                "清理残留容器 {} 失败: {}",
                invocation.container_name, e
            );
        }

        let mut child = self.build_run_command(invocation).spawn().map_err(|e| {
            ContainerError::Launch(format!("无法执行 {}: {}", self.binary.display(), e))
        })?;

        events.started();

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let (_, _, status) = tokio::join!(
            pump_lines(stdout, OutputStream::Stdout, events),
            pump_lines(stderr, OutputStream::Stderr, events),
            child.wait()
        );

        let status = status.map_err(|e| ContainerError::io("等待容器进程", e))?;
        // 被信号终止时没有退出码
        Ok(status.code().unwrap_or(-1))
    }

    async fn remove(&self, container_name: &str) -> Result<(), ContainerError> {
        let output = Command::new(&self.binary)
            .args(["rm", "-f", container_name])
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| ContainerError::io(format!("删除容器 {}", container_name), e))?;

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr.to_lowercase().contains("no such container") {
            Ok(())
        } else {
            Err(ContainerError::Execution(format!(
                "删除容器 {} 失败: {}",
                container_name,
                stderr.trim()
            )))
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::infrastructure::container_engine::{EnvVar, VolumeMount};
    use std::os::unix::fs::PermissionsExt;
    use std::path::Path;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        started: Mutex<usize>,
        lines: Mutex<Vec<OutputLine>>,
    }

    impl ContainerEvents for Recorder {
        fn started(&self) {
            *self.started.lock().unwrap() += 1;
        }

        fn output(&self, line: OutputLine) {
            self.lines.lock().unwrap().push(line);
        }
    }

    /// 写一个假的 docker 脚本
    fn fake_docker(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("docker");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn invocation() -> ContainerInvocation {
        ContainerInvocation {
            container_name: "highlight-a-1".to_string(),
            image: "img:1".to_string(),
            volumes: vec![VolumeMount {
                host: PathBuf::from("/tmp/ws"),
                container: "/workingDir".to_string(),
            }],
            env: vec![
                EnvVar::plain("HIGHLIGHT_APPLICATION_ID", "1"),
                EnvVar::secret("HIGHLIGHT_TOKEN", "s3cret"),
            ],
            args: vec!["--gitUrl".to_string(), "https://x/a.git".to_string()],
        }
    }

    #[test]
    fn test_secret_env_not_in_arguments() {
        let cmd = DockerCli::new().build_run_command(&invocation());
        let args: Vec<String> = cmd
            .as_std()
            .get_args()
            .map(|a| a.to_string_lossy().to_string())
            .collect();

        assert_eq!(&args[..3], ["run", "--name", "highlight-a-1"]);
        assert!(args.contains(&"type=bind,source=/tmp/ws,target=/workingDir".to_string()));
        assert!(args.contains(&"HIGHLIGHT_APPLICATION_ID=1".to_string()));
        assert!(args.contains(&"HIGHLIGHT_TOKEN".to_string()));
        assert!(!args.iter().any(|a| a.contains("s3cret")));
        // 镜像在前，分析器参数在后
        let image_pos = args.iter().position(|a| a == "img:1").unwrap();
        assert_eq!(args[image_pos + 1], "--gitUrl");
    }

    #[tokio::test]
    async fn test_run_streams_lines_and_returns_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let docker = fake_docker(dir.path(), "echo scanning\necho warning >&2\nexit 3");
        let recorder = Recorder::default();

        let code = DockerCli::with_binary(docker)
            .run(&invocation(), &recorder)
            .await
            .unwrap();

        assert_eq!(code, 3);
        assert_eq!(*recorder.started.lock().unwrap(), 1);
        let lines = recorder.lines.lock().unwrap();
        assert!(lines.contains(&OutputLine {
            stream: OutputStream::Stdout,
            text: "scanning".to_string()
        }));
        assert!(lines.contains(&OutputLine {
            stream: OutputStream::Stderr,
            text: "warning".to_string()
        }));
    }

    #[test]
    fn test_mount_keeps_colon_in_host_path() {
        let mut invocation = invocation();
        invocation.volumes[0].host = PathBuf::from("/out/svc:v2/workspace");
        let cmd = DockerCli::new().build_run_command(&invocation);
        let args: Vec<String> = cmd
            .as_std()
            .get_args()
            .map(|a| a.to_string_lossy().to_string())
            .collect();

        let pos = args.iter().position(|a| a == "--mount").unwrap();
        assert_eq!(
            args[pos + 1],
            "type=bind,source=/out/svc:v2/workspace,target=/workingDir"
        );
        assert!(!args.iter().any(|a| a == "-v"));
    }

    #[tokio::test]
    async fn test_non_utf8_output_is_drained_to_the_end() {
        let dir = tempfile::tempdir().unwrap();
        let docker = fake_docker(
            dir.path(),
            "[ \"$1\" = rm ] && exit 0\n\
             printf 'caf\\351\\n'\n\
             i=0\n\
             while [ $i -lt 8000 ]; do echo \"line $i\"; i=$((i+1)); done\n\
             exit 0",
        );
        let recorder = Recorder::default();

        let code = DockerCli::with_binary(docker)
            .run(&invocation(), &recorder)
            .await
            .unwrap();

        assert_eq!(code, 0);
        let lines = recorder.lines.lock().unwrap();
        assert_eq!(lines.len(), 8001);
        assert_eq!(lines[0].text, "caf\u{FFFD}");
        assert_eq!(lines[8000].text, "line 7999");
    }

    #[tokio::test]
    async fn test_stale_container_removed_before_run() {
        let dir = tempfile::tempdir().unwrap();
        let calls = dir.path().join("calls.log");
        let docker = fake_docker(
            dir.path(),
            &format!("echo \"$1 $2 $3\" >> {}", calls.display()),
        );

        DockerCli::with_binary(docker)
            .run(&invocation(), &Recorder::default())
            .await
            .unwrap();

        let calls = std::fs::read_to_string(&calls).unwrap();
        let calls: Vec<&str> = calls.lines().collect();
        assert_eq!(calls, vec!["rm -f highlight-a-1", "run --name highlight-a-1"]);
    }

    #[tokio::test]
    async fn test_secret_value_reaches_child_environment() {
        let dir = tempfile::tempdir().unwrap();
        let docker = fake_docker(dir.path(), "echo \"token=$HIGHLIGHT_TOKEN\"");
        let recorder = Recorder::default();

        let code = DockerCli::with_binary(docker)
            .run(&invocation(), &recorder)
            .await
            .unwrap();

        assert_eq!(code, 0);
        assert_eq!(recorder.lines.lock().unwrap()[0].text, "token=s3cret");
    }

    #[tokio::test]
    async fn test_missing_binary_is_launch_error() {
        let recorder = Recorder::default();
        let err = DockerCli::with_binary("/no/such/docker")
            .run(&invocation(), &recorder)
            .await
            .unwrap_err();

        assert!(matches!(err, ContainerError::Launch(_)));
        assert_eq!(*recorder.started.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_image_exists_variants() {
        let dir = tempfile::tempdir().unwrap();

        let present = fake_docker(dir.path(), "echo sha256:abc");
        assert!(DockerCli::with_binary(&present).image_exists("img").await.unwrap());

        let absent = fake_docker(
            dir.path(),
            "echo 'Error: No such image: img' >&2\nexit 1",
        );
        assert!(!DockerCli::with_binary(&absent).image_exists("img").await.unwrap());

        let daemon_down = fake_docker(
            dir.path(),
            "echo 'Cannot connect to the Docker daemon' >&2\nexit 1",
        );
        let err = DockerCli::with_binary(&daemon_down)
            .image_exists("img")
            .await
            .unwrap_err();
        assert!(matches!(err, ContainerError::Launch(_)));
    }

    #[tokio::test]
    async fn test_remove_tolerates_missing_container() {
        let dir = tempfile::tempdir().unwrap();
        let docker = fake_docker(
            dir.path(),
            "echo 'Error: No such container: x' >&2\nexit 1",
        );
        assert!(DockerCli::with_binary(docker).remove("x").await.is_ok());
    }
}
