/// 日志工具模块
///
/// 提供日志初始化、运行日志文件和格式化输出的辅助函数
use crate::config::Config;
use crate::models::{BatchReport, RepositoryDescriptor, RunOutcome};
use anyhow::Result;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;
use tracing::{error, info, Level};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// 初始化全局日志
///
/// `RUST_LOG` 优先；未设置时使用 `level`。重复调用只有第一次生效。
pub fn init(json: bool, level: Level) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    let registry = tracing_subscriber::registry().with(env_filter);
    if json {
        registry
            .with(fmt::layer().with_writer(std::io::stderr).json())
            .try_init()
            .ok();
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
            .try_init()
            .ok();
    }
}

/// 初始化运行日志文件
///
/// # 参数
/// - `log_file_path`: 日志文件路径，父目录不存在时自动创建
pub fn init_log_file(log_file_path: &Path) -> Result<()> {
    if let Some(parent) = log_file_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let log_header = format!(
        "{}\nHighlight 批量分析日志 - {}\n{}\n\n",
        "=".repeat(60),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        "=".repeat(60)
    );
    fs::write(log_file_path, log_header)?;
    Ok(())
}

/// 向运行日志追加一个仓库的结果
pub fn append_outcome(
    log_file_path: &Path,
    repository: &RepositoryDescriptor,
    outcome: &RunOutcome,
) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file_path)?;

    writeln!(
        file,
        "[{}] {} | {} | {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        repository.name,
        repository.url,
        outcome
    )?;
    Ok(())
}

/// 向运行日志追加最终统计
pub fn append_summary(log_file_path: &Path, report: &BatchReport) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file_path)?;

    writeln!(file, "\n{}", "=".repeat(60))?;
    writeln!(
        file,
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    )?;
    writeln!(file, "成功: {}/{}", report.success_count(), report.len())?;
    writeln!(file, "失败: {}", report.failure_count())?;
    if report.interrupted {
        writeln!(file, "⚠️ 运行被中断，剩余仓库未处理")?;
    }
    writeln!(file, "{}", "=".repeat(60))?;
    Ok(())
}

/// 记录程序启动信息
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - CAST Highlight 批量分析");
    info!("🌐 API: {}", config.cast.base_url);
    info!("🐳 镜像: {}", config.cast.docker_image);
    info!("📂 输出目录: {}", config.output.base_dir.display());
    info!("{}", "=".repeat(60));
}

/// 记录仓库加载信息
pub fn log_repositories_loaded(total: usize) {
    info!("✓ 找到 {} 个待分析的仓库", total);
    info!("📋 将逐个顺序处理，单个失败不影响后续仓库\n");
}

/// 打印最终统计信息
pub fn print_final_stats(report: &BatchReport, log_file_path: &Path) {
    info!("\n{}", "=".repeat(60));
    info!("📊 全部处理完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    for entry in report.entries() {
        if entry.outcome.is_success() {
            info!("{}: {}", entry.repository.name, entry.outcome);
        } else {
            error!("{}: {}", entry.repository.name, entry.outcome);
        }
    }
    info!("{}", "─".repeat(60));
    info!("✅ 成功: {}/{}", report.success_count(), report.len());
    info!("❌ 失败: {}", report.failure_count());
    if report.interrupted {
        info!("⚠️ 运行被中断，剩余仓库未处理");
    }
    info!("{}", "=".repeat(60));
    info!("\n日志已保存至: {}", log_file_path.display());
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度（按字符计）
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FailureStage;

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("短文本", 10), "短文本");
        assert_eq!(truncate_text("abcdef", 3), "abc...");
        assert_eq!(truncate_text("中文字符截断", 2), "中文...");
    }

    #[test]
    fn test_run_log_file_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("run.log");

        init_log_file(&path).unwrap();
        append_outcome(
            &path,
            &RepositoryDescriptor::new("a", "https://x/a.git"),
            &RunOutcome::failure(FailureStage::ContainerExecution, "exit code 1"),
        )
        .unwrap();
        append_summary(&path, &BatchReport::new()).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("Highlight 批量分析日志"));
        assert!(content.contains("a | https://x/a.git | ✗ 失败 [ContainerExecution] exit code 1"));
        assert!(content.contains("成功: 0/0"));
    }
}
