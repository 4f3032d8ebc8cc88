use clap::Parser;
use highlight_batch::infrastructure::shutdown;
use highlight_batch::utils::logging;
use highlight_batch::{App, Config};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, Level};

/// 批量运行 CAST Highlight 代码分析
#[derive(Parser, Debug)]
#[command(name = "highlight-batch", version, about)]
struct Cli {
    /// 配置文件路径（默认读取当前目录下的 highlight.toml，不存在时只用环境变量）
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// 仓库列表 JSON 文件
    #[arg(short, long, default_value = "repositories.json")]
    input: PathBuf,

    /// 把最终报告写成 JSON 文件
    #[arg(long, env = "OUTPUT_REPORT_FILE")]
    report_json: Option<PathBuf>,

    /// 输出 debug 级别日志
    #[arg(short, long)]
    verbose: bool,

    /// 以 JSON 格式输出日志
    #[arg(long)]
    json: bool,
}

/// 启动失败（配置、仓库列表）使用的退出码
const EXIT_FATAL: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // 初始化日志
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    logging::init(cli.json, level);

    match run(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            error!("✗ 启动失败: {:#}", e);
            ExitCode::from(EXIT_FATAL)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<u8> {
    // 加载配置
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(path) = cli.report_json {
        config.output.report_file = Some(path);
    }

    // 初始化并运行应用
    let signal = shutdown::listen_for_os_signals();
    let report = App::initialize(config, cli.input, signal).await?.run().await?;

    Ok(report.exit_code() as u8)
}
