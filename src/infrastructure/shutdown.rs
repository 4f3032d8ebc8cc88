//! 中断信号
//!
//! 操作员按下 Ctrl+C（或进程收到 SIGTERM）后，正在运行的容器被停止并删除，
//! 剩余仓库不再处理。

use tokio::sync::watch;
use tracing::{info, warn};

/// 触发端
#[derive(Debug)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

/// 监听端，可以随意 clone
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

/// 创建一对触发端 / 监听端
pub fn channel() -> (ShutdownTrigger, ShutdownSignal) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger { tx }, ShutdownSignal { rx })
}

impl ShutdownTrigger {
    pub fn trigger(&self) {
        // 所有监听端都已丢弃时发送失败，无需处理
        let _ = self.tx.send(true);
    }
}

impl ShutdownSignal {
    /// 永远不会触发的信号
    pub fn never() -> Self {
        let (_trigger, signal) = channel();
        signal
    }

    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// 等待触发；触发端丢弃且未触发时永远挂起
    pub async fn triggered(&self) {
        let mut rx = self.rx.clone();
        if rx.wait_for(|triggered| *triggered).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// 等待 Ctrl+C 或 SIGTERM
pub async fn wait_for_os_signal() {
    let ctrl_c = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("收到 Ctrl+C，正在停止当前分析..."),
            Err(e) => {
                warn!("无法监听 Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
                info!("收到 SIGTERM，正在停止当前分析...");
            }
            Err(e) => {
                warn!("无法监听 SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// 在后台监听系统信号，返回对应的 `ShutdownSignal`
pub fn listen_for_os_signals() -> ShutdownSignal {
    let (trigger, signal) = channel();
    tokio::spawn(async move {
        wait_for_os_signal().await;
        trigger.trigger();
    });
    signal
}
