//! 优雅关闭
//!
//! 统一监听 Ctrl+C / SIGTERM，触发后由编排器依次拆除所有 agent（先退出任务、再释放世界句柄）。

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::runtime::{AgentMessage, Envelope};

/// 关闭原因
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownReason {
    /// 用户发起（Ctrl+C）
    UserInitiated,
    /// SIGTERM 信号
    Signal,
    /// 致命错误
    FatalError(String),
}

/// 关闭信号管理器
#[derive(Clone)]
pub struct ShutdownManager {
    shutdown_token: CancellationToken,
    reason_tx: broadcast::Sender<ShutdownReason>,
}

impl ShutdownManager {
    pub fn new() -> Self {
        let (reason_tx, _) = broadcast::channel(1);
        Self {
            shutdown_token: CancellationToken::new(),
            reason_tx,
        }
    }

    /// 子组件（如编排器的 update 定时器）据此停止
    pub fn token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    pub fn shutdown(&self, reason: ShutdownReason) {
        let _ = self.reason_tx.send(reason);
        self.shutdown_token.cancel();
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown_token.is_cancelled()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ShutdownReason> {
        self.reason_tx.subscribe()
    }

    pub async fn wait_for_shutdown(&self) {
        self.shutdown_token.cancelled().await;
    }

    /// 安装系统信号处理器 (Ctrl+C, SIGTERM)
    pub fn install_signal_handlers(self: &Arc<Self>) {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            if let Ok(()) = tokio::signal::ctrl_c().await {
                tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
                manager.shutdown(ShutdownReason::UserInitiated);
            }
        });

        #[cfg(unix)]
        {
            let manager = Arc::clone(self);
            tokio::spawn(async move {
                use tokio::signal::unix::{signal, SignalKind};
                if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                    sigterm.recv().await;
                    tracing::info!("Received SIGTERM, initiating graceful shutdown...");
                    manager.shutdown(ShutdownReason::Signal);
                }
            });
        }
    }
}

impl Default for ShutdownManager {
    fn default() -> Self {
        Self::new()
    }
}

/// 监听状态消息：出生过的 agent 全部断开后以 FatalError 触发关闭
///
/// 已在关闭流程中时直接退出，不会把正常关闭产生的 disconnected 误判为致命错误。
pub fn shutdown_when_all_disconnected(
    manager: Arc<ShutdownManager>,
    mut status_rx: broadcast::Receiver<Envelope>,
) -> JoinHandle<()> {
    let token = manager.token();
    tokio::spawn(async move {
        let mut alive: HashSet<String> = HashSet::new();
        loop {
            let envelope = tokio::select! {
                _ = token.cancelled() => return,
                received = status_rx.recv() => match received {
                    Ok(envelope) => envelope,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!("Shutdown watcher lagged, skipped {} messages", n);
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => return,
                },
            };
            match envelope.message {
                AgentMessage::Spawn { .. } => {
                    alive.insert(envelope.agent);
                }
                AgentMessage::Disconnected { .. } => {
                    if alive.remove(&envelope.agent) && alive.is_empty() && !manager.is_shutdown() {
                        tracing::error!("All agents disconnected, shutting down");
                        manager.shutdown(ShutdownReason::FatalError(
                            "all agents disconnected".to_string(),
                        ));
                        return;
                    }
                }
                _ => {}
            }
        }
    })
}

/// 运行 app 直到其结束或收到关闭信号，然后执行 cleanup
pub async fn run_with_graceful_shutdown<F, Fut>(
    shutdown_manager: Arc<ShutdownManager>,
    app: F,
    cleanup: impl FnOnce() -> Fut,
) where
    F: Future<Output = ()>,
    Fut: Future<Output = ()>,
{
    shutdown_manager.install_signal_handlers();

    tokio::select! {
        _ = app => {
            tracing::info!("Application finished normally");
        }
        _ = shutdown_manager.wait_for_shutdown() => {
            tracing::info!("Shutdown signal received");
        }
    }

    cleanup().await;
}
