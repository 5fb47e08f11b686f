//! Colony - 多智能体任务编排
//!
//! 入口：初始化日志、加载配置、在内存模拟世界中启动 agent，并运行到 Ctrl+C。
//! 用法：`colony [配置文件路径]`

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use colony::config::{load_config, AgentSpec, AppConfig};
use colony::core::{run_with_graceful_shutdown, shutdown_when_all_disconnected, ShutdownManager};
use colony::runtime::{AgentMessage, Orchestrator};
use colony::world::{Block, Entity, EntityKind, MockConnector, Scene, Vec3};
use serde_json::json;
use tokio::sync::broadcast;

/// 演示场景：一名玩家、一只僵尸、几块矿石
fn demo_scene() -> Scene {
    Scene {
        spawn: Some(Vec3::new(0.0, 64.0, 0.0)),
        entities: vec![
            Entity {
                id: 1,
                kind: EntityKind::Player,
                name: "steve".into(),
                position: Vec3::new(8.0, 64.0, 3.0),
            },
            Entity {
                id: 2,
                kind: EntityKind::Hostile,
                name: "zombie".into(),
                position: Vec3::new(-6.0, 64.0, -6.0),
            },
        ],
        blocks: vec![
            Block {
                name: "coal_ore".into(),
                position: Vec3::new(4.0, 63.0, 4.0),
            },
            Block {
                name: "coal_ore".into(),
                position: Vec3::new(-5.0, 63.0, -5.0),
            },
        ],
    }
}

fn demo_agents(config: &AppConfig) -> Vec<AgentSpec> {
    if config.agents.is_empty() {
        vec![AgentSpec::new("worker-1").with_default_task("followEntity", json!({ "username": "steve" }))]
    } else {
        config.agents.clone()
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    colony::observability::init();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!("Failed to load config, using defaults: {}", e);
            AppConfig::default()
        }
    };

    let connector = Arc::new(MockConnector::new(demo_scene()).with_auto_move(true));
    let orchestrator = Arc::new(Orchestrator::new(&config, connector));

    // 状态消息日志
    let mut status_rx = orchestrator.subscribe();
    tokio::spawn(async move {
        loop {
            match status_rx.recv().await {
                Ok(envelope) => log_status(&envelope.agent, &envelope.message),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!("Status observer lagged, skipped {} messages", n);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    // 所有 agent 都掉线时进程没有继续运行的意义
    let shutdown = Arc::new(ShutdownManager::new());
    shutdown_when_all_disconnected(Arc::clone(&shutdown), orchestrator.subscribe());

    let agents = demo_agents(&config);
    let failures = orchestrator.spawn_all(&agents).await;
    if failures.len() == agents.len() {
        anyhow::bail!("No agent could be spawned");
    }

    let ticker = (config.orchestrator.tick_interval_ms > 0).then(|| {
        orchestrator.spawn_ticker(
            Duration::from_millis(config.orchestrator.tick_interval_ms),
            shutdown.token(),
        )
    });

    let cleanup_orchestrator = Arc::clone(&orchestrator);
    let cleanup_shutdown = Arc::clone(&shutdown);
    run_with_graceful_shutdown(
        Arc::clone(&shutdown),
        std::future::pending::<()>(),
        || async move {
            cleanup_shutdown.token().cancel();
            cleanup_orchestrator.shutdown().await;
        },
    )
    .await;

    if let Some(ticker) = ticker {
        ticker.await.context("Update ticker panicked")?;
    }
    tracing::info!("All agents stopped");
    Ok(())
}

fn log_status(agent: &str, message: &AgentMessage) {
    match message {
        AgentMessage::Spawn { username } => tracing::info!(agent = %agent, "Spawned as {}", username),
        AgentMessage::Error { message } => tracing::warn!(agent = %agent, "Error: {}", message),
        AgentMessage::StateUpdate {
            state,
            active_task_name,
        } => tracing::debug!(
            agent = %agent,
            task = active_task_name.as_deref().unwrap_or("idle"),
            "State: {}",
            state
        ),
        AgentMessage::Disconnected { reason } => {
            tracing::info!(agent = %agent, "Disconnected: {}", reason)
        }
        other => tracing::debug!(agent = %agent, "{:?}", other),
    }
}
