//! Agent Runtime（代理运行时）
//!
//! 每个 agent 一个独立的 tokio 任务：持有一个 Task Manager、一个世界句柄和一份启发式注册表，
//! 只通过消息与编排器通信。任务的 enter / update 失败在这里转为 error 状态消息，不会终止运行时。
//! 拆除时总是先强制退出活跃任务（取消其定时器），再释放世界句柄。

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc;

use super::message::{AgentId, AgentMessage, Envelope};
use crate::core::{TaskManager, Transition, UpdateOutcome};
use crate::heuristics::HeuristicParams;
use crate::tasks::{TaskContext, TaskRegistry, TaskSettings};
use crate::world::{World, WorldEvent};

/// 运行时退出原因
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TeardownReason {
    /// 收到 stop 控制消息
    Stopped,
    /// 世界侧 end 事件
    WorldEnded(String),
    /// 控制通道与世界事件通道均已关闭
    ChannelsClosed,
}

impl std::fmt::Display for TeardownReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TeardownReason::Stopped => write!(f, "stopped"),
            TeardownReason::WorldEnded(reason) => write!(f, "world ended: {reason}"),
            TeardownReason::ChannelsClosed => write!(f, "channels closed"),
        }
    }
}

/// 出生后自动进入的任务
#[derive(Debug, Clone)]
pub struct DefaultTask {
    pub name: String,
    pub data: Value,
}

pub struct AgentRuntime {
    id: AgentId,
    manager: TaskManager,
    ctx: TaskContext,
    tasks: Arc<TaskRegistry>,
    status_tx: mpsc::UnboundedSender<Envelope>,
    default_task: Option<DefaultTask>,
}

impl AgentRuntime {
    pub fn new(
        world: Arc<dyn World>,
        tasks: Arc<TaskRegistry>,
        settings: TaskSettings,
        heuristics: HeuristicParams,
        status_tx: mpsc::UnboundedSender<Envelope>,
    ) -> Self {
        let ctx = TaskContext::new(world, heuristics, settings);
        Self {
            id: ctx.username.clone(),
            manager: TaskManager::new(),
            ctx,
            tasks,
            status_tx,
            default_task: None,
        }
    }

    pub fn with_default_task(mut self, default_task: Option<DefaultTask>) -> Self {
        self.default_task = default_task;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn manager(&self) -> &TaskManager {
        &self.manager
    }

    /// 消息主循环：直到 stop / 世界结束 / 通道全部关闭，然后拆除
    pub async fn run(
        mut self,
        mut control_rx: mpsc::UnboundedReceiver<AgentMessage>,
        mut world_rx: mpsc::UnboundedReceiver<WorldEvent>,
    ) -> TeardownReason {
        tracing::info!(agent = %self.id, "Agent runtime started");
        let reason = loop {
            tokio::select! {
                Some(msg) = control_rx.recv() => {
                    if let Some(reason) = self.handle_control(msg).await {
                        break reason;
                    }
                }
                Some(event) = world_rx.recv() => {
                    if let Some(reason) = self.handle_world_event(event).await {
                        break reason;
                    }
                }
                else => break TeardownReason::ChannelsClosed,
            }
        };
        self.teardown(&reason).await;
        reason
    }

    /// 处理一条控制消息；返回 Some 表示应当拆除
    pub async fn handle_control(&mut self, msg: AgentMessage) -> Option<TeardownReason> {
        match msg {
            AgentMessage::SetState { task_name, data } => self.set_state(&task_name, &data).await,
            AgentMessage::Update => self.update().await,
            AgentMessage::SetTarget { target } => {
                match self.manager.set_target(target, &mut self.ctx).await {
                    Ok(Transition::Restarted) => {
                        tracing::debug!(agent = %self.id, "Task restarted with new target");
                    }
                    Ok(_) => {}
                    Err(e) => self.emit(AgentMessage::error(e.to_string())),
                }
            }
            AgentMessage::Stop => return Some(TeardownReason::Stopped),
            other => {
                tracing::warn!(agent = %self.id, "Ignoring non-control message: {:?}", other);
            }
        }
        None
    }

    /// 处理一条世界事件；返回 Some 表示应当拆除
    pub async fn handle_world_event(&mut self, event: WorldEvent) -> Option<TeardownReason> {
        match event {
            WorldEvent::Spawn => {
                tracing::info!(agent = %self.id, "Spawned in world");
                self.emit(AgentMessage::Spawn {
                    username: self.ctx.username.clone(),
                });
                if let Some(default) = self.default_task.clone() {
                    self.set_state(&default.name, &default.data).await;
                }
                None
            }
            WorldEvent::Error(message) => {
                // 不自动卸载任务，恢复策略由编排器决定
                tracing::warn!(agent = %self.id, "World error: {}", message);
                self.emit(AgentMessage::Error { message });
                None
            }
            WorldEvent::End(reason) => Some(TeardownReason::WorldEnded(reason)),
        }
    }

    async fn set_state(&mut self, task_name: &str, data: &Value) {
        let task = match self.tasks.create(task_name, data) {
            Ok(task) => task,
            Err(e) => {
                tracing::warn!(agent = %self.id, "setState rejected: {}", e);
                self.emit(AgentMessage::error(e.to_string()));
                return;
            }
        };
        if let Err(e) = self.manager.enter(task, &mut self.ctx).await {
            self.emit(AgentMessage::error(e.to_string()));
        }
    }

    async fn update(&mut self) {
        match self.manager.update(&mut self.ctx).await {
            Ok(UpdateOutcome::Exited { task }) => {
                if let Some(fallback) = self.ctx.settings.fallback_task.clone() {
                    tracing::debug!(agent = %self.id, from = task, to = %fallback, "Entering fallback task");
                    self.set_state(&fallback, &Value::Null).await;
                }
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(agent = %self.id, "Task update failed: {}", e);
                self.emit(AgentMessage::error(e.to_string()));
            }
        }
        self.emit(AgentMessage::StateUpdate {
            state: self.manager.report(),
            active_task_name: self.manager.active_name().map(str::to_string),
        });
    }

    async fn teardown(&mut self, reason: &TeardownReason) {
        self.manager.shutdown(&mut self.ctx).await;
        self.ctx.world.quit().await;
        tracing::info!(agent = %self.id, "Agent torn down: {}", reason);
        self.emit(AgentMessage::Disconnected {
            reason: reason.to_string(),
        });
    }

    fn emit(&self, message: AgentMessage) {
        if self.status_tx.send(Envelope::new(self.id.clone(), message)).is_err() {
            tracing::debug!(agent = %self.id, "Status channel closed, dropping message");
        }
    }
}
