//! 编排器：监管 N 个 Agent Runtime
//!
//! 负责：通过 WorldConnector 创建 agent、按 agent id 路由控制消息、汇总状态消息并广播给观察者、
//! 维护每个 agent 的状态投影。每个 agent 运行在独立的 tokio 任务中，单个 agent 崩溃只会产生
//! 该 agent 的 error 消息，不影响其他 agent。agent 表只由编排器及其监管任务增删（单写者）：
//! 运行时结束（stop、世界 end、崩溃）后条目自动注销，同名 agent 可以重新 spawn。

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::agent::{AgentRuntime, DefaultTask, TeardownReason};
use super::message::{AgentId, AgentMessage, Envelope};
use crate::config::{AgentSpec, AppConfig};
use crate::core::{AgentStatus, ColonyError};
use crate::heuristics::HeuristicParams;
use crate::tasks::{Target, TaskRegistry, TaskSettings};
use crate::world::{World, WorldConnector};

type AgentTable = RwLock<HashMap<AgentId, AgentHandle>>;

/// 单个 agent 的句柄
struct AgentHandle {
    /// 每次 spawn 递增；监管任务只移除属于自己这一代的条目
    generation: u64,
    control_tx: mpsc::UnboundedSender<AgentMessage>,
    /// 监管任务：等待运行时结束、处理崩溃并移除条目。连接世界期间为 None
    supervisor: Option<JoinHandle<()>>,
}

pub struct Orchestrator {
    connector: Arc<dyn WorldConnector>,
    tasks: Arc<TaskRegistry>,
    settings: TaskSettings,
    heuristics: HeuristicParams,
    agents: Arc<AgentTable>,
    next_generation: AtomicU64,
    statuses: Arc<RwLock<HashMap<AgentId, AgentStatus>>>,
    status_tx: mpsc::UnboundedSender<Envelope>,
    observers: broadcast::Sender<Envelope>,
    forwarder: JoinHandle<()>,
}

impl Orchestrator {
    pub fn new(config: &AppConfig, connector: Arc<dyn WorldConnector>) -> Self {
        Self::with_tasks(config, connector, TaskRegistry::with_builtins())
    }

    /// 使用自定义任务注册表（可在内置任务之外注册更多任务）
    pub fn with_tasks(
        config: &AppConfig,
        connector: Arc<dyn WorldConnector>,
        tasks: TaskRegistry,
    ) -> Self {
        let (status_tx, mut status_rx) = mpsc::unbounded_channel::<Envelope>();
        let (observers, _) = broadcast::channel(config.orchestrator.status_buffer.max(1));
        let statuses: Arc<RwLock<HashMap<AgentId, AgentStatus>>> =
            Arc::new(RwLock::new(HashMap::new()));

        // 汇总所有 agent 的状态消息：先更新投影，再广播给观察者
        let forwarder = {
            let statuses = Arc::clone(&statuses);
            let observers = observers.clone();
            tokio::spawn(async move {
                while let Some(envelope) = status_rx.recv().await {
                    // 已移除的 agent 不再有投影，迟到的消息只广播
                    if let Some(status) = statuses.write().await.get_mut(&envelope.agent) {
                        status.apply(&envelope.message, envelope.timestamp);
                    }
                    // 没有订阅者时丢弃
                    let _ = observers.send(envelope);
                }
            })
        };

        Self {
            connector,
            tasks: Arc::new(tasks),
            settings: config.tasks.clone(),
            heuristics: config.heuristics.clone(),
            agents: Arc::new(RwLock::new(HashMap::new())),
            next_generation: AtomicU64::new(0),
            statuses,
            status_tx,
            observers,
            forwarder,
        }
    }

    /// 订阅所有 agent 的状态消息
    pub fn subscribe(&self) -> broadcast::Receiver<Envelope> {
        self.observers.subscribe()
    }

    /// 连接世界并启动一个 agent
    ///
    /// 先在同一把写锁下检查并预留 id，再连接世界；并发 spawn 同名 agent 时只有一个成功。
    /// 连接期间发来的控制消息在通道中排队，运行时启动后按序处理。
    pub async fn spawn(&self, spec: &AgentSpec) -> Result<(), ColonyError> {
        let username = spec.username.clone();
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        {
            let mut agents = self.agents.write().await;
            if agents.contains_key(&username) {
                return Err(ColonyError::AgentExists(username));
            }
            agents.insert(
                username.clone(),
                AgentHandle {
                    generation,
                    control_tx,
                    supervisor: None,
                },
            );
        }

        let (world, world_rx) = match self.connector.connect(&username).await {
            Ok(connection) => connection,
            Err(e) => {
                release(&self.agents, &username, generation).await;
                return Err(e.into());
            }
        };

        let default_task = spec.default_task.as_ref().map(|name| DefaultTask {
            name: name.clone(),
            data: spec.default_data.clone().unwrap_or(Value::Null),
        });
        let runtime = AgentRuntime::new(
            Arc::clone(&world),
            Arc::clone(&self.tasks),
            self.settings.clone(),
            self.heuristics.clone(),
            self.status_tx.clone(),
        )
        .with_default_task(default_task);

        let mut agents = self.agents.write().await;
        let reserved = agents
            .get(&username)
            .is_some_and(|h| h.generation == generation);
        if !reserved {
            // 连接期间被 remove / shutdown
            drop(agents);
            tracing::info!(agent = %username, "Agent removed while connecting");
            world.quit().await;
            return Err(ColonyError::AgentNotFound(username));
        }

        // 投影必须先于运行时存在，否则早到的 spawn 会被丢弃
        self.statuses
            .write()
            .await
            .insert(username.clone(), AgentStatus::new(username.clone()));

        let runtime_handle = tokio::spawn(runtime.run(control_rx, world_rx));
        let supervisor = tokio::spawn(supervise(
            username.clone(),
            generation,
            runtime_handle,
            world,
            self.status_tx.clone(),
            Arc::clone(&self.agents),
        ));
        if let Some(handle) = agents.get_mut(&username) {
            handle.supervisor = Some(supervisor);
        }
        drop(agents);

        tracing::info!(agent = %username, "Agent spawned");
        Ok(())
    }

    /// 启动配置中的全部 agent；单个失败不影响其他
    pub async fn spawn_all(&self, specs: &[AgentSpec]) -> Vec<(AgentId, ColonyError)> {
        let mut failures = Vec::new();
        for spec in specs {
            if let Err(e) = self.spawn(spec).await {
                tracing::error!(agent = %spec.username, "Failed to spawn agent: {}", e);
                failures.push((spec.username.clone(), e));
            }
        }
        failures
    }

    /// 向指定 agent 发送控制消息
    pub async fn send(&self, agent: &str, message: AgentMessage) -> Result<(), ColonyError> {
        if !message.is_control() {
            return Err(ColonyError::InvalidCommand(format!("{:?}", message)));
        }
        let agents = self.agents.read().await;
        let handle = agents
            .get(agent)
            .ok_or_else(|| ColonyError::AgentNotFound(agent.to_string()))?;
        handle
            .control_tx
            .send(message)
            .map_err(|_| ColonyError::ChannelClosed(agent.to_string()))
    }

    pub async fn set_state(&self, agent: &str, task_name: &str, data: Value) -> Result<(), ColonyError> {
        self.send(agent, AgentMessage::set_state(task_name, data)).await
    }

    pub async fn set_target(&self, agent: &str, target: Target) -> Result<(), ColonyError> {
        self.send(agent, AgentMessage::SetTarget { target }).await
    }

    pub async fn update(&self, agent: &str) -> Result<(), ColonyError> {
        self.send(agent, AgentMessage::Update).await
    }

    /// 向所有 agent 发送 update；返回成功投递的数量
    pub async fn broadcast_update(&self) -> usize {
        broadcast_update(&self.agents).await
    }

    /// 固定间隔向所有 agent 发送 update，直到 token 取消
    pub fn spawn_ticker(&self, period: Duration, token: CancellationToken) -> JoinHandle<()> {
        let agents = Arc::clone(&self.agents);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period.max(Duration::from_millis(1)));
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = interval.tick() => {
                        broadcast_update(&agents).await;
                    }
                }
            }
        })
    }

    pub async fn agent_ids(&self) -> Vec<AgentId> {
        let mut ids: Vec<AgentId> = self.agents.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// 最近的状态投影；agent 自行终止后保留最后状态，remove / shutdown 时删除
    pub async fn status(&self, agent: &str) -> Option<AgentStatus> {
        self.statuses.read().await.get(agent).cloned()
    }

    /// 停止并移除一个 agent，等待其拆除完成
    pub async fn remove(&self, agent: &str) -> Result<(), ColonyError> {
        let handle = self
            .agents
            .write()
            .await
            .remove(agent)
            .ok_or_else(|| ColonyError::AgentNotFound(agent.to_string()))?;
        let _ = handle.control_tx.send(AgentMessage::Stop);
        if let Some(supervisor) = handle.supervisor {
            if let Err(e) = supervisor.await {
                tracing::warn!(agent = %agent, "Supervisor join failed: {}", e);
            }
        }
        self.statuses.write().await.remove(agent);
        tracing::info!(agent = %agent, "Agent removed");
        Ok(())
    }

    /// 停止全部 agent
    pub async fn shutdown(&self) {
        let handles: Vec<(AgentId, AgentHandle)> = self.agents.write().await.drain().collect();
        tracing::info!("Shutting down {} agents", handles.len());
        for (_, handle) in &handles {
            let _ = handle.control_tx.send(AgentMessage::Stop);
        }
        let mut ids = Vec::with_capacity(handles.len());
        let mut supervisors = Vec::with_capacity(handles.len());
        for (id, handle) in handles {
            ids.push(id);
            supervisors.extend(handle.supervisor);
        }
        for result in futures_util::future::join_all(supervisors).await {
            if let Err(e) = result {
                tracing::warn!("Supervisor join failed: {}", e);
            }
        }
        let mut projections = self.statuses.write().await;
        for id in &ids {
            projections.remove(id);
        }
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        self.forwarder.abort();
    }
}

/// 等待运行时结束；崩溃时释放世界句柄并代为发出 error / disconnected。
/// 无论哪种结束方式都移除本代的 agent 条目，投影保留最后状态直到 remove 或重新 spawn。
async fn supervise(
    agent: AgentId,
    generation: u64,
    runtime: JoinHandle<TeardownReason>,
    world: Arc<dyn World>,
    status_tx: mpsc::UnboundedSender<Envelope>,
    agents: Arc<AgentTable>,
) {
    match runtime.await {
        Ok(reason) => {
            tracing::debug!(agent = %agent, "Runtime finished: {}", reason);
        }
        Err(e) => {
            // 运行时崩溃：任务无法再执行 exit，只能释放世界句柄
            tracing::error!(agent = %agent, "Agent runtime crashed: {}", e);
            world.quit().await;
            let _ = status_tx.send(Envelope::new(
                agent.clone(),
                AgentMessage::error(format!("agent runtime crashed: {e}")),
            ));
            let _ = status_tx.send(Envelope::new(
                agent.clone(),
                AgentMessage::Disconnected {
                    reason: "crashed".to_string(),
                },
            ));
        }
    }
    if release(&agents, &agent, generation).await {
        tracing::info!(agent = %agent, "Agent terminated and deregistered");
    }
}

/// 移除属于 generation 这一代的条目；已被移除或已被新一代替换时返回 false
async fn release(agents: &AgentTable, agent: &str, generation: u64) -> bool {
    let mut agents = agents.write().await;
    if agents.get(agent).is_some_and(|h| h.generation == generation) {
        agents.remove(agent);
        true
    } else {
        false
    }
}

async fn broadcast_update(agents: &AgentTable) -> usize {
    agents
        .read()
        .await
        .iter()
        .filter(|(id, handle)| {
            let ok = handle.control_tx.send(AgentMessage::Update).is_ok();
            if !ok {
                tracing::debug!(agent = %id, "Update not delivered: channel closed");
            }
            ok
        })
        .count()
}
