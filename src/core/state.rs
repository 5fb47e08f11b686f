//! 状态定义：Task Manager 阶段与 agent 状态投影
//!
//! 编排器只持有轻量的 AgentStatus（连接阶段、活跃任务、最近一次上报、错误），
//! 由各 agent 发来的状态消息投影得到；不读取 agent 内部状态。

use serde::Serialize;
use serde_json::Value;

use crate::runtime::AgentMessage;

/// Task Manager 阶段
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ManagerPhase {
    Idle,
    Active,
}

/// agent 连接阶段（编排器视角）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionPhase {
    /// 已创建运行时，等待世界侧 spawn
    Connecting,
    Spawned,
    Disconnected,
}

/// 编排器看到的「投影」状态
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentStatus {
    pub username: String,
    pub connection: ConnectionPhase,
    pub active_task: Option<String>,
    pub state: Value,
    pub last_error: Option<String>,
    /// 最近一次更新时间（毫秒）
    pub updated_at: i64,
}

impl AgentStatus {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            connection: ConnectionPhase::Connecting,
            active_task: None,
            state: Value::Null,
            last_error: None,
            updated_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Manager 阶段由最近上报的活跃任务推断
    pub fn phase(&self) -> ManagerPhase {
        if self.active_task.is_some() {
            ManagerPhase::Active
        } else {
            ManagerPhase::Idle
        }
    }

    /// 将一条状态消息投影到本结构；控制消息忽略
    pub fn apply(&mut self, message: &AgentMessage, timestamp: i64) {
        match message {
            AgentMessage::Spawn { .. } => {
                self.connection = ConnectionPhase::Spawned;
            }
            AgentMessage::StateUpdate {
                state,
                active_task_name,
            } => {
                self.state = state.clone();
                self.active_task = active_task_name.clone();
            }
            AgentMessage::Error { message } => {
                self.last_error = Some(message.clone());
            }
            AgentMessage::Disconnected { .. } => {
                self.connection = ConnectionPhase::Disconnected;
                self.active_task = None;
            }
            _ => return,
        }
        self.updated_at = timestamp;
    }
}
