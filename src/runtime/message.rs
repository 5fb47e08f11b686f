//! 编排器 ⇄ agent 消息协议
//!
//! 控制消息（setState / update / setTarget / stop）发往 agent；
//! 状态消息（spawn / error / stateUpdate / disconnected）由 agent 发回。
//! 每个 agent 的通道保证 FIFO，不同 agent 之间不保证顺序。

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::tasks::Target;

/// agent 标识（即世界中的用户名）
pub type AgentId = String;

/// 消息类型
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum AgentMessage {
    /// 切换到指定任务
    SetState {
        #[serde(rename = "taskName")]
        task_name: String,
        #[serde(default)]
        data: Value,
    },

    /// 执行一次 update 并回报 stateUpdate
    Update,

    /// 更新当前任务目标（相同目标为 no-op）
    SetTarget { target: Target },

    /// 主动拆除 agent
    Stop,

    /// 已在世界中出生
    Spawn { username: String },

    /// 任务失败或世界侧错误
    Error { message: String },

    /// update 后的状态上报；state 由任务决定，运行时不解释
    StateUpdate {
        state: Value,
        #[serde(rename = "activeTaskName")]
        active_task_name: Option<String>,
    },

    /// 拆除完成
    Disconnected { reason: String },
}

impl AgentMessage {
    /// 编排器 -> agent 方向
    pub fn is_control(&self) -> bool {
        matches!(
            self,
            AgentMessage::SetState { .. }
                | AgentMessage::Update
                | AgentMessage::SetTarget { .. }
                | AgentMessage::Stop
        )
    }

    pub fn set_state(task_name: impl Into<String>, data: Value) -> Self {
        AgentMessage::SetState {
            task_name: task_name.into(),
            data,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        AgentMessage::Error {
            message: message.into(),
        }
    }
}

/// 带元信息的完整消息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub id: String,
    pub agent: AgentId,
    pub message: AgentMessage,
    /// 时间戳（毫秒）
    pub timestamp: i64,
}

impl Envelope {
    pub fn new(agent: impl Into<AgentId>, message: AgentMessage) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            agent: agent.into(),
            message,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wire_shape() {
        let msg = AgentMessage::set_state("followEntity", json!({ "username": "steve" }));
        let v = serde_json::to_value(&msg).unwrap();
        assert_eq!(v["type"], "setState");
        assert_eq!(v["taskName"], "followEntity");

        let v = serde_json::to_value(AgentMessage::StateUpdate {
            state: json!({}),
            active_task_name: None,
        })
        .unwrap();
        assert_eq!(v["type"], "stateUpdate");
        assert!(v["activeTaskName"].is_null());
    }

    #[test]
    fn test_parse_inbound_command() {
        let msg: AgentMessage = serde_json::from_str(r#"{"type":"update"}"#).unwrap();
        assert_eq!(msg, AgentMessage::Update);
        assert!(msg.is_control());

        let msg: AgentMessage =
            serde_json::from_str(r#"{"type":"setState","taskName":"lookAtPlayers"}"#).unwrap();
        assert_eq!(msg, AgentMessage::set_state("lookAtPlayers", Value::Null));
        assert!(!AgentMessage::error("x").is_control());
    }
}
