//! 错误类型
//!
//! TaskError 在 Task Manager 边界被捕获并转为 error 状态消息；HeuristicError 对调用方立即可见（快速失败）；
//! ColonyError 是编排层对外的统一错误。

use thiserror::Error;

use crate::world::WorldError;

/// 任务生命周期中的错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TaskError {
    #[error("Unknown task name: {0}")]
    UnknownTaskName(String),

    #[error("Task '{task}' failed to enter: {reason}")]
    TaskEnterFailed { task: String, reason: String },

    #[error("Invalid data for task '{task}': {reason}")]
    InvalidTaskData { task: String, reason: String },

    #[error("World interaction error: {0}")]
    World(#[from] WorldError),
}

impl TaskError {
    pub fn enter_failed(task: &str, reason: impl Into<String>) -> Self {
        Self::TaskEnterFailed {
            task: task.to_string(),
            reason: reason.into(),
        }
    }

    pub fn invalid_data(task: &str, reason: impl Into<String>) -> Self {
        Self::InvalidTaskData {
            task: task.to_string(),
            reason: reason.into(),
        }
    }
}

/// 启发式注册表错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HeuristicError {
    #[error("Unknown heuristic type: {0}")]
    UnknownHeuristicType(String),

    #[error("Heuristic not found: {0}")]
    NotFound(String),
}

/// 编排层错误
#[derive(Error, Debug)]
pub enum ColonyError {
    #[error(transparent)]
    Task(#[from] TaskError),

    #[error(transparent)]
    Heuristic(#[from] HeuristicError),

    #[error(transparent)]
    World(#[from] WorldError),

    #[error("Agent not found: {0}")]
    AgentNotFound(String),

    #[error("Agent already exists: {0}")]
    AgentExists(String),

    #[error("Channel closed for agent: {0}")]
    ChannelClosed(String),

    /// 只有控制消息可以发往 agent
    #[error("Not a control message: {0}")]
    InvalidCommand(String),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_error_display() {
        let err = TaskError::enter_failed("followEntity", "target not visible");
        assert_eq!(
            err.to_string(),
            "Task 'followEntity' failed to enter: target not visible"
        );
    }

    #[test]
    fn test_world_error_converts() {
        let err: TaskError = WorldError::Disconnected.into();
        assert!(matches!(err, TaskError::World(WorldError::Disconnected)));
        let err: ColonyError = HeuristicError::NotFound("threat".into()).into();
        assert_eq!(err.to_string(), "Heuristic not found: threat");
    }
}
