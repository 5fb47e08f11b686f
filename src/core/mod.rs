//! 核心层：错误类型、状态投影、任务状态机、优雅关闭

pub mod error;
pub mod shutdown;
pub mod state;
pub mod task_manager;

pub use error::{ColonyError, HeuristicError, TaskError};
pub use shutdown::{
    run_with_graceful_shutdown, shutdown_when_all_disconnected, ShutdownManager, ShutdownReason,
};
pub use state::{AgentStatus, ConnectionPhase, ManagerPhase};
pub use task_manager::{TaskManager, Transition, UpdateOutcome};
