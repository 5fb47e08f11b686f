//! 运行时：编排器 ⇄ agent 消息协议、单 agent 消息循环、多 agent 编排

pub mod agent;
pub mod message;
pub mod orchestrator;

pub use agent::{AgentRuntime, DefaultTask, TeardownReason};
pub use message::{AgentId, AgentMessage, Envelope};
pub use orchestrator::Orchestrator;
