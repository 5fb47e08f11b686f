//! Colony - 多智能体任务编排
//!
//! 模块划分：
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误类型、状态投影、任务状态机、优雅关闭
//! - **heuristics**: 启发式注册表与评分策略（距离 / 危险 / 接近目标 / 破坏性）
//! - **observability**: 日志初始化
//! - **runtime**: 消息协议、单 agent 运行时、多 agent 编排器
//! - **tasks**: 任务抽象、任务注册表与内置任务
//! - **world**: 世界接口（事实查询 + 动作）与内存模拟实现

pub mod config;
pub mod core;
pub mod heuristics;
pub mod observability;
pub mod runtime;
pub mod tasks;
pub mod world;

pub use config::{load_config, AgentSpec, AppConfig};
pub use runtime::{AgentMessage, Envelope, Orchestrator};
