//! 任务注册表
//!
//! 任务名 -> 构造函数；setState 按名称查找构造函数，未知名称返回 UnknownTaskName。

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use super::{
    FollowEntityTask, LookAtPlayersTask, MineBlockTask, PlanCraftTask, ReportStatusTask, Task,
};
use crate::core::TaskError;

/// 任务构造函数：由 setState 的 data 构造一个新实例
pub type TaskFactory = Arc<dyn Fn(&Value) -> Result<Box<dyn Task>, TaskError> + Send + Sync>;

/// 任务注册表：按名称存放构造函数
#[derive(Default, Clone)]
pub struct TaskRegistry {
    factories: HashMap<String, TaskFactory>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册全部内置任务
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(LookAtPlayersTask::NAME, |_| Ok(Box::new(LookAtPlayersTask::new())));
        registry.register(FollowEntityTask::NAME, |data| {
            Ok(Box::new(FollowEntityTask::from_data(data)?))
        });
        registry.register(MineBlockTask::NAME, |data| {
            Ok(Box::new(MineBlockTask::from_data(data)?))
        });
        registry.register(ReportStatusTask::NAME, |_| Ok(Box::new(ReportStatusTask::new())));
        registry.register(PlanCraftTask::NAME, |data| {
            Ok(Box::new(PlanCraftTask::from_data(data)?))
        });
        registry
    }

    pub fn register<F>(&mut self, name: &str, factory: F)
    where
        F: Fn(&Value) -> Result<Box<dyn Task>, TaskError> + Send + Sync + 'static,
    {
        self.factories.insert(name.to_string(), Arc::new(factory));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn create(&self, name: &str, data: &Value) -> Result<Box<dyn Task>, TaskError> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| TaskError::UnknownTaskName(name.to_string()))?;
        factory(data)
    }

    pub fn task_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }
}
