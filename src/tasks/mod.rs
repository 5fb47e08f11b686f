//! 任务（行为）：enter / update / exit 生命周期 + 退出条件
//!
//! 每个任务实现 Task trait，由 TaskRegistry 按名称构造，交给 Task Manager 驱动。
//! 任务自行持有其定时器 / 后台轮询（见 periodic::Ticker），并在 exit 中释放。
//! 自主任务（autonomous）在每次 update 后由 Manager 评估 exit_condition，为真即自动退出。

pub mod craft;
pub mod follow;
pub mod look;
pub mod mine;
pub mod periodic;
pub mod registry;
pub mod report;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::TaskError;
use crate::heuristics::{HeuristicParams, HeuristicRegistry};
use crate::world::{EntityId, Vec3, World};

pub use craft::{aggregate_ingredients, PlanCraftTask, Recipe};
pub use follow::FollowEntityTask;
pub use look::LookAtPlayersTask;
pub use mine::MineBlockTask;
pub use periodic::Ticker;
pub use registry::{TaskFactory, TaskRegistry};
pub use report::ReportStatusTask;

/// 任务目标；按值比较即「同一目标」
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Target {
    Entity { id: EntityId },
    Player { username: String },
    Block { position: Vec3 },
}

/// 任务相关参数（对应配置 [tasks] 段）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TaskSettings {
    /// 跟随任务在距离小于该值时自动结束
    pub follow_distance: f64,
    pub look_interval_ms: u64,
    pub report_interval_ms: u64,
    /// 可挖掘距离
    pub reach: f64,
    /// 方块搜索半径
    pub search_radius: f64,
    /// 自主任务退出后进入的任务（为空则回到 Idle）
    pub fallback_task: Option<String>,
}

impl Default for TaskSettings {
    fn default() -> Self {
        Self {
            follow_distance: 3.0,
            look_interval_ms: 200,
            report_interval_ms: 5000,
            reach: 4.5,
            search_radius: 32.0,
            fallback_task: None,
        }
    }
}

/// 任务执行上下文：每个 agent 一份，由 Agent Runtime 独占
pub struct TaskContext {
    pub username: String,
    pub world: Arc<dyn World>,
    pub heuristics: HeuristicRegistry,
    pub settings: TaskSettings,
}

impl TaskContext {
    pub fn new(world: Arc<dyn World>, heuristics: HeuristicParams, settings: TaskSettings) -> Self {
        Self {
            username: world.username().to_string(),
            world,
            heuristics: HeuristicRegistry::new(heuristics),
            settings,
        }
    }
}

/// 任务 trait
#[async_trait]
pub trait Task: Send {
    /// 稳定的任务名（如 followEntity）
    fn state_name(&self) -> &'static str;

    /// 是否通过 exit_condition 自行结束
    fn autonomous(&self) -> bool {
        false
    }

    fn target(&self) -> Option<Target> {
        None
    }

    /// 仅保存新目标，重新进入由 Manager 负责
    fn set_target(&mut self, target: Target) -> Result<(), TaskError> {
        let _ = target;
        Err(TaskError::invalid_data(
            self.state_name(),
            "task does not accept a target",
        ))
    }

    async fn enter(&mut self, ctx: &mut TaskContext) -> Result<(), TaskError>;

    async fn update(&mut self, ctx: &mut TaskContext) -> Result<(), TaskError> {
        let _ = ctx;
        Ok(())
    }

    /// 释放任务持有的全部资源（定时器、移动目标等）；每次离开都会调用
    async fn exit(&mut self, ctx: &mut TaskContext);

    /// 只读取任务自身状态，不做去抖
    fn exit_condition(&self) -> bool {
        false
    }

    /// stateUpdate 中携带的行为相关状态，运行时不解释
    fn report(&self) -> Value {
        Value::Null
    }
}

/// 从任务数据中读取 f64 三元组坐标
pub(crate) fn parse_vec3(value: &Value) -> Option<Vec3> {
    serde_json::from_value(value.clone()).ok()
}

#[cfg(test)]
pub(crate) mod testing {
    //! 测试用任务：记录 enter / exit 次数，可配置失败与退出条件

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::world::MockWorld;

    #[derive(Debug, Default)]
    pub struct Probe {
        pub enters: AtomicUsize,
        pub exits: AtomicUsize,
        pub updates: AtomicUsize,
        /// 同时活跃的实例数（用于验证不重叠）
        pub live: AtomicUsize,
        pub max_live: AtomicUsize,
    }

    impl Probe {
        pub fn enters(&self) -> usize {
            self.enters.load(Ordering::SeqCst)
        }
        pub fn exits(&self) -> usize {
            self.exits.load(Ordering::SeqCst)
        }
        pub fn updates(&self) -> usize {
            self.updates.load(Ordering::SeqCst)
        }
    }

    pub struct ProbeTask {
        pub name: &'static str,
        pub probe: Arc<Probe>,
        pub target: Option<Target>,
        pub autonomous: bool,
        /// 第 N 次 update 后退出条件为真
        pub exit_after: Option<usize>,
        pub fail_enter: bool,
        pub fail_update: bool,
        ticks: usize,
    }

    impl ProbeTask {
        pub fn new(name: &'static str, probe: Arc<Probe>) -> Self {
            Self {
                name,
                probe,
                target: None,
                autonomous: false,
                exit_after: None,
                fail_enter: false,
                fail_update: false,
                ticks: 0,
            }
        }

        pub fn with_target(mut self, target: Target) -> Self {
            self.target = Some(target);
            self
        }

        pub fn autonomous_after(mut self, ticks: usize) -> Self {
            self.autonomous = true;
            self.exit_after = Some(ticks);
            self
        }

        pub fn failing_enter(mut self) -> Self {
            self.fail_enter = true;
            self
        }

        pub fn failing_update(mut self) -> Self {
            self.fail_update = true;
            self
        }
    }

    #[async_trait]
    impl Task for ProbeTask {
        fn state_name(&self) -> &'static str {
            self.name
        }

        fn autonomous(&self) -> bool {
            self.autonomous
        }

        fn target(&self) -> Option<Target> {
            self.target.clone()
        }

        fn set_target(&mut self, target: Target) -> Result<(), TaskError> {
            self.target = Some(target);
            Ok(())
        }

        async fn enter(&mut self, _ctx: &mut TaskContext) -> Result<(), TaskError> {
            if self.fail_enter {
                return Err(TaskError::enter_failed(self.name, "probe refused"));
            }
            self.ticks = 0;
            self.probe.enters.fetch_add(1, Ordering::SeqCst);
            let live = self.probe.live.fetch_add(1, Ordering::SeqCst) + 1;
            self.probe.max_live.fetch_max(live, Ordering::SeqCst);
            Ok(())
        }

        async fn update(&mut self, _ctx: &mut TaskContext) -> Result<(), TaskError> {
            self.probe.updates.fetch_add(1, Ordering::SeqCst);
            if self.fail_update {
                return Err(TaskError::World(crate::world::WorldError::Unavailable(
                    "probe".into(),
                )));
            }
            self.ticks += 1;
            Ok(())
        }

        async fn exit(&mut self, _ctx: &mut TaskContext) {
            self.probe.exits.fetch_add(1, Ordering::SeqCst);
            self.probe.live.fetch_sub(1, Ordering::SeqCst);
        }

        fn exit_condition(&self) -> bool {
            self.exit_after.is_some_and(|n| self.ticks >= n)
        }

        fn report(&self) -> Value {
            serde_json::json!({ "ticks": self.ticks })
        }
    }

    pub fn context() -> (TaskContext, Arc<MockWorld>) {
        let world = Arc::new(MockWorld::new("tester"));
        let ctx = TaskContext::new(
            world.clone(),
            HeuristicParams::default(),
            TaskSettings::default(),
        );
        (ctx, world)
    }
}
