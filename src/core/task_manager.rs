//! Task Manager：每个 agent 的任务状态机
//!
//! 状态：Idle（无任务）⇄ Active（恰好一个任务）。切换任务总是先 exit 旧任务再 enter 新任务；
//! enter 失败时不记录为活跃任务，错误返回给调用方（由 Agent Runtime 转为 error 状态消息）。
//! 只由所属 Agent Runtime 的消息循环修改（单写者），因此内部无锁。

use serde_json::Value;

use crate::core::state::ManagerPhase;
use crate::core::TaskError;
use crate::tasks::{Target, Task, TaskContext};

/// enter / set_target 的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// 新任务已进入
    Entered,
    /// 当前任务以新目标重新进入
    Restarted,
    /// 同一任务、同一目标：不做任何事
    Unchanged,
}

/// update 的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// 没有活跃任务
    Idle,
    /// 任务继续运行
    Continued,
    /// 自主任务满足退出条件，已自动退出
    Exited { task: &'static str },
}

#[derive(Default)]
pub struct TaskManager {
    active: Option<Box<dyn Task>>,
    running: bool,
}

impl TaskManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> ManagerPhase {
        if self.active.is_some() {
            ManagerPhase::Active
        } else {
            ManagerPhase::Idle
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn active_name(&self) -> Option<&'static str> {
        self.active.as_ref().map(|t| t.state_name())
    }

    pub fn active_target(&self) -> Option<Target> {
        self.active.as_ref().and_then(|t| t.target())
    }

    /// 进入任务；同名且同目标的任务已活跃时为 no-op
    pub async fn enter(
        &mut self,
        mut task: Box<dyn Task>,
        ctx: &mut TaskContext,
    ) -> Result<Transition, TaskError> {
        if let Some(active) = &self.active {
            if active.state_name() == task.state_name() && active.target() == task.target() {
                tracing::debug!(agent = %ctx.username, task = task.state_name(), "Redundant transition ignored");
                return Ok(Transition::Unchanged);
            }
        }

        self.exit(ctx).await;

        let name = task.state_name();
        match task.enter(ctx).await {
            Ok(()) => {
                tracing::info!(agent = %ctx.username, task = name, "Task entered");
                self.active = Some(task);
                self.running = true;
                Ok(Transition::Entered)
            }
            Err(e) => {
                tracing::warn!(agent = %ctx.username, task = name, "Task enter failed: {}", e);
                Err(e)
            }
        }
    }

    /// 退出当前任务并回到 Idle；返回被退出的任务名
    pub async fn exit(&mut self, ctx: &mut TaskContext) -> Option<&'static str> {
        let mut task = self.active.take()?;
        self.running = false;
        let name = task.state_name();
        task.exit(ctx).await;
        tracing::info!(agent = %ctx.username, task = name, "Task exited");
        Some(name)
    }

    /// 执行一次 update；自主任务随后检查退出条件，为真立即 exit
    ///
    /// update 出错时任务保持活跃，错误交给调用方上报。
    pub async fn update(&mut self, ctx: &mut TaskContext) -> Result<UpdateOutcome, TaskError> {
        let Some(task) = self.active.as_mut() else {
            return Ok(UpdateOutcome::Idle);
        };
        task.update(ctx).await?;

        if !task.autonomous() || !task.exit_condition() {
            return Ok(UpdateOutcome::Continued);
        }
        match self.exit(ctx).await {
            Some(name) => {
                tracing::info!(agent = %ctx.username, task = name, "Exit condition met");
                Ok(UpdateOutcome::Exited { task: name })
            }
            None => Ok(UpdateOutcome::Idle),
        }
    }

    /// Idle 时为 no-op（返回 false）；否则 exit 后立即以当前（可能已更新的）目标重新 enter
    pub async fn restart(&mut self, ctx: &mut TaskContext) -> Result<bool, TaskError> {
        let Some(mut task) = self.active.take() else {
            return Ok(false);
        };
        self.running = false;
        let name = task.state_name();
        task.exit(ctx).await;
        match task.enter(ctx).await {
            Ok(()) => {
                tracing::info!(agent = %ctx.username, task = name, "Task restarted");
                self.active = Some(task);
                self.running = true;
                Ok(true)
            }
            Err(e) => {
                tracing::warn!(agent = %ctx.username, task = name, "Task restart failed: {}", e);
                Err(e)
            }
        }
    }

    /// 更新活跃任务的目标：与当前目标相同则不动，否则保存并 restart
    pub async fn set_target(
        &mut self,
        target: Target,
        ctx: &mut TaskContext,
    ) -> Result<Transition, TaskError> {
        let Some(task) = self.active.as_mut() else {
            tracing::debug!(agent = %ctx.username, "set_target ignored: no active task");
            return Ok(Transition::Unchanged);
        };
        if task.target().as_ref() == Some(&target) {
            return Ok(Transition::Unchanged);
        }
        task.set_target(target)?;
        self.restart(ctx).await?;
        Ok(Transition::Restarted)
    }

    /// 活跃任务上报的状态；Idle 时为 null
    pub fn report(&self) -> Value {
        self.active
            .as_ref()
            .map(|t| t.report())
            .unwrap_or(Value::Null)
    }

    /// 强制退出（agent 销毁路径）
    pub async fn shutdown(&mut self, ctx: &mut TaskContext) {
        if let Some(name) = self.exit(ctx).await {
            tracing::debug!(agent = %ctx.username, task = name, "Task force-exited on shutdown");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    use super::*;
    use crate::tasks::testing::{context, Probe, ProbeTask};
    use crate::tasks::FollowEntityTask;
    use crate::world::{Entity, EntityKind, Vec3};

    fn probe_task(probe: &Arc<Probe>) -> Box<dyn Task> {
        Box::new(ProbeTask::new("probe", Arc::clone(probe)))
    }

    #[tokio::test]
    async fn test_initially_idle() {
        let manager = TaskManager::new();
        assert_eq!(manager.phase(), ManagerPhase::Idle);
        assert!(!manager.is_running());
        assert_eq!(manager.report(), Value::Null);
    }

    #[tokio::test]
    async fn test_transition_exits_before_enter_and_never_overlaps() {
        let (mut ctx, _world) = context();
        let probe = Arc::new(Probe::default());
        let mut manager = TaskManager::new();

        for i in 0..5u64 {
            let task = ProbeTask::new("probe", Arc::clone(&probe)).with_target(Target::Entity { id: i });
            manager.enter(Box::new(task), &mut ctx).await.unwrap();
            assert_eq!(probe.live.load(Ordering::SeqCst), 1);
        }
        manager.exit(&mut ctx).await;
        manager.exit(&mut ctx).await;

        assert_eq!(probe.enters(), 5);
        assert_eq!(probe.exits(), 5);
        assert_eq!(probe.max_live.load(Ordering::SeqCst), 1);
        assert_eq!(manager.phase(), ManagerPhase::Idle);
    }

    #[tokio::test]
    async fn test_same_task_same_target_is_noop() {
        let (mut ctx, _world) = context();
        let probe = Arc::new(Probe::default());
        let mut manager = TaskManager::new();
        let target = Target::Player { username: "alex".into() };

        let first = ProbeTask::new("probe", Arc::clone(&probe)).with_target(target.clone());
        let second = ProbeTask::new("probe", Arc::clone(&probe)).with_target(target);
        assert_eq!(manager.enter(Box::new(first), &mut ctx).await.unwrap(), Transition::Entered);
        assert_eq!(manager.enter(Box::new(second), &mut ctx).await.unwrap(), Transition::Unchanged);
        assert_eq!(probe.enters(), 1);
        assert_eq!(probe.exits(), 0);
    }

    #[tokio::test]
    async fn test_restart_on_idle_is_noop() {
        let (mut ctx, _world) = context();
        let mut manager = TaskManager::new();
        assert!(!manager.restart(&mut ctx).await.unwrap());
        assert_eq!(manager.phase(), ManagerPhase::Idle);
    }

    #[tokio::test]
    async fn test_restart_runs_exit_then_enter() {
        let (mut ctx, _world) = context();
        let probe = Arc::new(Probe::default());
        let mut manager = TaskManager::new();
        manager.enter(probe_task(&probe), &mut ctx).await.unwrap();

        assert!(manager.restart(&mut ctx).await.unwrap());
        assert_eq!(probe.enters(), 2);
        assert_eq!(probe.exits(), 1);
        assert_eq!(manager.active_name(), Some("probe"));
    }

    #[tokio::test]
    async fn test_set_target_identical_is_idempotent() {
        let (mut ctx, _world) = context();
        let probe = Arc::new(Probe::default());
        let mut manager = TaskManager::new();
        let target = Target::Entity { id: 7 };
        let task = ProbeTask::new("probe", Arc::clone(&probe)).with_target(target.clone());
        manager.enter(Box::new(task), &mut ctx).await.unwrap();

        for _ in 0..3 {
            let t = manager.set_target(target.clone(), &mut ctx).await.unwrap();
            assert_eq!(t, Transition::Unchanged);
        }
        assert_eq!(probe.enters(), 1);
        assert_eq!(probe.exits(), 0);
    }

    #[tokio::test]
    async fn test_set_target_changed_restarts_once() {
        let (mut ctx, _world) = context();
        let probe = Arc::new(Probe::default());
        let mut manager = TaskManager::new();
        let task = ProbeTask::new("probe", Arc::clone(&probe)).with_target(Target::Entity { id: 1 });
        manager.enter(Box::new(task), &mut ctx).await.unwrap();

        let t = manager
            .set_target(Target::Entity { id: 2 }, &mut ctx)
            .await
            .unwrap();
        assert_eq!(t, Transition::Restarted);
        assert_eq!(probe.enters(), 2);
        assert_eq!(probe.exits(), 1);
        assert_eq!(manager.active_target(), Some(Target::Entity { id: 2 }));
    }

    #[tokio::test]
    async fn test_autonomous_exit_on_condition_tick() {
        let (mut ctx, _world) = context();
        let probe = Arc::new(Probe::default());
        let mut manager = TaskManager::new();
        let task = ProbeTask::new("probe", Arc::clone(&probe)).autonomous_after(3);
        manager.enter(Box::new(task), &mut ctx).await.unwrap();

        assert_eq!(manager.update(&mut ctx).await.unwrap(), UpdateOutcome::Continued);
        assert_eq!(manager.update(&mut ctx).await.unwrap(), UpdateOutcome::Continued);
        assert_eq!(
            manager.update(&mut ctx).await.unwrap(),
            UpdateOutcome::Exited { task: "probe" }
        );
        assert_eq!(manager.phase(), ManagerPhase::Idle);
        assert_eq!(probe.exits(), 1);
        assert_eq!(manager.update(&mut ctx).await.unwrap(), UpdateOutcome::Idle);
        assert_eq!(probe.updates(), 3);
    }

    #[tokio::test]
    async fn test_non_autonomous_never_auto_exits() {
        let (mut ctx, _world) = context();
        let probe = Arc::new(Probe::default());
        let mut manager = TaskManager::new();
        let mut task = ProbeTask::new("probe", Arc::clone(&probe));
        task.exit_after = Some(1);
        manager.enter(Box::new(task), &mut ctx).await.unwrap();

        for _ in 0..3 {
            assert_eq!(manager.update(&mut ctx).await.unwrap(), UpdateOutcome::Continued);
        }
        assert_eq!(probe.exits(), 0);
    }

    #[tokio::test]
    async fn test_enter_failure_leaves_manager_idle() {
        let (mut ctx, _world) = context();
        let probe = Arc::new(Probe::default());
        let mut manager = TaskManager::new();
        let task = ProbeTask::new("probe", Arc::clone(&probe)).failing_enter();

        let err = manager.enter(Box::new(task), &mut ctx).await.unwrap_err();
        assert!(matches!(err, TaskError::TaskEnterFailed { .. }));
        assert_eq!(manager.phase(), ManagerPhase::Idle);
        assert_eq!(probe.exits(), 0);
    }

    #[tokio::test]
    async fn test_update_error_keeps_task_active() {
        let (mut ctx, _world) = context();
        let probe = Arc::new(Probe::default());
        let mut manager = TaskManager::new();
        let task = ProbeTask::new("probe", Arc::clone(&probe)).failing_update();
        manager.enter(Box::new(task), &mut ctx).await.unwrap();

        assert!(manager.update(&mut ctx).await.is_err());
        assert_eq!(manager.phase(), ManagerPhase::Active);
        assert_eq!(probe.exits(), 0);
    }

    #[tokio::test]
    async fn test_follow_scenario() {
        let (mut ctx, world) = context();
        world.set_position(Some(Vec3::new(0.0, 64.0, 0.0)));
        world.upsert_entity(Entity {
            id: 11,
            kind: EntityKind::Player,
            name: "entityA".into(),
            position: Vec3::new(10.0, 64.0, 0.0),
        });
        let mut manager = TaskManager::new();
        let task = FollowEntityTask::new(Some(Target::Entity { id: 11 }));
        manager.enter(Box::new(task), &mut ctx).await.unwrap();
        assert_eq!(manager.active_name(), Some("followEntity"));

        assert_eq!(manager.update(&mut ctx).await.unwrap(), UpdateOutcome::Continued);
        assert_eq!(manager.phase(), ManagerPhase::Active);

        world.set_position(Some(Vec3::new(8.0, 64.0, 0.0)));
        assert_eq!(
            manager.update(&mut ctx).await.unwrap(),
            UpdateOutcome::Exited { task: "followEntity" }
        );
        assert_eq!(manager.phase(), ManagerPhase::Idle);
    }
}
