//! followEntity：跟随指定实体 / 玩家，距离小于 follow_distance 时自动结束
//!
//! data 可为 `{"entity": 12}`、`{"username": "steve"}` 或空（跟随最近的玩家）。
//! 目标变化通过 set_target + Manager.restart 处理，不在任务内部悄悄换目标。

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{Target, Task, TaskContext};
use crate::core::TaskError;
use crate::world::{Entity, EntityId, EntityKind, MoveGoal, World, WorldError};

pub struct FollowEntityTask {
    target: Option<Target>,
    /// enter 时解析出的实体
    following: Option<EntityId>,
    /// 最近一次 update 观测到的距离
    distance: Option<f64>,
    threshold: f64,
}

impl FollowEntityTask {
    pub const NAME: &'static str = "followEntity";

    pub fn new(target: Option<Target>) -> Self {
        Self {
            target,
            following: None,
            distance: None,
            threshold: 0.0,
        }
    }

    pub fn from_data(data: &Value) -> Result<Self, TaskError> {
        if let Some(id) = data.get("entity") {
            let id = id
                .as_u64()
                .ok_or_else(|| TaskError::invalid_data(Self::NAME, "entity must be an integer id"))?;
            return Ok(Self::new(Some(Target::Entity { id })));
        }
        if let Some(name) = data.get("username") {
            let username = name
                .as_str()
                .ok_or_else(|| TaskError::invalid_data(Self::NAME, "username must be a string"))?;
            return Ok(Self::new(Some(Target::Player {
                username: username.to_string(),
            })));
        }
        if let Some(target) = data.get("target") {
            let target: Target = serde_json::from_value(target.clone())
                .map_err(|e| TaskError::invalid_data(Self::NAME, e.to_string()))?;
            return Ok(Self::new(Some(target)));
        }
        Ok(Self::new(None))
    }

    pub fn distance(&self) -> Option<f64> {
        self.distance
    }

    fn resolve(&self, world: &dyn World) -> Option<Entity> {
        match &self.target {
            Some(Target::Entity { id }) => world.entity(*id),
            Some(Target::Player { username }) => world.player(username),
            Some(Target::Block { .. }) => None,
            None => {
                let origin = world.position()?;
                world
                    .entities()
                    .into_iter()
                    .filter(|e| e.kind == EntityKind::Player)
                    .min_by(|a, b| {
                        a.position
                            .distance_to(&origin)
                            .total_cmp(&b.position.distance_to(&origin))
                    })
            }
        }
    }
}

#[async_trait]
impl Task for FollowEntityTask {
    fn state_name(&self) -> &'static str {
        Self::NAME
    }

    fn autonomous(&self) -> bool {
        true
    }

    fn target(&self) -> Option<Target> {
        self.target.clone()
    }

    fn set_target(&mut self, target: Target) -> Result<(), TaskError> {
        if matches!(target, Target::Block { .. }) {
            return Err(TaskError::invalid_data(Self::NAME, "cannot follow a block"));
        }
        self.target = Some(target);
        Ok(())
    }

    async fn enter(&mut self, ctx: &mut TaskContext) -> Result<(), TaskError> {
        self.following = None;
        self.distance = None;
        self.threshold = ctx.settings.follow_distance;

        let entity = self.resolve(ctx.world.as_ref()).ok_or_else(|| {
            TaskError::enter_failed(Self::NAME, format!("target {:?} is not visible", self.target))
        })?;
        ctx.world
            .goto(MoveGoal::Follow {
                entity: entity.id,
                range: (self.threshold - 1.0).max(1.0),
            })
            .await?;
        tracing::debug!(agent = %ctx.username, target = %entity.name, "Following entity");
        self.following = Some(entity.id);
        Ok(())
    }

    async fn update(&mut self, ctx: &mut TaskContext) -> Result<(), TaskError> {
        let Some(id) = self.following else {
            return Ok(());
        };
        let entity = ctx
            .world
            .entity(id)
            .ok_or_else(|| WorldError::Unavailable(format!("entity {id} left view")))?;
        let origin = ctx
            .world
            .position()
            .ok_or_else(|| WorldError::Unavailable("own position".to_string()))?;
        self.distance = Some(origin.distance_to(&entity.position));
        Ok(())
    }

    async fn exit(&mut self, ctx: &mut TaskContext) {
        ctx.world.stop().await;
        self.following = None;
    }

    fn exit_condition(&self) -> bool {
        self.distance.is_some_and(|d| d < self.threshold)
    }

    fn report(&self) -> Value {
        json!({
            "target": self.target,
            "entity": self.following,
            "distance": self.distance,
        })
    }
}
