//! mineBlock：挑选并挖掘一个方块，挖掉后自动结束
//!
//! 候选方块按 distance + danger + disruption 加权和排序（越小越好），
//! 选中的方块作为注册表目标，供其他启发式读取。

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{parse_vec3, Target, Task, TaskContext};
use crate::core::TaskError;
use crate::heuristics::{Goal, HeuristicRegistry};
use crate::world::{MoveGoal, Vec3, World, WorldError};

const DISTANCE_LABEL: &str = "distance";
const DANGER_LABEL: &str = "danger";
const DISRUPTION_LABEL: &str = "disruption";

const DANGER_WEIGHT: f64 = 8.0;
const DISRUPTION_WEIGHT: f64 = 4.0;
const MAX_CANDIDATES: usize = 16;

pub struct MineBlockTask {
    block: Option<String>,
    target: Option<Vec3>,
    dug: bool,
    reach: f64,
}

impl MineBlockTask {
    pub const NAME: &'static str = "mineBlock";

    pub fn from_data(data: &Value) -> Result<Self, TaskError> {
        let block = data.get("block").and_then(Value::as_str).map(str::to_string);
        let target = match data.get("position") {
            Some(p) => Some(parse_vec3(p).ok_or_else(|| {
                TaskError::invalid_data(Self::NAME, "position must be {x, y, z}")
            })?),
            None => None,
        };
        if block.is_none() && target.is_none() {
            return Err(TaskError::invalid_data(
                Self::NAME,
                "either block or position is required",
            ));
        }
        Ok(Self {
            block,
            target: target.map(|p| p.floored()),
            dug: false,
            reach: 0.0,
        })
    }

    pub fn target_position(&self) -> Option<Vec3> {
        self.target
    }

    /// 确保挖掘所需的启发式已注册（不覆盖调用方已设置的实例）
    fn ensure_heuristics(registry: &mut HeuristicRegistry) -> Result<(), TaskError> {
        for label in [DISTANCE_LABEL, DANGER_LABEL, DISRUPTION_LABEL] {
            if !registry.contains(label) {
                registry
                    .register(label, None)
                    .map_err(|e| TaskError::enter_failed(Self::NAME, e.to_string()))?;
            }
        }
        Ok(())
    }

    fn cost(registry: &HeuristicRegistry, world: &dyn World, candidate: Vec3) -> f64 {
        let score = |label: &str| registry.score(label, candidate, world).unwrap_or(0.0);
        score(DISTANCE_LABEL)
            + DANGER_WEIGHT * score(DANGER_LABEL)
            + DISRUPTION_WEIGHT * score(DISRUPTION_LABEL)
    }

    /// 在候选方块中选代价最小者
    fn choose(&self, ctx: &mut TaskContext) -> Result<Vec3, TaskError> {
        let name = self
            .block
            .as_deref()
            .ok_or_else(|| TaskError::enter_failed(Self::NAME, "no block type to search"))?;
        let candidates = ctx
            .world
            .find_blocks(name, ctx.settings.search_radius, MAX_CANDIDATES);
        Self::ensure_heuristics(&mut ctx.heuristics)?;
        candidates
            .into_iter()
            .map(|p| (p, Self::cost(&ctx.heuristics, ctx.world.as_ref(), p)))
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(p, _)| p)
            .ok_or_else(|| TaskError::enter_failed(Self::NAME, format!("no {name} in range")))
    }
}

#[async_trait]
impl Task for MineBlockTask {
    fn state_name(&self) -> &'static str {
        Self::NAME
    }

    fn autonomous(&self) -> bool {
        true
    }

    fn target(&self) -> Option<Target> {
        self.target.map(|position| Target::Block { position })
    }

    fn set_target(&mut self, target: Target) -> Result<(), TaskError> {
        match target {
            Target::Block { position } => {
                self.target = Some(position.floored());
                Ok(())
            }
            _ => Err(TaskError::invalid_data(Self::NAME, "target must be a block")),
        }
    }

    async fn enter(&mut self, ctx: &mut TaskContext) -> Result<(), TaskError> {
        self.dug = false;
        self.reach = ctx.settings.reach;
        if ctx.world.position().is_none() {
            return Err(TaskError::enter_failed(Self::NAME, "agent has not spawned"));
        }
        let target = match self.target {
            Some(p) => p,
            None => self.choose(ctx)?,
        };
        ctx.world
            .goto(MoveGoal::Near {
                position: target,
                range: (self.reach - 1.0).max(1.0),
            })
            .await?;
        // 只有真正开始前往目标后才发布为注册表目标
        ctx.heuristics.set_goal(Goal::new(target, self.reach));
        tracing::debug!(agent = %ctx.username, target = %target, "Mining block");
        self.target = Some(target);
        Ok(())
    }

    async fn update(&mut self, ctx: &mut TaskContext) -> Result<(), TaskError> {
        let Some(target) = self.target else {
            return Ok(());
        };
        if self.dug {
            return Ok(());
        }
        let block = ctx
            .world
            .block_at(target)
            .ok_or_else(|| WorldError::Unavailable(format!("block at {target}")))?;
        if block.is_air() {
            self.dug = true;
            return Ok(());
        }
        let origin = ctx
            .world
            .position()
            .ok_or_else(|| WorldError::Unavailable("own position".to_string()))?;
        if origin.distance_to(&target) <= self.reach {
            ctx.world.dig(target).await?;
            self.dug = true;
        }
        Ok(())
    }

    async fn exit(&mut self, ctx: &mut TaskContext) {
        ctx.world.stop().await;
        ctx.heuristics.clear_goal();
    }

    fn exit_condition(&self) -> bool {
        self.dug
    }

    fn report(&self) -> Value {
        json!({
            "block": self.block,
            "target": self.target,
            "dug": self.dug,
        })
    }
}
