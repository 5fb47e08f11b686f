//! 距离启发式：候选位置到参考点的直线距离（越小越近）

use super::ScoreContext;
use crate::world::Vec3;

#[derive(Debug, Clone, Default)]
pub struct DistanceHeuristic {
    /// 固定参考点；未设置时使用 agent 当前位置
    origin: Option<Vec3>,
}

impl DistanceHeuristic {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_origin(&mut self, origin: Option<Vec3>) {
        self.origin = origin;
    }

    pub fn origin(&self) -> Option<Vec3> {
        self.origin
    }

    /// 参考点不可用（尚未出生）时返回 +∞
    pub fn score(&self, candidate: Vec3, ctx: ScoreContext<'_>) -> f64 {
        match self.origin.or_else(|| ctx.world.position()) {
            Some(origin) => origin.distance_to(&candidate),
            None => f64::INFINITY,
        }
    }
}
