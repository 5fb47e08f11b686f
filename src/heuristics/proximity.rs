//! 接近度启发式：候选位置距当前目标还差多远（进入目标半径即为 0）

use super::ScoreContext;
use crate::world::Vec3;

#[derive(Debug, Clone)]
pub struct ProximityHeuristic {
    /// 目标未指定半径（range <= 0）时使用的默认半径
    default_range: f64,
}

impl ProximityHeuristic {
    pub fn new(default_range: f64) -> Self {
        Self {
            default_range: default_range.max(0.0),
        }
    }

    /// 无目标时返回 0（不影响组合结果）
    pub fn score(&self, candidate: Vec3, ctx: ScoreContext<'_>) -> f64 {
        let Some(goal) = ctx.goal else {
            return 0.0;
        };
        let range = if goal.range > 0.0 {
            goal.range
        } else {
            self.default_range
        };
        (goal.position.distance_to(&candidate) - range).max(0.0)
    }
}
