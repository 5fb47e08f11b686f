//! 扰动启发式：挖开候选方块会惊动多少相邻的流体 / 可坠落方块

use super::ScoreContext;
use crate::world::Vec3;

#[derive(Debug, Clone)]
pub struct DisruptionHeuristic {
    disruptive_blocks: Vec<String>,
}

impl DisruptionHeuristic {
    pub fn new(disruptive_blocks: Vec<String>) -> Self {
        Self { disruptive_blocks }
    }

    pub fn disruptive_blocks(&self) -> &[String] {
        &self.disruptive_blocks
    }

    /// 相邻六格中属于扰动方块的数量
    pub fn score(&self, candidate: Vec3, ctx: ScoreContext<'_>) -> f64 {
        candidate
            .floored()
            .neighbors()
            .iter()
            .filter_map(|p| ctx.world.block_at(*p))
            .filter(|b| self.disruptive_blocks.iter().any(|name| *name == b.name))
            .count() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::MockWorld;

    #[test]
    fn test_counts_adjacent_fluids() {
        let world = MockWorld::new("bot");
        let target = Vec3::new(0.0, 10.0, 0.0);
        world.set_block(Vec3::new(0.0, 11.0, 0.0), "sand");
        world.set_block(Vec3::new(1.0, 10.0, 0.0), "water");
        world.set_block(Vec3::new(-1.0, 10.0, 0.0), "stone");
        world.set_block(Vec3::new(5.0, 10.0, 0.0), "lava");

        let h = DisruptionHeuristic::new(vec!["water".into(), "lava".into(), "sand".into()]);
        let ctx = ScoreContext { world: &world, goal: None };
        assert_eq!(h.score(target, ctx), 2.0);
    }
}
