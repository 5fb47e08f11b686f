//! 危险启发式：候选位置附近敌对实体的威胁累加
//!
//! 每个半径内的敌对实体贡献 (radius - d) / radius，越近贡献越接近 1。

use super::ScoreContext;
use crate::world::{EntityKind, Vec3};

#[derive(Debug, Clone)]
pub struct DangerHeuristic {
    radius: f64,
    /// 除 EntityKind::Hostile 外，额外视为敌对的实体名
    hostile_names: Vec<String>,
}

impl DangerHeuristic {
    pub fn new(radius: f64, hostile_names: Vec<String>) -> Self {
        Self {
            radius: radius.max(f64::EPSILON),
            hostile_names,
        }
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    pub fn set_radius(&mut self, radius: f64) {
        self.radius = radius.max(f64::EPSILON);
    }

    pub fn score(&self, candidate: Vec3, ctx: ScoreContext<'_>) -> f64 {
        ctx.world
            .entities()
            .iter()
            .filter(|e| e.kind == EntityKind::Hostile || self.hostile_names.contains(&e.name))
            .map(|e| e.position.distance_to(&candidate))
            .filter(|d| *d < self.radius)
            .map(|d| (self.radius - d) / self.radius)
            .sum()
    }
}
