//! 启发式注册表
//!
//! 每个 agent 一份：按类型创建实例、以 label 存放（默认 label 为类型名）、按 label 查找。
//! 注册未知类型在修改映射之前就失败，不会留下半写入的条目。

use std::collections::HashMap;

use serde::Deserialize;

use super::{
    DangerHeuristic, DisruptionHeuristic, DistanceHeuristic, Goal, Heuristic, HeuristicKind,
    ProximityHeuristic, ScoreContext, Strategy,
};
use crate::core::HeuristicError;
use crate::world::{Vec3, World};

/// 各启发式的初始参数（对应配置 [heuristics] 段）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HeuristicParams {
    pub danger_radius: f64,
    /// 额外视为敌对的实体名
    pub hostile_names: Vec<String>,
    pub disruptive_blocks: Vec<String>,
    pub proximity_range: f64,
}

impl Default for HeuristicParams {
    fn default() -> Self {
        Self {
            danger_radius: 16.0,
            hostile_names: Vec::new(),
            disruptive_blocks: vec![
                "water".into(),
                "lava".into(),
                "sand".into(),
                "gravel".into(),
            ],
            proximity_range: 1.0,
        }
    }
}

/// 启发式注册表：label -> Heuristic，外加注册表级「当前目标」
#[derive(Debug, Default)]
pub struct HeuristicRegistry {
    params: HeuristicParams,
    active: HashMap<String, Heuristic>,
    goal: Option<Goal>,
}

impl HeuristicRegistry {
    pub fn new(params: HeuristicParams) -> Self {
        Self {
            params,
            active: HashMap::new(),
            goal: None,
        }
    }

    /// 纯工厂：不修改注册表
    pub fn create(&self, kind: &str) -> Result<Heuristic, HeuristicError> {
        let kind: HeuristicKind = kind.parse()?;
        let strategy = match kind {
            HeuristicKind::Distance => Strategy::Distance(DistanceHeuristic::new()),
            HeuristicKind::Danger => Strategy::Danger(DangerHeuristic::new(
                self.params.danger_radius,
                self.params.hostile_names.clone(),
            )),
            HeuristicKind::Proximity => {
                Strategy::Proximity(ProximityHeuristic::new(self.params.proximity_range))
            }
            HeuristicKind::Disruption => Strategy::Disruption(DisruptionHeuristic::new(
                self.params.disruptive_blocks.clone(),
            )),
        };
        Ok(Heuristic::new(strategy))
    }

    /// 创建并以 label（缺省为类型名）存放；同名 label 会被替换
    pub fn register(
        &mut self,
        kind: &str,
        label: Option<&str>,
    ) -> Result<&mut Heuristic, HeuristicError> {
        let heuristic = self.create(kind)?;
        let label = label.unwrap_or(kind).to_string();
        if self.active.contains_key(&label) {
            tracing::debug!(label = %label, kind, "Replacing heuristic");
        }
        self.active.insert(label.clone(), heuristic);
        self.get_mut(&label)
    }

    pub fn get(&self, label: &str) -> Result<&Heuristic, HeuristicError> {
        self.active
            .get(label)
            .ok_or_else(|| HeuristicError::NotFound(label.to_string()))
    }

    pub fn get_mut(&mut self, label: &str) -> Result<&mut Heuristic, HeuristicError> {
        self.active
            .get_mut(label)
            .ok_or_else(|| HeuristicError::NotFound(label.to_string()))
    }

    pub fn contains(&self, label: &str) -> bool {
        self.active.contains_key(label)
    }

    pub fn remove(&mut self, label: &str) -> Option<Heuristic> {
        self.active.remove(label)
    }

    /// 清空本轮选择的全部启发式（目标保留）
    pub fn clear(&mut self) {
        self.active.clear();
    }

    pub fn labels(&self) -> Vec<String> {
        let mut labels: Vec<String> = self.active.keys().cloned().collect();
        labels.sort();
        labels
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    pub fn set_goal(&mut self, goal: Goal) {
        self.goal = Some(goal);
    }

    pub fn clear_goal(&mut self) {
        self.goal = None;
    }

    pub fn goal(&self) -> Option<&Goal> {
        self.goal.as_ref()
    }

    /// 用指定 label 的启发式评分
    pub fn score(&self, label: &str, candidate: Vec3, world: &dyn World) -> Result<f64, HeuristicError> {
        let heuristic = self.get(label)?;
        Ok(heuristic.score(
            candidate,
            ScoreContext {
                world,
                goal: self.goal.as_ref(),
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::{Entity, EntityKind, MockWorld};

    #[test]
    fn test_register_default_label_and_get() {
        let mut registry = HeuristicRegistry::default();
        let id = registry.register("distance", None).unwrap().id();
        assert_eq!(registry.get("distance").unwrap().id(), id);
        assert_eq!(registry.get("distance").unwrap().kind(), HeuristicKind::Distance);
    }

    #[test]
    fn test_register_unknown_type_leaves_registry_unchanged() {
        let mut registry = HeuristicRegistry::default();
        registry.register("danger", None).unwrap();
        let before = registry.labels();

        let err = registry.register("bogus-type", Some("danger")).unwrap_err();
        assert_eq!(err, HeuristicError::UnknownHeuristicType("bogus-type".into()));
        assert_eq!(registry.labels(), before);
        assert_eq!(registry.get("danger").unwrap().kind(), HeuristicKind::Danger);
    }

    #[test]
    fn test_duplicate_labels_replace_previous() {
        let mut registry = HeuristicRegistry::default();
        let first = registry.register("distance", None).unwrap().id();
        let second = registry.register("distance", Some("threat")).unwrap().id();
        let third = registry.register("distance", None).unwrap().id();

        assert_ne!(first, third);
        assert_eq!(registry.get("distance").unwrap().id(), third);
        assert_eq!(registry.get("threat").unwrap().id(), second);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_get_missing_label() {
        let registry = HeuristicRegistry::default();
        assert_eq!(
            registry.get("nothing").unwrap_err(),
            HeuristicError::NotFound("nothing".into())
        );
    }

    #[test]
    fn test_create_does_not_mutate() {
        let registry = HeuristicRegistry::default();
        let h = registry.create("proximity").unwrap();
        assert_eq!(h.kind(), HeuristicKind::Proximity);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_instance_goal_mutation_is_observed() {
        let world = MockWorld::new("bot");
        let mut registry = HeuristicRegistry::default();
        registry.register("proximity", None).unwrap();
        registry.set_goal(Goal::new(Vec3::new(10.0, 0.0, 0.0), 1.0));
        assert_eq!(registry.score("proximity", Vec3::default(), &world).unwrap(), 9.0);

        registry
            .get_mut("proximity")
            .unwrap()
            .set_goal(Goal::new(Vec3::new(4.0, 0.0, 0.0), 1.0));
        assert_eq!(registry.score("proximity", Vec3::default(), &world).unwrap(), 3.0);
    }

    #[test]
    fn test_params_flow_into_instances() {
        let world = MockWorld::new("bot");
        world.upsert_entity(Entity {
            id: 9,
            kind: EntityKind::Hostile,
            name: "creeper".into(),
            position: Vec3::new(3.0, 0.0, 0.0),
        });
        let mut registry = HeuristicRegistry::new(HeuristicParams {
            danger_radius: 6.0,
            ..Default::default()
        });
        registry.register("danger", Some("threat")).unwrap();
        let score = registry.score("threat", Vec3::default(), &world).unwrap();
        assert!((score - 0.5).abs() < 1e-9);
    }
}
