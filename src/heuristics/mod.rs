//! 启发式评分
//!
//! 每种启发式是一个带状态的评分策略：对候选目标位置给出数值分数。
//! 分数高低并不天然代表「更好」，组合方式（取最小 / 取最大 / 加权和）由调用方决定。
//! 实例只能经由 HeuristicRegistry 创建，以 label 寻址，同类型可多实例并存。

pub mod danger;
pub mod disruption;
pub mod distance;
pub mod proximity;
pub mod registry;

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::core::HeuristicError;
use crate::world::{Vec3, World};

pub use danger::DangerHeuristic;
pub use disruption::DisruptionHeuristic;
pub use distance::DistanceHeuristic;
pub use proximity::ProximityHeuristic;
pub use registry::{HeuristicParams, HeuristicRegistry};

/// 启发式类型标签
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeuristicKind {
    Distance,
    Danger,
    Proximity,
    Disruption,
}

impl HeuristicKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            HeuristicKind::Distance => "distance",
            HeuristicKind::Danger => "danger",
            HeuristicKind::Proximity => "proximity",
            HeuristicKind::Disruption => "disruption",
        }
    }
}

impl fmt::Display for HeuristicKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HeuristicKind {
    type Err = HeuristicError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "distance" => Ok(HeuristicKind::Distance),
            "danger" => Ok(HeuristicKind::Danger),
            "proximity" => Ok(HeuristicKind::Proximity),
            "disruption" => Ok(HeuristicKind::Disruption),
            other => Err(HeuristicError::UnknownHeuristicType(other.to_string())),
        }
    }
}

/// 目标：位置 + 可接受半径
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    pub position: Vec3,
    pub range: f64,
}

impl Goal {
    pub fn new(position: Vec3, range: f64) -> Self {
        Self { position, range }
    }
}

/// 实例 ID，每次 create 单调递增；用于判断是否为同一实例
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct HeuristicId(u64);

static NEXT_HEURISTIC_ID: AtomicU64 = AtomicU64::new(0);

impl HeuristicId {
    fn next() -> Self {
        Self(NEXT_HEURISTIC_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// 评分时可读取的上下文：世界事实 + 当前生效的目标
#[derive(Clone, Copy)]
pub struct ScoreContext<'a> {
    pub world: &'a dyn World,
    pub goal: Option<&'a Goal>,
}

/// 具体策略（按类型分派）
#[derive(Debug, Clone)]
pub enum Strategy {
    Distance(DistanceHeuristic),
    Danger(DangerHeuristic),
    Proximity(ProximityHeuristic),
    Disruption(DisruptionHeuristic),
}

/// 启发式实例
#[derive(Debug, Clone)]
pub struct Heuristic {
    id: HeuristicId,
    /// 实例级目标；设置后优先于注册表的全局目标
    goal: Option<Goal>,
    strategy: Strategy,
}

impl Heuristic {
    pub(crate) fn new(strategy: Strategy) -> Self {
        Self {
            id: HeuristicId::next(),
            goal: None,
            strategy,
        }
    }

    pub fn id(&self) -> HeuristicId {
        self.id
    }

    pub fn kind(&self) -> HeuristicKind {
        match self.strategy {
            Strategy::Distance(_) => HeuristicKind::Distance,
            Strategy::Danger(_) => HeuristicKind::Danger,
            Strategy::Proximity(_) => HeuristicKind::Proximity,
            Strategy::Disruption(_) => HeuristicKind::Disruption,
        }
    }

    pub fn strategy(&self) -> &Strategy {
        &self.strategy
    }

    pub fn strategy_mut(&mut self) -> &mut Strategy {
        &mut self.strategy
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

    /// 对候选位置评分；实例目标优先，其次使用 ctx 中注册表级目标
    pub fn score(&self, candidate: Vec3, ctx: ScoreContext<'_>) -> f64 {
        let ctx = ScoreContext {
            world: ctx.world,
            goal: self.goal.as_ref().or(ctx.goal),
        };
        match &self.strategy {
            Strategy::Distance(h) => h.score(candidate, ctx),
            Strategy::Danger(h) => h.score(candidate, ctx),
            Strategy::Proximity(h) => h.score(candidate, ctx),
            Strategy::Disruption(h) => h.score(candidate, ctx),
        }
    }
}
