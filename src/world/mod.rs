//! 世界交互能力接口（外部协作者）
//!
//! 核心只通过 World trait 读取世界事实（位置、实体、方块）并调用动作原语（看、移动、挖掘、聊天）；
//! 寻路、挖掘、网络协议等实现均不在本 crate 内。MockWorld 为测试与演示提供内存实现。

pub mod mock;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

pub use mock::{MockConnector, MockWorld, Scene, WorldAction};

/// 实体 ID（由世界侧分配）
pub type EntityId = u64;

/// 三维坐标
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn distance_to(&self, other: &Vec3) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    /// 向下取整到方块坐标
    pub fn floored(&self) -> Vec3 {
        Vec3::new(self.x.floor(), self.y.floor(), self.z.floor())
    }

    /// 六个面相邻的方块坐标
    pub fn neighbors(&self) -> [Vec3; 6] {
        let Vec3 { x, y, z } = *self;
        [
            Vec3::new(x + 1.0, y, z),
            Vec3::new(x - 1.0, y, z),
            Vec3::new(x, y + 1.0, z),
            Vec3::new(x, y - 1.0, z),
            Vec3::new(x, y, z + 1.0),
            Vec3::new(x, y, z - 1.0),
        ]
    }
}

impl fmt::Display for Vec3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.1}, {:.1}, {:.1})", self.x, self.y, self.z)
    }
}

/// 实体类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Player,
    Hostile,
    Passive,
    Item,
    Other,
}

/// 实体快照
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub kind: EntityKind,
    /// 玩家为用户名，生物为类型名（如 zombie）
    pub name: String,
    pub position: Vec3,
}

/// 方块快照
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub name: String,
    pub position: Vec3,
}

impl Block {
    pub fn is_air(&self) -> bool {
        self.name == "air"
    }
}

/// 移动目标：跟随实体或接近某点
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MoveGoal {
    Follow { entity: EntityId, range: f64 },
    Near { position: Vec3, range: f64 },
}

/// 世界侧生命周期事件
#[derive(Debug, Clone, PartialEq)]
pub enum WorldEvent {
    /// 已在世界中出生，可以开始执行任务
    Spawn,
    /// 世界侧报错（原样转发给编排器）
    Error(String),
    /// 连接结束
    End(String),
}

/// 世界交互错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WorldError {
    #[error("World fact unavailable: {0}")]
    Unavailable(String),

    #[error("Action '{action}' failed: {reason}")]
    Action { action: String, reason: String },

    #[error("Disconnected from world")]
    Disconnected,
}

/// 世界交互能力：事实查询为同步，动作原语为异步（挂起点）
#[async_trait]
pub trait World: Send + Sync {
    /// 本 agent 在世界中的用户名
    fn username(&self) -> &str;

    /// 自身位置；尚未出生时为 None
    fn position(&self) -> Option<Vec3>;

    /// 当前可见实体（不含自身）
    fn entities(&self) -> Vec<Entity>;

    fn entity(&self, id: EntityId) -> Option<Entity> {
        self.entities().into_iter().find(|e| e.id == id)
    }

    /// 按用户名查找玩家
    fn player(&self, username: &str) -> Option<Entity> {
        self.entities()
            .into_iter()
            .find(|e| e.kind == EntityKind::Player && e.name == username)
    }

    fn block_at(&self, position: Vec3) -> Option<Block>;

    /// 查找指定名称的方块，最多 count 个，距离自身不超过 max_distance
    fn find_blocks(&self, name: &str, max_distance: f64, count: usize) -> Vec<Vec3>;

    async fn look_at(&self, point: Vec3) -> Result<(), WorldError>;

    /// 设置移动目标（不等待到达）
    async fn goto(&self, goal: MoveGoal) -> Result<(), WorldError>;

    /// 取消当前移动目标
    async fn stop(&self);

    async fn dig(&self, position: Vec3) -> Result<(), WorldError>;

    async fn chat(&self, message: &str) -> Result<(), WorldError>;

    /// 断开并释放连接；之后该句柄不可再用
    async fn quit(&self);
}

/// 世界连接器：为某个用户名建立世界句柄与事件通道
#[async_trait]
pub trait WorldConnector: Send + Sync {
    async fn connect(
        &self,
        username: &str,
    ) -> Result<(std::sync::Arc<dyn World>, mpsc::UnboundedReceiver<WorldEvent>), WorldError>;
}
