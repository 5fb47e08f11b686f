//! 内存模拟世界（用于测试与演示，无需真实服务器）
//!
//! MockWorld 记录每一次动作调用，测试据此断言任务的进入/退出副作用；
//! MockConnector 为每个用户名创建独立的 MockWorld，并保留事件发送端以便测试注入 spawn / error / end。

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{Block, Entity, EntityId, MoveGoal, Vec3, World, WorldConnector, WorldError, WorldEvent};

/// MockWorld 记录的动作
#[derive(Debug, Clone, PartialEq)]
pub enum WorldAction {
    LookAt(Vec3),
    Goto(MoveGoal),
    Stop,
    Dig(Vec3),
    Chat(String),
    Quit,
}

/// 场景：实体、方块与出生点
#[derive(Debug, Clone, Default)]
pub struct Scene {
    pub spawn: Option<Vec3>,
    pub entities: Vec<Entity>,
    pub blocks: Vec<Block>,
}

#[derive(Debug, Default)]
struct MockState {
    position: Option<Vec3>,
    entities: Vec<Entity>,
    blocks: HashMap<(i64, i64, i64), String>,
    actions: Vec<WorldAction>,
    failing: bool,
    quit: bool,
}

fn block_key(p: &Vec3) -> (i64, i64, i64) {
    let f = p.floored();
    (f.x as i64, f.y as i64, f.z as i64)
}

/// 内存世界
#[derive(Debug)]
pub struct MockWorld {
    username: String,
    /// 移动目标是否立即到达（演示用）
    auto_move: bool,
    state: Mutex<MockState>,
}

impl MockWorld {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            auto_move: false,
            state: Mutex::new(MockState::default()),
        }
    }

    pub fn with_scene(self, scene: &Scene) -> Self {
        {
            let mut state = self.lock();
            state.position = scene.spawn;
            state.entities = scene.entities.clone();
            for b in &scene.blocks {
                state.blocks.insert(block_key(&b.position), b.name.clone());
            }
        }
        self
    }

    pub fn with_auto_move(mut self, auto_move: bool) -> Self {
        self.auto_move = auto_move;
        self
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn set_position(&self, position: Option<Vec3>) {
        self.lock().position = position;
    }

    /// 新增或替换实体（按 id）
    pub fn upsert_entity(&self, entity: Entity) {
        let mut state = self.lock();
        state.entities.retain(|e| e.id != entity.id);
        state.entities.push(entity);
    }

    pub fn remove_entity(&self, id: EntityId) {
        self.lock().entities.retain(|e| e.id != id);
    }

    pub fn set_block(&self, position: Vec3, name: impl Into<String>) {
        self.lock().blocks.insert(block_key(&position), name.into());
    }

    /// 之后所有动作原语返回错误
    pub fn set_failing(&self, failing: bool) {
        self.lock().failing = failing;
    }

    pub fn actions(&self) -> Vec<WorldAction> {
        self.lock().actions.clone()
    }

    pub fn clear_actions(&self) {
        self.lock().actions.clear();
    }

    pub fn count(&self, pred: impl Fn(&WorldAction) -> bool) -> usize {
        self.lock().actions.iter().filter(|a| pred(a)).count()
    }

    pub fn has_quit(&self) -> bool {
        self.lock().quit
    }

    fn record(&self, action: WorldAction) -> Result<(), WorldError> {
        let mut state = self.lock();
        if state.quit {
            return Err(WorldError::Disconnected);
        }
        if state.failing {
            return Err(WorldError::Action {
                action: format!("{:?}", action),
                reason: "simulated failure".to_string(),
            });
        }
        state.actions.push(action);
        Ok(())
    }
}

#[async_trait]
impl World for MockWorld {
    fn username(&self) -> &str {
        &self.username
    }

    fn position(&self) -> Option<Vec3> {
        self.lock().position
    }

    fn entities(&self) -> Vec<Entity> {
        self.lock().entities.clone()
    }

    fn block_at(&self, position: Vec3) -> Option<Block> {
        let state = self.lock();
        let name = state
            .blocks
            .get(&block_key(&position))
            .cloned()
            .unwrap_or_else(|| "air".to_string());
        Some(Block {
            name,
            position: position.floored(),
        })
    }

    fn find_blocks(&self, name: &str, max_distance: f64, count: usize) -> Vec<Vec3> {
        let state = self.lock();
        let Some(origin) = state.position else {
            return Vec::new();
        };
        let mut found: Vec<Vec3> = state
            .blocks
            .iter()
            .filter(|(_, n)| n.as_str() == name)
            .map(|(&(x, y, z), _)| Vec3::new(x as f64, y as f64, z as f64))
            .filter(|p| p.distance_to(&origin) <= max_distance)
            .collect();
        found.sort_by(|a, b| a.distance_to(&origin).total_cmp(&b.distance_to(&origin)));
        found.truncate(count);
        found
    }

    async fn look_at(&self, point: Vec3) -> Result<(), WorldError> {
        self.record(WorldAction::LookAt(point))
    }

    async fn goto(&self, goal: MoveGoal) -> Result<(), WorldError> {
        self.record(WorldAction::Goto(goal.clone()))?;
        if self.auto_move {
            let mut state = self.lock();
            let dest = match goal {
                MoveGoal::Near { position, .. } => Some(position),
                MoveGoal::Follow { entity, .. } => state
                    .entities
                    .iter()
                    .find(|e| e.id == entity)
                    .map(|e| e.position),
            };
            if let Some(dest) = dest {
                state.position = Some(Vec3::new(dest.x + 1.0, dest.y, dest.z));
            }
        }
        Ok(())
    }

    async fn stop(&self) {
        let _ = self.record(WorldAction::Stop);
    }

    async fn dig(&self, position: Vec3) -> Result<(), WorldError> {
        self.record(WorldAction::Dig(position))?;
        self.lock().blocks.remove(&block_key(&position));
        Ok(())
    }

    async fn chat(&self, message: &str) -> Result<(), WorldError> {
        self.record(WorldAction::Chat(message.to_string()))
    }

    async fn quit(&self) {
        let mut state = self.lock();
        state.actions.push(WorldAction::Quit);
        state.quit = true;
    }
}

/// 模拟连接器：每个用户名一个 MockWorld
#[derive(Default)]
pub struct MockConnector {
    scene: Scene,
    auto_move: bool,
    auto_spawn: bool,
    worlds: Mutex<HashMap<String, (Arc<MockWorld>, mpsc::UnboundedSender<WorldEvent>)>>,
}

impl MockConnector {
    pub fn new(scene: Scene) -> Self {
        Self {
            scene,
            auto_move: false,
            auto_spawn: true,
            worlds: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_auto_move(mut self, auto_move: bool) -> Self {
        self.auto_move = auto_move;
        self
    }

    /// 连接后是否立即发出 Spawn 事件
    pub fn with_auto_spawn(mut self, auto_spawn: bool) -> Self {
        self.auto_spawn = auto_spawn;
        self
    }

    pub fn world(&self, username: &str) -> Option<Arc<MockWorld>> {
        self.worlds
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(username)
            .map(|(w, _)| Arc::clone(w))
    }

    /// 向某个 agent 注入世界事件；连接不存在或已关闭时返回 false
    pub fn emit(&self, username: &str, event: WorldEvent) -> bool {
        self.worlds
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(username)
            .map(|(_, tx)| tx.send(event).is_ok())
            .unwrap_or(false)
    }
}

#[async_trait]
impl WorldConnector for MockConnector {
    async fn connect(
        &self,
        username: &str,
    ) -> Result<(Arc<dyn World>, mpsc::UnboundedReceiver<WorldEvent>), WorldError> {
        let world = Arc::new(
            MockWorld::new(username)
                .with_scene(&self.scene)
                .with_auto_move(self.auto_move),
        );
        let (tx, rx) = mpsc::unbounded_channel();
        if self.auto_spawn {
            let _ = tx.send(WorldEvent::Spawn);
        }
        self.worlds
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(username.to_string(), (Arc::clone(&world), tx));
        Ok((world, rx))
    }
}
