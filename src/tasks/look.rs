//! lookAtPlayers：按固定间隔把视线转向最近的玩家（非自主，等待外部切换）

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::watch;

use super::{Task, TaskContext, Ticker};
use crate::core::TaskError;
use crate::world::{Entity, EntityKind, Vec3, World};

/// 玩家眼睛高度
const EYE_HEIGHT: f64 = 1.62;

pub struct LookAtPlayersTask {
    ticker: Option<Ticker>,
    watching: Option<watch::Receiver<Option<String>>>,
}

impl LookAtPlayersTask {
    pub const NAME: &'static str = "lookAtPlayers";

    pub fn new() -> Self {
        Self {
            ticker: None,
            watching: None,
        }
    }
}

impl Default for LookAtPlayersTask {
    fn default() -> Self {
        Self::new()
    }
}

fn nearest_player(world: &dyn World) -> Option<Entity> {
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

#[async_trait]
impl Task for LookAtPlayersTask {
    fn state_name(&self) -> &'static str {
        Self::NAME
    }

    async fn enter(&mut self, ctx: &mut TaskContext) -> Result<(), TaskError> {
        if ctx.world.position().is_none() {
            return Err(TaskError::enter_failed(Self::NAME, "agent has not spawned"));
        }
        let (tx, rx) = watch::channel(None);
        let tx = Arc::new(tx);
        let world: Arc<dyn World> = Arc::clone(&ctx.world);
        let period = Duration::from_millis(ctx.settings.look_interval_ms);
        self.ticker = Some(Ticker::spawn(period, move || {
            let world = Arc::clone(&world);
            let tx = Arc::clone(&tx);
            async move {
                let Some(player) = nearest_player(world.as_ref()) else {
                    tx.send_replace(None);
                    return;
                };
                let eye = Vec3::new(
                    player.position.x,
                    player.position.y + EYE_HEIGHT,
                    player.position.z,
                );
                if let Err(e) = world.look_at(eye).await {
                    tracing::debug!("look_at failed: {}", e);
                }
                tx.send_replace(Some(player.name));
            }
        }));
        self.watching = Some(rx);
        Ok(())
    }

    async fn exit(&mut self, _ctx: &mut TaskContext) {
        if let Some(ticker) = self.ticker.take() {
            ticker.cancel().await;
        }
        self.watching = None;
    }

    fn report(&self) -> Value {
        let watching = self.watching.as_ref().and_then(|rx| rx.borrow().clone());
        json!({ "watching": watching })
    }
}
