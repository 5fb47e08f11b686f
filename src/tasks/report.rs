//! reportStatus：按固定间隔在聊天中播报自身位置（非自主）

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{Task, TaskContext, Ticker};
use crate::core::TaskError;
use crate::world::{Vec3, World};

/// update 时刷新的快照
#[derive(Debug, Clone, Default)]
struct Snapshot {
    position: Option<Vec3>,
    nearby: usize,
}

pub struct ReportStatusTask {
    ticker: Option<Ticker>,
    snapshot: Snapshot,
}

impl ReportStatusTask {
    pub const NAME: &'static str = "reportStatus";

    /// 计入 nearby 的实体距离
    const NEARBY_RADIUS: f64 = 16.0;

    pub fn new() -> Self {
        Self {
            ticker: None,
            snapshot: Snapshot::default(),
        }
    }
}

impl Default for ReportStatusTask {
    fn default() -> Self {
        Self::new()
    }
}

fn status_line(world: &dyn World) -> String {
    match world.position() {
        Some(p) => format!("{} at {}", world.username(), p),
        None => format!("{} has not spawned", world.username()),
    }
}

#[async_trait]
impl Task for ReportStatusTask {
    fn state_name(&self) -> &'static str {
        Self::NAME
    }

    async fn enter(&mut self, ctx: &mut TaskContext) -> Result<(), TaskError> {
        let world: Arc<dyn World> = Arc::clone(&ctx.world);
        let period = Duration::from_millis(ctx.settings.report_interval_ms);
        self.ticker = Some(Ticker::spawn(period, move || {
            let world = Arc::clone(&world);
            async move {
                if let Err(e) = world.chat(&status_line(world.as_ref())).await {
                    tracing::debug!("status chat failed: {}", e);
                }
            }
        }));
        Ok(())
    }

    async fn update(&mut self, ctx: &mut TaskContext) -> Result<(), TaskError> {
        let position = ctx.world.position();
        let nearby = match position {
            Some(origin) => ctx
                .world
                .entities()
                .iter()
                .filter(|e| e.position.distance_to(&origin) <= Self::NEARBY_RADIUS)
                .count(),
            None => 0,
        };
        self.snapshot = Snapshot { position, nearby };
        Ok(())
    }

    async fn exit(&mut self, _ctx: &mut TaskContext) {
        if let Some(ticker) = self.ticker.take() {
            ticker.cancel().await;
        }
    }

    fn report(&self) -> Value {
        json!({
            "position": self.snapshot.position,
            "nearby": self.snapshot.nearby,
        })
    }
}
