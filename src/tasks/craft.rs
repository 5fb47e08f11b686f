//! planCraft：根据有形配方统计所需材料，播报一次后自动结束
//!
//! 材料汇总 = 按物品 id 累加配方各行中的格子数，再乘以需要合成的次数。

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{Task, TaskContext};
use crate::core::TaskError;

/// 有形配方：shape 的每一行是若干格子，空格为 None
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipe {
    pub item: String,
    pub shape: Vec<Vec<Option<String>>>,
    /// 单次合成产出数量
    #[serde(default = "default_result_count")]
    pub result_count: u32,
}

fn default_result_count() -> u32 {
    1
}

/// 单次合成所需材料：按物品 id 累加所有行
pub fn aggregate_ingredients(shape: &[Vec<Option<String>>]) -> BTreeMap<String, u32> {
    let mut totals = BTreeMap::new();
    for item in shape.iter().flatten().flatten() {
        *totals.entry(item.clone()).or_insert(0) += 1;
    }
    totals
}

impl Recipe {
    /// 产出 count 个物品需要的合成次数（向上取整）
    pub fn crafts_needed(&self, count: u32) -> u32 {
        let per = self.result_count.max(1);
        count.div_ceil(per)
    }

    /// 产出 count 个物品的材料清单；任一材料数量超出 u32 时返回 None
    pub fn bill_of_materials(&self, count: u32) -> Option<BTreeMap<String, u32>> {
        let crafts = self.crafts_needed(count);
        aggregate_ingredients(&self.shape)
            .into_iter()
            .map(|(item, n)| n.checked_mul(crafts).map(|total| (item, total)))
            .collect()
    }
}

pub struct PlanCraftTask {
    recipe: Recipe,
    count: u32,
    materials: Option<BTreeMap<String, u32>>,
}

impl PlanCraftTask {
    pub const NAME: &'static str = "planCraft";

    pub fn from_data(data: &Value) -> Result<Self, TaskError> {
        let recipe_value = data
            .get("recipe")
            .ok_or_else(|| TaskError::invalid_data(Self::NAME, "missing recipe"))?;
        let recipe: Recipe = serde_json::from_value(recipe_value.clone())
            .map_err(|e| TaskError::invalid_data(Self::NAME, e.to_string()))?;
        if recipe.shape.iter().flatten().all(Option::is_none) {
            return Err(TaskError::invalid_data(Self::NAME, "recipe shape is empty"));
        }
        let count = match data.get("count") {
            None | Some(Value::Null) => 1,
            Some(v) => v
                .as_u64()
                .and_then(|n| u32::try_from(n).ok())
                .ok_or_else(|| {
                    TaskError::invalid_data(Self::NAME, format!("count must be an integer in 0..={}", u32::MAX))
                })?
                .max(1),
        };
        Ok(Self {
            recipe,
            count,
            materials: None,
        })
    }
}

#[async_trait]
impl Task for PlanCraftTask {
    fn state_name(&self) -> &'static str {
        Self::NAME
    }

    fn autonomous(&self) -> bool {
        true
    }

    async fn enter(&mut self, _ctx: &mut TaskContext) -> Result<(), TaskError> {
        self.materials = None;
        Ok(())
    }

    async fn update(&mut self, ctx: &mut TaskContext) -> Result<(), TaskError> {
        if self.materials.is_some() {
            return Ok(());
        }
        let materials = self.recipe.bill_of_materials(self.count).ok_or_else(|| {
            TaskError::invalid_data(
                Self::NAME,
                format!("{} x{} needs more materials than can be counted", self.recipe.item, self.count),
            )
        })?;
        let summary = materials
            .iter()
            .map(|(item, n)| format!("{n} {item}"))
            .collect::<Vec<_>>()
            .join(", ");
        ctx.world
            .chat(&format!("{} x{} needs {}", self.recipe.item, self.count, summary))
            .await?;
        self.materials = Some(materials);
        Ok(())
    }

    async fn exit(&mut self, _ctx: &mut TaskContext) {}

    fn exit_condition(&self) -> bool {
        self.materials.is_some()
    }

    fn report(&self) -> Value {
        json!({
            "item": self.recipe.item,
            "count": self.count,
            "crafts": self.recipe.crafts_needed(self.count),
            "materials": self.materials,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::testing::context;
    use crate::world::WorldAction;

    fn shape(rows: &[&[Option<&str>]]) -> Vec<Vec<Option<String>>> {
        rows.iter()
            .map(|r| r.iter().map(|c| c.map(str::to_string)).collect())
            .collect()
    }

    #[test]
    fn test_aggregate_sums_across_rows() {
        let pickaxe = shape(&[
            &[Some("planks"), Some("planks"), Some("planks")],
            &[None, Some("stick"), None],
            &[None, Some("stick"), None],
        ]);
        let totals = aggregate_ingredients(&pickaxe);
        assert_eq!(totals.get("planks"), Some(&3));
        assert_eq!(totals.get("stick"), Some(&2));
        assert_eq!(totals.len(), 2);
    }

    #[test]
    fn test_bill_scales_by_crafts() {
        let recipe = Recipe {
            item: "torch".into(),
            shape: shape(&[&[Some("coal")], &[Some("stick")]]),
            result_count: 4,
        };
        assert_eq!(recipe.crafts_needed(9), 3);
        let bill = recipe.bill_of_materials(9).unwrap();
        assert_eq!(bill.get("coal"), Some(&3));
        assert_eq!(bill.get("stick"), Some(&3));
    }

    #[test]
    fn test_rejects_empty_shape() {
        let data = json!({ "recipe": { "item": "air", "shape": [[null]] } });
        let err = PlanCraftTask::from_data(&data).err().unwrap();
        assert!(matches!(err, TaskError::InvalidTaskData { .. }));
    }

    #[test]
    fn test_count_out_of_range_rejected() {
        let data = json!({
            "recipe": { "item": "torch", "shape": [["coal"], ["stick"]] },
            "count": 4_294_967_296u64
        });
        let err = PlanCraftTask::from_data(&data).err().unwrap();
        assert!(matches!(err, TaskError::InvalidTaskData { .. }));

        let data = json!({
            "recipe": { "item": "torch", "shape": [["coal"], ["stick"]] },
            "count": "lots"
        });
        assert!(PlanCraftTask::from_data(&data).is_err());
    }

    #[tokio::test]
    async fn test_material_overflow_is_an_error() {
        let (mut ctx, world) = context();
        let data = json!({
            "recipe": {
                "item": "wooden_pickaxe",
                "shape": [["planks", "planks", "planks"], [null, "stick", null], [null, "stick", null]]
            },
            "count": 2_000_000_000u64
        });
        let mut task = PlanCraftTask::from_data(&data).unwrap();
        task.enter(&mut ctx).await.unwrap();

        let err = task.update(&mut ctx).await.unwrap_err();
        assert!(matches!(err, TaskError::InvalidTaskData { .. }));
        assert!(!task.exit_condition());
        assert!(world.actions().is_empty());
        assert_eq!(task.report()["crafts"], 2_000_000_000u64);
    }

    #[tokio::test]
    async fn test_reports_once_then_exits() {
        let (mut ctx, world) = context();
        let data = json!({
            "recipe": { "item": "torch", "shape": [["coal"], ["stick"]], "resultCount": 4 },
            "count": 4
        });
        let mut task = PlanCraftTask::from_data(&data).unwrap();
        task.enter(&mut ctx).await.unwrap();
        assert!(!task.exit_condition());
        task.update(&mut ctx).await.unwrap();
        assert!(task.exit_condition());
        assert_eq!(task.report()["materials"]["coal"], 1);
        assert_eq!(
            world.actions(),
            vec![WorldAction::Chat("torch x4 needs 1 coal, 1 stick".into())]
        );
    }
}
