//! list_my_subjects — the active inventory.

use crate::store::{GardenStore, SubjectStage};
use async_trait::async_trait;
use potager_core::error::ToolError;
use potager_core::tool::{Tool, ToolOutcome};
use std::sync::Arc;

pub struct ListSubjectsTool {
    store: Arc<dyn GardenStore>,
}

impl ListSubjectsTool {
    pub fn new(store: Arc<dyn GardenStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for ListSubjectsTool {
    fn name(&self) -> &str {
        "list_my_subjects"
    }

    fn description(&self) -> &str {
        "Liste l'inventaire des sujets actifs du jardin."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "season_id": {
                    "type": "string",
                    "description": "Filtrer sur une saison précise (optionnel)"
                }
            }
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolOutcome, ToolError> {
        let season_filter = arguments["season_id"]
            .as_str()
            .and_then(|s| uuid::Uuid::parse_str(s).ok());

        let subjects: Vec<_> = self
            .store
            .list_subjects()
            .into_iter()
            .filter(|s| s.stage != SubjectStage::Termine)
            .filter(|s| season_filter.is_none_or(|id| s.season_id == id))
            .collect();

        let count = subjects.len();
        Ok(ToolOutcome::ok(serde_json::json!({
            "subjects": subjects,
            "count": count,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryGardenStore;

    #[tokio::test]
    async fn lists_active_subjects() {
        let store = Arc::new(MemoryGardenStore::new());
        store.seed_demo();
        let tool = ListSubjectsTool::new(store);

        let outcome = tool.execute(serde_json::json!({})).await.unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.payload["count"], 2);
    }

    #[tokio::test]
    async fn unknown_season_filter_yields_empty() {
        let store = Arc::new(MemoryGardenStore::new());
        store.seed_demo();
        let tool = ListSubjectsTool::new(store);

        let outcome = tool
            .execute(serde_json::json!({
                "season_id": uuid::Uuid::new_v4().to_string()
            }))
            .await
            .unwrap();
        assert_eq!(outcome.payload["count"], 0);
    }
}
