//! search_garden — resolve plants and inventory subjects before acting.
//!
//! The agent's prompt tells it to verify existence with this tool before
//! any mutation, so this is the most-called tool by far.

use crate::matching::rank_plants;
use crate::store::{GardenStore, SubjectStage};
use async_trait::async_trait;
use potager_core::error::ToolError;
use potager_core::tool::{Tool, ToolOutcome};
use std::sync::Arc;

const MAX_PLANTS: usize = 5;

pub struct SearchGardenTool {
    store: Arc<dyn GardenStore>,
}

impl SearchGardenTool {
    pub fn new(store: Arc<dyn GardenStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for SearchGardenTool {
    fn name(&self) -> &str {
        "search_garden"
    }

    fn description(&self) -> &str {
        "Cherche une plante (référentiel botanique) et les sujets existants (inventaire). \
         À utiliser pour vérifier l'existence avant toute action."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Nom de la plante ou du sujet recherché (ex: 'Tomate Marmande', 'Radis')"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolOutcome, ToolError> {
        let query = arguments["query"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'query' argument".into()))?;

        let q = query.trim();
        if q.is_empty() {
            return Ok(ToolOutcome::ok(serde_json::json!({
                "plants": [],
                "subjects": [],
                "message": "Query empty"
            })));
        }

        let plants: Vec<_> = rank_plants(&self.store.list_plants(), q)
            .into_iter()
            .take(MAX_PLANTS)
            .collect();
        let plant_ids: Vec<_> = plants.iter().map(|p| p.id).collect();

        // Subjects linked to a matched plant OR matching by name, still active.
        let q_lower = q.to_lowercase();
        let subjects: Vec<_> = self
            .store
            .list_subjects()
            .into_iter()
            .filter(|s| s.stage != SubjectStage::Termine)
            .filter(|s| {
                s.variety_id.is_some_and(|id| plant_ids.contains(&id))
                    || s.name.to_lowercase().contains(&q_lower)
            })
            .collect();

        let count_plants = plants.len();
        let count_subjects = subjects.len();
        Ok(ToolOutcome::ok(serde_json::json!({
            "plants": plants,
            "subjects": subjects,
            "count_plants": count_plants,
            "count_subjects": count_subjects,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryGardenStore, SubjectUnit};

    fn seeded() -> Arc<MemoryGardenStore> {
        let store = Arc::new(MemoryGardenStore::new());
        store.seed_demo();
        store
    }

    #[tokio::test]
    async fn finds_plants_and_linked_subjects() {
        let tool = SearchGardenTool::new(seeded());
        let outcome = tool
            .execute(serde_json::json!({"query": "tomate"}))
            .await
            .unwrap();

        assert!(outcome.success);
        assert_eq!(outcome.payload["count_plants"], 2);
        assert_eq!(outcome.payload["count_subjects"], 1);
        assert_eq!(outcome.payload["subjects"][0]["nom"], "Tomate");
        assert_eq!(outcome.payload["subjects"][0]["quantite"], 4);
    }

    #[tokio::test]
    async fn name_match_without_referentiel_link() {
        let store = Arc::new(MemoryGardenStore::new());
        store.add_subject("Basilic mystère", 2, SubjectUnit::Plant, None);
        let tool = SearchGardenTool::new(store);

        let outcome = tool
            .execute(serde_json::json!({"query": "basilic"}))
            .await
            .unwrap();
        assert_eq!(outcome.payload["count_plants"], 0);
        assert_eq!(outcome.payload["count_subjects"], 1);
    }

    #[tokio::test]
    async fn empty_query_is_soft_result() {
        let tool = SearchGardenTool::new(seeded());
        let outcome = tool
            .execute(serde_json::json!({"query": "   "}))
            .await
            .unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.payload["message"], "Query empty");
    }

    #[tokio::test]
    async fn missing_query_is_invalid_arguments() {
        let tool = SearchGardenTool::new(seeded());
        let err = tool.execute(serde_json::json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }
}
