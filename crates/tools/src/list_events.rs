//! list_garden_events — the journal of past gestures.

use crate::store::GardenStore;
use async_trait::async_trait;
use potager_core::error::ToolError;
use potager_core::tool::{Tool, ToolOutcome};
use std::collections::HashMap;
use std::sync::Arc;

const DEFAULT_LIMIT: usize = 20;

pub struct ListEventsTool {
    store: Arc<dyn GardenStore>,
}

impl ListEventsTool {
    pub fn new(store: Arc<dyn GardenStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for ListEventsTool {
    fn name(&self) -> &str {
        "list_garden_events"
    }

    fn description(&self) -> &str {
        "Consulte l'historique des actions passées du jardin (journal), \
         globalement ou pour un sujet précis."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "limit": {
                    "type": "integer",
                    "description": "Nombre maximum d'événements (défaut: 20)"
                },
                "subject_tracking_id": {
                    "type": "string",
                    "description": "Filtrer sur un sujet précis (ex: '2026-SUJ-ABCD')"
                }
            }
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolOutcome, ToolError> {
        let limit = arguments["limit"]
            .as_u64()
            .map(|l| l as usize)
            .unwrap_or(DEFAULT_LIMIT)
            .max(1);

        let subjects = self.store.list_subjects();
        let by_id: HashMap<_, _> = subjects.iter().map(|s| (s.id, s)).collect();

        let subject_filter = match arguments["subject_tracking_id"].as_str() {
            Some(tracking_id) => {
                let Some(subject) = subjects.iter().find(|s| s.tracking_id == tracking_id) else {
                    // The model prefers a visible error over an empty list
                    // when its tracking id was wrong.
                    return Ok(ToolOutcome::err(format!(
                        "Subject with tracking ID {tracking_id} not found"
                    )));
                };
                Some(subject.id)
            }
            None => None,
        };

        let summary: Vec<_> = self
            .store
            .list_events(limit, subject_filter)
            .into_iter()
            .map(|e| {
                let subject = by_id
                    .get(&e.subject_id)
                    .map(|s| format!("{} ({})", s.name, s.tracking_id))
                    .unwrap_or_else(|| "?".into());
                serde_json::json!({
                    "date": e.date,
                    "subject": subject,
                    "action": e.action,
                    "details": e.data,
                })
            })
            .collect();

        let count = summary.len();
        Ok(ToolOutcome::ok(serde_json::json!({
            "events": summary,
            "count": count,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log_event::LogEventTool;
    use crate::store::{MemoryGardenStore, SubjectUnit};

    async fn seeded_with_events() -> (Arc<MemoryGardenStore>, String) {
        let store = Arc::new(MemoryGardenStore::new());
        let tracking = store.add_subject("Radis", 30, SubjectUnit::Individu, None);
        let logger = LogEventTool::new(store.clone());
        for action in ["SOIN", "OBSERVATION"] {
            logger
                .execute(serde_json::json!({
                    "subject_tracking_id": tracking,
                    "action_type": action
                }))
                .await
                .unwrap();
        }
        (store, tracking)
    }

    #[tokio::test]
    async fn journal_includes_subject_labels() {
        let (store, tracking) = seeded_with_events().await;
        let tool = ListEventsTool::new(store);

        let outcome = tool.execute(serde_json::json!({})).await.unwrap();
        assert_eq!(outcome.payload["count"], 2);
        let label = outcome.payload["events"][0]["subject"].as_str().unwrap();
        assert!(label.contains("Radis"));
        assert!(label.contains(&tracking));
    }

    #[tokio::test]
    async fn unknown_tracking_id_is_error_outcome() {
        let (store, _) = seeded_with_events().await;
        let tool = ListEventsTool::new(store);

        let outcome = tool
            .execute(serde_json::json!({"subject_tracking_id": "2026-SUJ-NOPE"}))
            .await
            .unwrap();
        assert!(!outcome.success);
        assert!(outcome.error.as_deref().unwrap().contains("not found"));
    }

    #[tokio::test]
    async fn limit_caps_results() {
        let (store, _) = seeded_with_events().await;
        let tool = ListEventsTool::new(store);

        let outcome = tool.execute(serde_json::json!({"limit": 1})).await.unwrap();
        assert_eq!(outcome.payload["count"], 1);
    }
}
