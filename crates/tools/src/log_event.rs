//! log_event — record a gesture on an existing subject.

use crate::store::{ActionType, GardenEvent, GardenStore};
use async_trait::async_trait;
use chrono::Utc;
use potager_core::error::ToolError;
use potager_core::tool::{Tool, ToolOutcome};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

pub struct LogEventTool {
    store: Arc<dyn GardenStore>,
}

impl LogEventTool {
    pub fn new(store: Arc<dyn GardenStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for LogEventTool {
    fn name(&self) -> &str {
        "log_event"
    }

    fn description(&self) -> &str {
        "Enregistre une action (geste) sur un sujet existant : semis, soin, \
         récolte, perte, observation..."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "subject_tracking_id": {
                    "type": "string",
                    "description": "Identifiant de suivi exact (ex: '2026-SUJ-ABCD')"
                },
                "action_type": {
                    "type": "string",
                    "enum": ActionType::ALLOWED,
                    "description": "Type de geste"
                },
                "quantity_final": {
                    "type": "integer",
                    "description": "Quantité APRÈS l'événement (optionnel si inchangée)"
                },
                "observation": {
                    "type": "string",
                    "description": "Observation libre"
                },
                "data": {
                    "type": "object",
                    "description": "Données spécifiques au geste"
                }
            },
            "required": ["subject_tracking_id", "action_type"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolOutcome, ToolError> {
        let tracking_id = arguments["subject_tracking_id"].as_str().ok_or_else(|| {
            ToolError::InvalidArguments("Missing 'subject_tracking_id' argument".into())
        })?;
        let action_raw = arguments["action_type"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'action_type' argument".into()))?;

        let Some(subject) = self
            .store
            .list_subjects()
            .into_iter()
            .find(|s| s.tracking_id == tracking_id)
        else {
            return Ok(ToolOutcome::err(format!(
                "Subject with tracking ID {tracking_id} not found"
            )));
        };

        let action = match ActionType::parse(action_raw) {
            Ok(a) => a,
            Err(message) => return Ok(ToolOutcome::err(message)),
        };

        let Some(season) = self.store.active_season() else {
            return Ok(ToolOutcome::err("No active season found"));
        };

        // The model sometimes sends data as a JSON string; tolerate it.
        let mut data = match arguments.get("data") {
            Some(serde_json::Value::Object(map)) => serde_json::Value::Object(map.clone()),
            Some(serde_json::Value::String(raw)) => match serde_json::from_str(raw) {
                Ok(serde_json::Value::Object(map)) => serde_json::Value::Object(map),
                _ => serde_json::json!({}),
            },
            _ => serde_json::json!({}),
        };

        let quantity_final = arguments["quantity_final"].as_u64().map(|q| q as u32);
        if let Some(q) = quantity_final {
            data["quantite_finale"] = serde_json::json!(q);
        }
        if let Some(obs) = arguments["observation"].as_str()
            && !obs.is_empty()
        {
            data["observation"] = serde_json::json!(obs);
        }

        self.store.insert_event(GardenEvent {
            id: Uuid::new_v4(),
            subject_id: subject.id,
            season_id: season.id,
            action,
            date: Utc::now(),
            data,
        });

        if let Some(q) = quantity_final {
            self.store.set_subject_quantity(subject.id, q);
        }

        info!(tracking_id, action = action.as_str(), "event logged");

        Ok(ToolOutcome::ok(serde_json::json!({
            "message": format!(
                "Success: Event {} recorded for {}. New state logged.",
                action.as_str(),
                subject.name
            ),
        })))
    }
}
