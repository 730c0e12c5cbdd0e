//! create_subject — start tracking a new culture batch.

use crate::matching::best_plant_match;
use crate::store::{
    ActionType, GardenEvent, GardenStore, Subject, SubjectStage, SubjectUnit, new_tracking_id,
};
use async_trait::async_trait;
use chrono::Utc;
use potager_core::error::ToolError;
use potager_core::tool::{Tool, ToolOutcome};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

pub struct CreateSubjectTool {
    store: Arc<dyn GardenStore>,
}

impl CreateSubjectTool {
    pub fn new(store: Arc<dyn GardenStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for CreateSubjectTool {
    fn name(&self) -> &str {
        "create_subject"
    }

    fn description(&self) -> &str {
        "Crée un nouveau lot de culture (sujet) dans la saison active, \
         avec un identifiant de suivi."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "name": {
                    "type": "string",
                    "description": "Nom du sujet (ex: 'Tomate Marmande')"
                },
                "quantity": {
                    "type": "integer",
                    "description": "Quantité initiale"
                },
                "unit": {
                    "type": "string",
                    "enum": SubjectUnit::ALLOWED,
                    "description": "Unité de comptage"
                },
                "type_plant": {
                    "type": "string",
                    "description": "Nom botanique pour le lien référentiel, si différent du nom (optionnel)"
                },
                "data": {
                    "type": "object",
                    "description": "Données du semis initial (mode, zone, ...)"
                }
            },
            "required": ["name", "quantity", "unit"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolOutcome, ToolError> {
        let name = arguments["name"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'name' argument".into()))?;
        let quantity = arguments["quantity"]
            .as_u64()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'quantity' argument".into()))?
            as u32;
        let unit_raw = arguments["unit"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'unit' argument".into()))?;

        let unit = match SubjectUnit::parse(unit_raw) {
            Ok(u) => u,
            Err(message) => return Ok(ToolOutcome::err(message)),
        };

        let Some(season) = self.store.active_season() else {
            return Ok(ToolOutcome::err(
                "No active season found to attach the subject",
            ));
        };

        // Link to the referentiel when a plant plausibly matches.
        let match_query = arguments["type_plant"].as_str().unwrap_or(name);
        let variety_id = best_plant_match(&self.store.list_plants(), match_query).map(|p| p.id);

        let subject = Subject {
            id: Uuid::new_v4(),
            tracking_id: new_tracking_id(season.year),
            name: name.to_string(),
            quantity,
            unit,
            stage: SubjectStage::Semis,
            variety_id,
            season_id: season.id,
        };
        let tracking_id = subject.tracking_id.clone();

        self.store.insert_subject(subject.clone());
        self.store.insert_event(GardenEvent {
            id: Uuid::new_v4(),
            subject_id: subject.id,
            season_id: season.id,
            action: ActionType::Semis,
            date: Utc::now(),
            data: arguments
                .get("data")
                .cloned()
                .unwrap_or_else(|| serde_json::json!({})),
        });

        info!(tracking_id = %tracking_id, name, quantity, "subject created");

        Ok(ToolOutcome::ok(serde_json::json!({
            "message": format!("Success: Created subject '{name}' with Tracking ID {tracking_id}"),
            "subject": subject,
        })))
    }
}
