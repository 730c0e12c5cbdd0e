//! Garden persistence seam.
//!
//! The real deployment backs this with an external database; the agent
//! only ever sees the `GardenStore` trait. `MemoryGardenStore` is the
//! in-process implementation used by the demo binary and every test.
//!
//! Wire field names stay French (`nom`, `quantite`, `stade`, ...) — the
//! model reads tool results verbatim and the whole prompt contract is
//! French.

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::sync::RwLock;
use uuid::Uuid;

/// A plant in the botanical referentiel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plant {
    pub id: Uuid,
    #[serde(rename = "nom_commun")]
    pub common_name: String,
    #[serde(rename = "variete")]
    pub variety: Option<String>,
}

impl Plant {
    /// Full display string used for matching ("Tomate Marmande").
    pub fn full_name(&self) -> String {
        match &self.variety {
            Some(v) => format!("{} {}", self.common_name, v),
            None => self.common_name.clone(),
        }
    }
}

/// A growing season. Subjects and events attach to the active one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Season {
    pub id: Uuid,
    #[serde(rename = "annee")]
    pub year: i32,
    pub active: bool,
}

/// Counting unit of a culture subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SubjectUnit {
    Individu,
    Plant,
    Barquette,
    Rang,
}

impl SubjectUnit {
    pub const ALLOWED: [&'static str; 4] = ["INDIVIDU", "PLANT", "BARQUETTE", "RANG"];

    /// Parse a unit as the model writes it. Seeds count as individuals.
    pub fn parse(raw: &str) -> Result<Self, String> {
        let normalized = raw.trim().to_uppercase();
        match normalized.as_str() {
            "INDIVIDU" | "GRAINE" | "GRAINES" => Ok(Self::Individu),
            "PLANT" | "PLANTS" => Ok(Self::Plant),
            "BARQUETTE" => Ok(Self::Barquette),
            "RANG" => Ok(Self::Rang),
            _ => Err(format!(
                "Invalid unit {raw} (normalized: {normalized}). Allowed: {:?}",
                Self::ALLOWED
            )),
        }
    }
}

/// Lifecycle stage of a subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SubjectStage {
    Semis,
    Croissance,
    Production,
    Termine,
}

/// The kinds of gestures recorded in the journal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ActionType {
    Semis,
    Repiquage,
    Plantation,
    Soin,
    Taille,
    Recolte,
    Observation,
    Perte,
}

impl ActionType {
    pub const ALLOWED: [&'static str; 8] = [
        "SEMIS",
        "REPIQUAGE",
        "PLANTATION",
        "SOIN",
        "TAILLE",
        "RECOLTE",
        "OBSERVATION",
        "PERTE",
    ];

    /// Parse an action as the model writes it, folding accents so
    /// "récolte" resolves to RECOLTE.
    pub fn parse(raw: &str) -> Result<Self, String> {
        let normalized = fold_accents(raw.trim()).to_uppercase();
        match normalized.as_str() {
            "SEMIS" => Ok(Self::Semis),
            "REPIQUAGE" => Ok(Self::Repiquage),
            "PLANTATION" => Ok(Self::Plantation),
            "SOIN" => Ok(Self::Soin),
            "TAILLE" => Ok(Self::Taille),
            "RECOLTE" => Ok(Self::Recolte),
            "OBSERVATION" => Ok(Self::Observation),
            "PERTE" => Ok(Self::Perte),
            _ => Err(format!(
                "Invalid action type {raw} (normalized: {normalized}). Allowed: {:?}",
                Self::ALLOWED
            )),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Semis => "SEMIS",
            Self::Repiquage => "REPIQUAGE",
            Self::Plantation => "PLANTATION",
            Self::Soin => "SOIN",
            Self::Taille => "TAILLE",
            Self::Recolte => "RECOLTE",
            Self::Observation => "OBSERVATION",
            Self::Perte => "PERTE",
        }
    }
}

/// Fold the French accented characters the action vocabulary uses.
fn fold_accents(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'É' | 'È' | 'Ê' | 'Ë' => 'E',
            'à' | 'â' => 'a',
            'À' | 'Â' => 'A',
            'î' | 'ï' => 'i',
            'Î' | 'Ï' => 'I',
            'ô' => 'o',
            'Ô' => 'O',
            'û' | 'ù' => 'u',
            'Û' | 'Ù' => 'U',
            'ç' => 'c',
            'Ç' => 'C',
            other => other,
        })
        .collect()
}

/// A batch of plants under culture (the inventory unit).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subject {
    pub id: Uuid,
    pub tracking_id: String,
    #[serde(rename = "nom")]
    pub name: String,
    #[serde(rename = "quantite")]
    pub quantity: u32,
    #[serde(rename = "unite")]
    pub unit: SubjectUnit,
    #[serde(rename = "stade")]
    pub stage: SubjectStage,
    #[serde(rename = "variete_id")]
    pub variety_id: Option<Uuid>,
    #[serde(rename = "saison_id")]
    pub season_id: Uuid,
}

/// One journal entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GardenEvent {
    pub id: Uuid,
    #[serde(rename = "sujet_id")]
    pub subject_id: Uuid,
    #[serde(rename = "saison_id")]
    pub season_id: Uuid,
    #[serde(rename = "type_geste")]
    pub action: ActionType,
    pub date: DateTime<Utc>,
    pub data: serde_json::Value,
}

/// The persistence seam the tools act through.
pub trait GardenStore: Send + Sync {
    fn list_plants(&self) -> Vec<Plant>;
    fn list_subjects(&self) -> Vec<Subject>;
    fn active_season(&self) -> Option<Season>;
    fn insert_subject(&self, subject: Subject);
    fn set_subject_quantity(&self, subject_id: Uuid, quantity: u32);
    fn insert_event(&self, event: GardenEvent);
    /// Most recent events first, optionally filtered by subject.
    fn list_events(&self, limit: usize, subject_id: Option<Uuid>) -> Vec<GardenEvent>;
}

#[derive(Default)]
struct Inner {
    plants: Vec<Plant>,
    subjects: Vec<Subject>,
    events: Vec<GardenEvent>,
    seasons: Vec<Season>,
}

/// In-memory garden store.
pub struct MemoryGardenStore {
    inner: RwLock<Inner>,
}

impl MemoryGardenStore {
    /// Empty store with one active season for the current year.
    pub fn new() -> Self {
        let store = Self {
            inner: RwLock::new(Inner::default()),
        };
        store.inner.write().unwrap().seasons.push(Season {
            id: Uuid::new_v4(),
            year: Utc::now().year(),
            active: true,
        });
        store
    }

    /// Add a plant to the referentiel; returns its id.
    pub fn add_plant(&self, common_name: &str, variety: Option<&str>) -> Uuid {
        let id = Uuid::new_v4();
        self.inner.write().unwrap().plants.push(Plant {
            id,
            common_name: common_name.to_string(),
            variety: variety.map(String::from),
        });
        id
    }

    /// Add a subject directly (bypassing the tool), returns its tracking id.
    pub fn add_subject(
        &self,
        name: &str,
        quantity: u32,
        unit: SubjectUnit,
        variety_id: Option<Uuid>,
    ) -> String {
        let season = self.active_season().expect("store has an active season");
        let tracking_id = new_tracking_id(season.year);
        self.inner.write().unwrap().subjects.push(Subject {
            id: Uuid::new_v4(),
            tracking_id: tracking_id.clone(),
            name: name.to_string(),
            quantity,
            unit,
            stage: SubjectStage::Semis,
            variety_id,
            season_id: season.id,
        });
        tracking_id
    }

    /// A small believable garden for demos and end-to-end tests.
    pub fn seed_demo(&self) {
        let tomate = self.add_plant("Tomate", Some("Marmande"));
        self.add_plant("Tomate", Some("Coeur de Boeuf"));
        let radis = self.add_plant("Radis", Some("de 18 jours"));
        self.add_plant("Betterave", Some("Crapaudine"));
        self.add_plant("Courgette", None);

        self.add_subject("Tomate", 4, SubjectUnit::Plant, Some(tomate));
        self.add_subject("Radis", 30, SubjectUnit::Individu, Some(radis));
    }
}

impl Default for MemoryGardenStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Tracking ids look like `2026-SUJ-A3F9`.
pub fn new_tracking_id(year: i32) -> String {
    let suffix: String = Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(4)
        .collect::<String>()
        .to_uppercase();
    format!("{year}-SUJ-{suffix}")
}

impl GardenStore for MemoryGardenStore {
    fn list_plants(&self) -> Vec<Plant> {
        self.inner.read().unwrap().plants.clone()
    }

    fn list_subjects(&self) -> Vec<Subject> {
        self.inner.read().unwrap().subjects.clone()
    }

    fn active_season(&self) -> Option<Season> {
        self.inner
            .read()
            .unwrap()
            .seasons
            .iter()
            .find(|s| s.active)
            .cloned()
    }

    fn insert_subject(&self, subject: Subject) {
        self.inner.write().unwrap().subjects.push(subject);
    }

    fn set_subject_quantity(&self, subject_id: Uuid, quantity: u32) {
        let mut inner = self.inner.write().unwrap();
        if let Some(subject) = inner.subjects.iter_mut().find(|s| s.id == subject_id) {
            subject.quantity = quantity;
        }
    }

    fn insert_event(&self, event: GardenEvent) {
        self.inner.write().unwrap().events.push(event);
    }

    fn list_events(&self, limit: usize, subject_id: Option<Uuid>) -> Vec<GardenEvent> {
        let inner = self.inner.read().unwrap();
        inner
            .events
            .iter()
            .rev()
            .filter(|e| subject_id.is_none_or(|id| e.subject_id == id))
            .take(limit)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_parse_normalizes_seeds() {
        assert_eq!(SubjectUnit::parse("graines").unwrap(), SubjectUnit::Individu);
        assert_eq!(SubjectUnit::parse("PLANT").unwrap(), SubjectUnit::Plant);
        // the error echoes the input as written, like ActionType::parse
        let err = SubjectUnit::parse("tonneau").unwrap_err();
        assert!(err.contains("tonneau"));
    }

    #[test]
    fn action_parse_folds_accents() {
        assert_eq!(ActionType::parse("récolte").unwrap(), ActionType::Recolte);
        assert_eq!(ActionType::parse("SEMIS").unwrap(), ActionType::Semis);
        assert!(ActionType::parse("danser").is_err());
    }

    #[test]
    fn tracking_id_shape() {
        let id = new_tracking_id(2026);
        assert!(id.starts_with("2026-SUJ-"));
        assert_eq!(id.len(), "2026-SUJ-".len() + 4);
    }

    #[test]
    fn subject_serializes_french_fields() {
        let store = MemoryGardenStore::new();
        store.seed_demo();
        let subjects = store.list_subjects();
        let json = serde_json::to_value(&subjects[0]).unwrap();
        assert_eq!(json["nom"], "Tomate");
        assert_eq!(json["quantite"], 4);
        assert_eq!(json["stade"], "SEMIS");
    }

    #[test]
    fn events_listed_newest_first_with_limit() {
        let store = MemoryGardenStore::new();
        let season = store.active_season().unwrap();
        let subject_id = Uuid::new_v4();
        for i in 0..5 {
            store.insert_event(GardenEvent {
                id: Uuid::new_v4(),
                subject_id,
                season_id: season.id,
                action: ActionType::Soin,
                date: Utc::now(),
                data: serde_json::json!({ "n": i }),
            });
        }
        let events = store.list_events(2, Some(subject_id));
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].data["n"], 4);
    }
}
