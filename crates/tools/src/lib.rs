//! Garden tool implementations for Potager.
//!
//! Tools give the assistant the ability to act on the garden: search the
//! botanical referentiel, create culture subjects, log gestures in the
//! journal, and list the inventory or the history. They all operate
//! through the [`store::GardenStore`] seam so the same tools serve the
//! HTTP gateway, the CLI and the tests.

pub mod create_subject;
pub mod list_events;
pub mod list_subjects;
pub mod log_event;
pub mod matching;
pub mod search_garden;
pub mod store;

pub use store::{GardenStore, MemoryGardenStore};

use potager_core::tool::ToolRegistry;
use std::sync::Arc;

/// Create the tool registry the conversation loop dispatches through,
/// with all five garden tools bound to the given store.
pub fn garden_registry(store: Arc<dyn GardenStore>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(search_garden::SearchGardenTool::new(
        store.clone(),
    )));
    registry.register(Box::new(create_subject::CreateSubjectTool::new(
        store.clone(),
    )));
    registry.register(Box::new(log_event::LogEventTool::new(store.clone())));
    registry.register(Box::new(list_subjects::ListSubjectsTool::new(
        store.clone(),
    )));
    registry.register(Box::new(list_events::ListEventsTool::new(store)));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_contains_all_garden_tools() {
        let registry = garden_registry(Arc::new(MemoryGardenStore::new()));
        assert_eq!(
            registry.names(),
            vec![
                "create_subject",
                "list_garden_events",
                "list_my_subjects",
                "log_event",
                "search_garden",
            ]
        );
    }

    #[tokio::test]
    async fn registry_dispatch_reaches_a_tool() {
        let store = Arc::new(MemoryGardenStore::new());
        store.seed_demo();
        let registry = garden_registry(store);

        let outcome = registry
            .dispatch("search_garden", serde_json::json!({"query": "tomate"}))
            .await;
        assert!(outcome.success);
        assert_eq!(outcome.payload["count_subjects"], 1);
    }
}
