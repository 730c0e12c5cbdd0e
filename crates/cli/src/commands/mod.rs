pub mod ask;
pub mod serve;

use potager_agent::AgentRunner;
use potager_config::AppConfig;
use potager_providers::OpenAiCompatBackend;
use potager_telemetry::TraceStore;
use potager_tools::{MemoryGardenStore, garden_registry};
use std::path::Path;
use std::sync::Arc;

/// Traces kept in memory for /traces.
const TRACE_CAPACITY: usize = 500;

/// Load the configuration and wire the runner: backend connector, seeded
/// garden store, tool registry and trace sink.
pub fn bootstrap(config_path: Option<&Path>) -> anyhow::Result<(AppConfig, Arc<AgentRunner>, Arc<TraceStore>)> {
    let config = AppConfig::load(config_path)?;

    let backend = Arc::new(OpenAiCompatBackend::new(
        &config.backend.base_url,
        config.backend.api_key.as_deref().unwrap_or("ollama"),
        &config.backend.model,
        config.backend.temperature,
    ));

    let store = Arc::new(MemoryGardenStore::new());
    store.seed_demo();

    let traces = Arc::new(TraceStore::new(TRACE_CAPACITY));
    let runner = Arc::new(AgentRunner::new(
        backend,
        Arc::new(garden_registry(store)),
        traces.clone(),
        config.agent.clone(),
        &config.backend.model,
    ));

    Ok((config, runner, traces))
}
