//! `potager serve` — start the HTTP gateway.

use potager_gateway::GatewayState;
use std::path::Path;
use std::sync::Arc;

pub async fn run(config_path: Option<&Path>, port_override: Option<u16>) -> anyhow::Result<()> {
    let (mut config, runner, traces) = super::bootstrap(config_path)?;
    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    println!("🌱 Potager");
    println!("   Écoute : {}:{}", config.gateway.host, config.gateway.port);
    println!("   Modèle : {}", config.backend.model);

    potager_gateway::serve(&config.gateway, Arc::new(GatewayState { runner, traces })).await
}
