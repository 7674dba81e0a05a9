use std::sync::Arc;

use anyhow::Context;

use dot_traffic::config::TrafficConfig;
use dot_traffic::logging;
use dot_traffic::routing::TrafficRouter;
use dot_traffic::server;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = match TrafficConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            eprintln!("  export ANTHROPIC_API_KEY=sk-ant-...");
            std::process::exit(1);
        }
    };

    let _log_guard = logging::init(config.log_dir.as_deref())?;

    eprintln!("🚦 Dot Traffic v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Model: {}", config.llm.model);
    eprintln!("   Traffic API: http://0.0.0.0:{}/traffic", config.port);
    eprintln!("   Lookup policy: {}", config.lookup_policy.as_str());
    if config.airtable.api_key.is_none() {
        eprintln!("   Airtable: AIRTABLE_API_KEY not set, job lookups will be unresolved");
    } else {
        eprintln!("   Airtable: base {}", config.airtable.base_id);
    }

    let router = TrafficRouter::from_config(&config)?;

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port))
        .await
        .with_context(|| format!("failed to bind port {}", config.port))?;
    server::serve(listener, Arc::new(router)).await?;

    Ok(())
}
