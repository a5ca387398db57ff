//! `pincer status` — configuration, provider, and tool summary.

use std::sync::Arc;

use pincer_config::AppConfig;
use pincer_core::tool::ToolContext;
use pincer_tools::standard_registry;

pub async fn run() -> anyhow::Result<()> {
    let config = AppConfig::load()?;

    println!("Config file: {}", AppConfig::config_path().display());
    println!("Workspace:   {}", config.agent.workspace.display());

    match config.active_provider() {
        Some(provider) => {
            println!("Provider:    {} ({})", provider.name, provider.api_base);
            println!("Model:       {}", provider.model);
        }
        None => {
            println!("Provider:    none configured — add an API key to config.toml");
        }
    }

    let context = ToolContext {
        settings: Arc::new(config.tool_settings()),
        workspace: config.agent.workspace.clone(),
        restrict_to_workspace: config.agent.restrict_to_workspace,
        notify: None,
    };
    let registry = standard_registry(context, config.agent.max_tool_output_chars);
    println!("Tools:       {}", registry.names().join(", "));

    if config.heartbeat.enabled {
        println!("Heartbeat:   every {} min", config.heartbeat.interval_minutes);
    } else {
        println!("Heartbeat:   disabled");
    }

    Ok(())
}
