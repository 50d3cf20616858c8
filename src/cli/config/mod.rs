//! Config command - prints the effective configuration

use clap::Args;

use crate::config::AppConfig;

#[derive(Debug, Args)]
pub struct ConfigArgs {
    /// Also print the effective cache policy of this model type
    #[arg(long)]
    pub model: Option<String>,
}

/// Load, validate and print the configuration
pub async fn run(args: ConfigArgs) -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load()?;

    for line in render(&config, args.model.as_deref())? {
        println!("{}", line);
    }

    Ok(())
}

/// Renders the configuration after checking the backend sections resolve
pub fn render(config: &AppConfig, model: Option<&str>) -> anyhow::Result<Vec<String>> {
    let cache = config.cache.to_cache_config()?;
    let storage = config.storage.to_storage_config()?;

    let mut lines = vec![
        serde_json::to_string_pretty(config)?,
        format!("cache backend: {}", cache.cache_type()),
        format!("storage backend: {}", storage.storage_type()),
    ];

    if let Some(model) = model {
        let policy = config.policy_for(model);
        lines.push(format!(
            "policy[{}]: single={} ({}s), list={} ({}s)",
            model.to_lowercase(),
            policy.single_enabled,
            policy.single_ttl.as_secs(),
            policy.list_enabled,
            policy.list_ttl.as_secs()
        ));
    }

    Ok(lines)
}
