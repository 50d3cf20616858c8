//! Cache command - administration of the configured cache backend

use clap::{Args, Subcommand};
use tracing::info;

use crate::config::AppConfig;
use crate::domain::cache::CacheStore;
use crate::domain::DomainError;
use crate::infrastructure::cache::CacheFactory;
use crate::infrastructure::logging;

#[derive(Debug, Args)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub action: CacheAction,
}

#[derive(Debug, Subcommand)]
pub enum CacheAction {
    /// Remove every entry
    Clear,

    /// Remove entries matching a glob pattern (e.g. `order:*`)
    Purge { pattern: String },

    /// List keys matching a glob pattern
    Keys {
        #[arg(default_value = "*")]
        pattern: String,
    },

    /// Show whether a key exists, its remaining TTL and value
    Inspect { key: String },
}

/// Run a cache administration command
pub async fn run(args: CacheArgs) -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load()?;
    logging::init_logging(&config.logging)?;

    let cache_config = config.cache.to_cache_config()?;
    info!(backend = %cache_config.cache_type(), "Connecting to cache");

    let cache = CacheFactory::new().create(&cache_config).await?;

    for line in execute(cache.as_ref(), &args.action).await? {
        println!("{}", line);
    }

    Ok(())
}

/// Applies an action to a cache, returning the lines to print
pub async fn execute(cache: &dyn CacheStore, action: &CacheAction) -> Result<Vec<String>, DomainError> {
    match action {
        CacheAction::Clear => {
            let removed = cache.clear_all().await?;
            info!(removed, "Cache cleared");
            Ok(vec![format!("removed {} entries", removed)])
        }
        CacheAction::Purge { pattern } => {
            let removed = cache.delete_pattern(pattern).await?;
            info!(pattern = %pattern, removed, "Cache purged");
            Ok(vec![format!("removed {} entries matching '{}'", removed, pattern)])
        }
        CacheAction::Keys { pattern } => {
            let mut keys = cache.keys(pattern).await?;
            keys.sort();
            Ok(keys)
        }
        CacheAction::Inspect { key } => {
            let Some(value) = cache.get_raw(key).await? else {
                return Ok(vec![format!("{}: absent", key)]);
            };

            let ttl = match cache.ttl(key).await? {
                Some(ttl) => format!("{}ms", ttl.as_millis()),
                None => "none".to_string(),
            };

            Ok(vec![
                format!("{}: present", key),
                format!("ttl: {}", ttl),
                format!("value: {}", value),
            ])
        }
    }
}
