//! Main entry point for the ledger service.
//!
//! This binary wires the configured storage backend into the transition
//! ledger and serves the back-office HTTP API. Storage backends are pluggable
//! through the factory registry; the configuration file selects one and
//! provides its settings.

use clap::Parser;
use ledger_config::Config;
use ledger_core::Ledger;
use ledger_storage::{StorageFactory, StorageService};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

mod apis;
mod server;

/// Command-line arguments for the ledger service.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, default_value = "config.toml")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,
}

/// Main entry point for the ledger service.
///
/// This function:
/// 1. Parses command-line arguments
/// 2. Initializes logging infrastructure
/// 3. Loads configuration from file
/// 4. Builds the storage service and the ledger over it
/// 5. Serves the HTTP API until interrupted
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	// Initialize tracing with env filter
	use tracing_subscriber::{fmt, EnvFilter};

	let default_directive = args.log_level.to_string();
	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

	fmt()
		.with_env_filter(env_filter)
		.with_thread_ids(true)
		.with_target(true)
		.init();

	tracing::info!("Started ledger service");

	let config_path = args
		.config
		.to_str()
		.ok_or("Configuration path is not valid UTF-8")?;
	let config = Config::from_file(config_path).await?;
	tracing::info!("Loaded configuration [{}]", config.service.id);

	let storage = Arc::new(build_storage(&config)?);
	let ledger = Arc::new(Ledger::new(Arc::clone(&storage)));

	let api_enabled = config.api.as_ref().is_some_and(|api| api.enabled);
	if !api_enabled {
		tracing::warn!("API server disabled in configuration; nothing to serve");
		return Ok(());
	}

	let api_config = match config.api.clone() {
		Some(api) => api,
		None => return Ok(()),
	};
	server::start_server(api_config, config.service.id.clone(), ledger, storage).await?;

	tracing::info!("Stopped ledger service");
	Ok(())
}

/// Builds the storage service from configuration.
///
/// Looks up the configured primary implementation in the factory registry,
/// validates its configuration table against the implementation's schema,
/// and wraps the backend in the typed storage service.
fn build_storage(config: &Config) -> Result<StorageService, Box<dyn std::error::Error>> {
	let factories: HashMap<String, StorageFactory> = ledger_storage::get_all_implementations()
		.into_iter()
		.map(|(name, factory)| (name.to_string(), factory))
		.collect();

	let factory = factories.get(&config.storage.primary).ok_or_else(|| {
		format!(
			"Unknown storage implementation '{}'",
			config.storage.primary
		)
	})?;

	let impl_config = config
		.storage
		.implementations
		.get(&config.storage.primary)
		.cloned()
		.unwrap_or_else(|| toml::Value::Table(toml::map::Map::new()));

	let backend = factory(&impl_config)?;
	backend.config_schema().validate(&impl_config)?;

	tracing::info!(backend = %config.storage.primary, "Storage backend ready");
	Ok(StorageService::new(backend))
}
