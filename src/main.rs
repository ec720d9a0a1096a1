//! Blockchain listener service entry point.
//!
//! This binary provides the main entry point for the blockchain listener. It loads the
//! configuration, builds one poller per (blockchain, network) pair with active subscriptions,
//! schedules their cycles and handles graceful shutdown on interrupt signals.
//!
//! # Architecture
//! The service is built around several key components:
//! - Networks: pairs to listen on, with their RPC endpoints and cycle settings
//! - Subscriptions: what to watch for on behalf of a client
//! - Clients: webhook destinations of fired action items
//! - Services: polling, scanning, confirmation tracking and webhook delivery
//!
//! # Flow
//! 1. Loads configurations from the configuration directory
//! 2. Opens the cursor and action item stores in the data directory
//! 3. Creates a poller for every network with active subscriptions
//! 4. Schedules one cron job per pair
//! 5. Handles graceful shutdown on Ctrl+C

pub mod bootstrap;
pub mod models;
pub mod repositories;
pub mod services;
pub mod utils;

use crate::{
	bootstrap::{
		create_pollers, create_stores, initialize_services, networks_to_listen, Result,
	},
	repositories::{ClientRepository, NetworkRepository, SubscriptionRepository},
	services::{
		blockchain::ProviderPool,
		listener::ListenerService,
		notification::NotificationClientPool,
		tracker::FileActionItemStore,
	},
	utils::{
		logging::setup_logging, metrics::server::create_metrics_server,
		parse_string_to_bytes_size,
	},
};

use clap::Parser;
use dotenvy::dotenv_override;
use std::{
	env::{set_var, var},
	path::{Path, PathBuf},
	sync::Arc,
};
use tokio_cron_scheduler::JobScheduler;
use tracing::{error, info};

type DefaultSubscriptionRepository = SubscriptionRepository<NetworkRepository, ClientRepository>;

#[derive(Parser)]
#[command(
	name = "blockchain-listener",
	about = "Watches blockchain networks for subscribed transactions, addresses and contract events and delivers confirmed matches to client webhooks.",
	version
)]
struct Cli {
	/// Write logs to file instead of stdout
	#[arg(long)]
	log_file: bool,

	/// Set log level (trace, debug, info, warn, error)
	#[arg(long, value_name = "LEVEL")]
	log_level: Option<String>,

	/// Path to store log files (default: logs/)
	#[arg(long, value_name = "PATH")]
	log_path: Option<String>,

	/// Maximum log file size before rolling (e.g., "1GB", "500MB", "1024KB")
	#[arg(long, value_name = "SIZE", value_parser = parse_string_to_bytes_size)]
	log_max_size: Option<u64>,

	/// Address to start the metrics server on (default: 127.0.0.1:8081)
	#[arg(long, value_name = "HOST:PORT")]
	metrics_address: Option<String>,

	/// Enable metrics server
	#[arg(long)]
	metrics: bool,

	/// Directory holding networks/, clients/ and subscriptions/ (default: config/)
	#[arg(long, value_name = "PATH")]
	config_dir: Option<PathBuf>,

	/// Directory for cursors and action items
	#[arg(long, value_name = "PATH", default_value = "data")]
	data_dir: PathBuf,

	/// Validate configuration files without starting the service
	#[arg(long)]
	check: bool,
}

impl Cli {
	/// Apply CLI options to environment variables, overriding any existing values
	fn apply_to_env(&self) {
		// Reload environment variables from .env file
		// Override any existing environment variables
		dotenv_override().ok();

		// Log file mode - override if CLI flag is set
		if self.log_file {
			set_var("LOG_MODE", "file");
		}

		// Set log level from RUST_LOG if it exists
		if let Ok(level) = var("RUST_LOG") {
			set_var("LOG_LEVEL", level);
		}

		// Log level - override if CLI flag is set
		if let Some(level) = &self.log_level {
			set_var("LOG_LEVEL", level);
			set_var("RUST_LOG", level);
		}

		// Log path - override if CLI flag is set
		if let Some(path) = &self.log_path {
			set_var("LOG_DATA_DIR", path);
		}

		// Log max size - override if CLI flag is set
		if let Some(max_size) = &self.log_max_size {
			set_var("LOG_MAX_SIZE", max_size.to_string());
		}

		// Metrics server - override if CLI flag is set
		if self.metrics {
			set_var("METRICS_ENABLED", "true");
		}

		// Metrics address - override if CLI flag is set
		if let Some(address) = &self.metrics_address {
			// Extract port from address if it's in HOST:PORT format
			if let Some(port) = address.split(':').nth(1) {
				set_var("METRICS_PORT", port);
			}
		}
	}

	/// Metrics bind address: the CLI value, else `METRICS_PORT` on localhost, else port 8081
	fn metrics_bind_address(&self) -> String {
		match &self.metrics_address {
			Some(address) => address.clone(),
			None => var("METRICS_PORT")
				.map(|port| format!("127.0.0.1:{}", port))
				.unwrap_or_else(|_| "127.0.0.1:8081".to_string()),
		}
	}
}

/// Main entry point for the blockchain listener.
///
/// # Errors
/// Returns an error if service initialization fails or if there's an error during shutdown.
#[tokio::main]
async fn main() -> Result<()> {
	let cli = Cli::parse();

	// Apply CLI options to environment
	cli.apply_to_env();

	// Setup logging to stdout
	setup_logging().unwrap_or_else(|e| {
		error!("Failed to setup logging: {}", e);
	});

	// If --check flag is provided, only validate configuration and exit
	if cli.check {
		validate_configuration(cli.config_dir.as_deref()).await;
		return Ok(());
	}

	let (active_subscriptions, networks, clients, subscription_service, network_service, _) =
		initialize_services::<DefaultSubscriptionRepository, NetworkRepository, ClientRepository>(
			cli.config_dir.as_deref(),
			None,
			None,
			None,
		)
		.await
		.map_err(|e| anyhow::anyhow!("Failed to initialize services: {}", e))?;

	// Check if metrics should be enabled from either CLI flag or env var
	let metrics_enabled =
		cli.metrics || var("METRICS_ENABLED").map(|v| v == "true").unwrap_or(false);

	let metrics_server = if metrics_enabled {
		let metrics_address = cli.metrics_bind_address();
		info!("Metrics server enabled, starting on {}", metrics_address);

		match create_metrics_server(
			metrics_address,
			subscription_service.clone(),
			network_service.clone(),
		) {
			Ok(server) => Some(server),
			Err(e) => {
				error!("Failed to create metrics server: {}", e);
				None
			}
		}
	} else {
		info!("Metrics server disabled. Use --metrics flag or METRICS_ENABLED=true to enable");
		None
	};

	let (cursor_store, action_item_store) = create_stores(&cli.data_dir);
	let provider_pool = ProviderPool::new();
	let pollers = create_pollers(
		&networks,
		&active_subscriptions,
		clients,
		&provider_pool,
		cursor_store,
		action_item_store,
		Arc::new(NotificationClientPool::new()),
	)
	.await;

	if pollers.is_empty() {
		info!("No networks with active subscriptions found. Exiting...");
		return Ok(());
	}

	let listener_service = ListenerService::<FileActionItemStore, JobScheduler>::new();
	for poller in pollers {
		let pair = poller.pair().clone();
		let _ = listener_service
			.start_listener(poller)
			.await
			.inspect_err(|e| {
				error!("Failed to start listener for {}: {}", pair, e);
			});
	}

	info!("Service started. Press Ctrl+C to shutdown");

	let ctrl_c = tokio::signal::ctrl_c();

	if let Some(metrics_future) = metrics_server {
		tokio::select! {
			result = ctrl_c => {
				if let Err(e) = result {
					error!("Error waiting for Ctrl+C: {}", e);
				}
				info!("Shutdown signal received, stopping services...");
			}
			result = metrics_future => {
				if let Err(e) = result {
					error!("Metrics server error: {}", e);
				}
				info!("Metrics server stopped, shutting down services...");
			}
		}
	} else {
		let _ = ctrl_c.await;
		info!("Shutdown signal received, stopping services...");
	}

	if let Err(e) = listener_service.stop_all().await {
		error!("Error during shutdown: {}", e);
	}

	tokio::time::sleep(tokio::time::Duration::from_secs(1)).await;

	info!("Shutdown complete");
	Ok(())
}

/// Validates configuration files and their structure
async fn validate_configuration(config_dir: Option<&Path>) {
	info!("Validating configuration files...");

	match initialize_services::<DefaultSubscriptionRepository, NetworkRepository, ClientRepository>(
		config_dir, None, None, None,
	)
	.await
	{
		Ok((active_subscriptions, networks, clients, _, _, _)) => {
			info!("✓ Configuration loaded successfully");
			info!("✓ Found {} client(s)", clients.len());

			if active_subscriptions.is_empty() {
				error!("No active subscriptions found.");
				return;
			}
			info!(
				"✓ Found {} active subscription(s)",
				active_subscriptions.len()
			);

			let listened = networks_to_listen(&networks, &active_subscriptions);
			if listened.is_empty() {
				error!("No networks with active subscriptions found.");
				return;
			}
			info!(
				"✓ Found {} network(s) with active subscriptions",
				listened.len()
			);

			info!("Configuration validation completed successfully!");
		}
		Err(e) => {
			error!("{}", e);
		}
	}
}
