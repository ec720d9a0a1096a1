use serde_json::json;
use std::{collections::HashMap, fs, path::Path, sync::Arc};
use tempfile::TempDir;

use crate::integration::mocks::{
	MockClientRepository, MockNetworkRepository, MockProviderPool, MockSubscriptionRepository,
	WATCHED_ADDRESS,
};
use blockchain_listener::{
	bootstrap::{create_pollers, create_stores, initialize_services},
	models::{ChainPair, Network, Subscription},
	repositories::{
		ClientRepository, ClientService, NetworkRepository, NetworkService,
		SubscriptionRepository, SubscriptionService,
	},
	services::{
		blockchain::{ChainDataProvider, ProviderError},
		listener::InMemoryCursorStore,
		notification::NotificationClientPool,
		tracker::InMemoryActionItemStore,
	},
	utils::tests::{
		builders::{
			client::ClientBuilder, network::NetworkBuilder, subscription::SubscriptionBuilder,
		},
		TestChain,
	},
};

type FileSubscriptionRepository = SubscriptionRepository<NetworkRepository, ClientRepository>;

fn write_config(dir: &Path, kind: &str, file: &str, value: serde_json::Value) {
	let kind_dir = dir.join(kind);
	fs::create_dir_all(&kind_dir).unwrap();
	fs::write(kind_dir.join(file), value.to_string()).unwrap();
}

fn network_json(name: &str, network_id: &str) -> serde_json::Value {
	json!({
		"name": name,
		"blockchain_id": "ethereum",
		"network_id": network_id,
		"rpc_urls": [{
			"type_": "rpc",
			"url": { "type": "plain", "value": format!("https://{}.rpc.test", network_id) },
			"weight": 100
		}],
		"cron_schedule": "0 */1 * * * *",
		"max_batch_size": 20,
		"max_reorg_depth": 12
	})
}

fn subscription_json(
	name: &str,
	client_id: &str,
	network_id: &str,
	paused: bool,
) -> serde_json::Value {
	json!({
		"name": name,
		"client_id": client_id,
		"blockchain_id": "ethereum",
		"network_id": network_id,
		"min_confirmations": 12,
		"paused": paused,
		"watch": { "type": "address", "address": WATCHED_ADDRESS }
	})
}

fn write_full_config(dir: &Path) {
	write_config(
		dir,
		"networks",
		"ethereum_mainnet.json",
		network_json("Ethereum Mainnet", "mainnet"),
	);
	write_config(
		dir,
		"networks",
		"ethereum_sepolia.json",
		network_json("Ethereum Sepolia", "sepolia"),
	);
	write_config(
		dir,
		"clients",
		"acme.json",
		json!({
			"client_id": "acme",
			"name": "Acme",
			"webhook": {
				"url": { "type": "plain", "value": "https://hooks.acme.test/chain" },
				"secret": { "type": "plain", "value": "whsec_acme" }
			},
			"delivery": { "max_attempts": 3 }
		}),
	);
	write_config(
		dir,
		"subscriptions",
		"treasury.json",
		subscription_json("treasury", "acme", "mainnet", false),
	);
	write_config(
		dir,
		"subscriptions",
		"faucet.json",
		subscription_json("faucet", "acme", "sepolia", true),
	);
}

#[tokio::test]
async fn test_initialize_services_from_config_dir() {
	let dir = TempDir::new().unwrap();
	write_full_config(dir.path());

	let (active, networks, clients, subscription_service, network_service, client_service) =
		initialize_services::<FileSubscriptionRepository, NetworkRepository, ClientRepository>(
			Some(dir.path()),
			None,
			None,
			None,
		)
		.await
		.unwrap();

	assert_eq!(active.len(), 1);
	assert_eq!(active[0].name, "treasury");
	assert_eq!(networks.len(), 2);
	assert_eq!(networks["ethereum_mainnet"].max_reorg_depth, 12);
	assert_eq!(clients["acme"].delivery.max_attempts, 3);

	assert_eq!(subscription_service.lock().await.get_all().len(), 2);
	assert!(network_service
		.lock()
		.await
		.get_by_pair(&ChainPair::new("ethereum", "sepolia"))
		.is_some());
	assert!(client_service.lock().await.get("acme").is_some());
}

#[tokio::test]
async fn test_initialize_services_rejects_unknown_client() {
	let dir = TempDir::new().unwrap();
	write_full_config(dir.path());
	write_config(
		dir.path(),
		"subscriptions",
		"orphan.json",
		subscription_json("orphan", "globex", "mainnet", false),
	);

	let result =
		initialize_services::<FileSubscriptionRepository, NetworkRepository, ClientRepository>(
			Some(dir.path()),
			None,
			None,
			None,
		)
		.await;

	let error = result.err().unwrap();
	assert!(error
		.to_string()
		.contains("references non-existent client 'globex'"));
}

#[tokio::test]
async fn test_initialize_services_rejects_duplicate_pairs() {
	let dir = TempDir::new().unwrap();
	write_full_config(dir.path());
	write_config(
		dir.path(),
		"networks",
		"ethereum_mainnet_backup.json",
		network_json("Ethereum Mainnet Backup", "mainnet"),
	);

	let result =
		initialize_services::<FileSubscriptionRepository, NetworkRepository, ClientRepository>(
			Some(dir.path()),
			None,
			None,
			None,
		)
		.await;
	assert!(result.is_err());
}

#[tokio::test]
async fn test_initialize_services_with_mocked_repositories() {
	let mut network_repository = MockNetworkRepository::default();
	network_repository
		.expect_get_all()
		.times(1)
		.returning(|| {
			HashMap::from([(
				"ethereum_mainnet".to_string(),
				NetworkBuilder::new().build(),
			)])
		});

	let mut client_repository = MockClientRepository::default();
	client_repository
		.expect_get_all()
		.times(1)
		.returning(|| HashMap::from([("acme".to_string(), ClientBuilder::new().build())]));

	let mut subscription_repository =
		MockSubscriptionRepository::<MockNetworkRepository, MockClientRepository>::default();
	subscription_repository.expect_get_all().times(1).returning(|| {
		HashMap::from([
			(
				"treasury".to_string(),
				SubscriptionBuilder::new().name("treasury").build(),
			),
			(
				"paused".to_string(),
				SubscriptionBuilder::new().name("paused").paused(true).build(),
			),
		])
	});

	let (active, networks, clients, _, _, _) = initialize_services(
		None,
		Some(SubscriptionService::new_with_repository(subscription_repository).unwrap()),
		Some(NetworkService::new_with_repository(network_repository).unwrap()),
		Some(ClientService::new_with_repository(client_repository).unwrap()),
	)
	.await
	.unwrap();

	assert_eq!(active.len(), 1);
	assert_eq!(networks.len(), 1);
	assert_eq!(clients.len(), 1);
}

fn listened_networks() -> HashMap<String, Network> {
	HashMap::from([
		("ethereum_mainnet".to_string(), NetworkBuilder::new().build()),
		(
			"ethereum_sepolia".to_string(),
			NetworkBuilder::new()
				.name("Ethereum Sepolia")
				.network_id("sepolia")
				.build(),
		),
		(
			"ethereum_holesky".to_string(),
			NetworkBuilder::new()
				.name("Ethereum Holesky")
				.network_id("holesky")
				.build(),
		),
	])
}

fn active_subscriptions() -> Vec<Subscription> {
	vec![
		SubscriptionBuilder::new().name("treasury").build(),
		SubscriptionBuilder::new()
			.name("faucet")
			.pair("ethereum", "sepolia")
			.build(),
	]
}

#[tokio::test]
async fn test_create_pollers_skips_networks_without_provider() {
	let mut provider_pool = MockProviderPool::new();
	provider_pool
		.expect_get_provider()
		.times(2)
		.returning(|network| {
			if network.network_id == "sepolia" {
				return Err(ProviderError::provider_pool_error(
					"No usable RPC endpoint",
					None,
					None,
				));
			}
			Ok(Arc::new(TestChain::new(network.pair())) as Arc<dyn ChainDataProvider>)
		});

	let pollers = create_pollers(
		&listened_networks(),
		&active_subscriptions(),
		HashMap::from([("acme".to_string(), ClientBuilder::new().build())]),
		&provider_pool,
		Arc::new(InMemoryCursorStore::new()),
		Arc::new(InMemoryActionItemStore::new()),
		Arc::new(NotificationClientPool::new()),
	)
	.await;

	// Holesky has no subscriptions, sepolia no provider
	assert_eq!(pollers.len(), 1);
	assert_eq!(pollers[0].pair(), &ChainPair::new("ethereum", "mainnet"));
}

#[tokio::test]
async fn test_created_pollers_share_file_stores() {
	let dir = TempDir::new().unwrap();
	let (cursors, items) = create_stores(dir.path());

	let mut provider_pool = MockProviderPool::new();
	provider_pool.expect_get_provider().returning(|network| {
		let test_chain = TestChain::new(network.pair());
		test_chain.extend_to(3, 0);
		Ok(Arc::new(test_chain) as Arc<dyn ChainDataProvider>)
	});

	let pollers = create_pollers(
		&listened_networks(),
		&active_subscriptions(),
		HashMap::new(),
		&provider_pool,
		cursors,
		items,
		Arc::new(NotificationClientPool::new()),
	)
	.await;
	assert_eq!(pollers.len(), 2);

	for poller in &pollers {
		let report = poller.run_cycle().await.unwrap();
		assert_eq!(report.scanned_to, Some(3));
	}

	for slug in ["ethereum_mainnet", "ethereum_sepolia"] {
		assert!(dir.path().join(format!("{}_cursor.json", slug)).exists());
	}
}
