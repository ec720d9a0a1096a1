//! Subscription configuration repository implementation.
//!
//! Every subscription must reference a configured client and a configured network pair.

#![allow(clippy::result_large_err)]

use std::{collections::HashMap, marker::PhantomData, path::Path};

use async_trait::async_trait;

use crate::{
	models::{ChainPair, Client, ConfigLoader, Network, Subscription},
	repositories::{
		client::{ClientRepository, ClientRepositoryTrait, ClientService},
		error::{path_metadata, RepositoryError},
		network::{NetworkRepository, NetworkRepositoryTrait, NetworkService},
	},
};

/// Repository for storing and retrieving subscriptions
#[derive(Clone)]
pub struct SubscriptionRepository<
	N: NetworkRepositoryTrait + Send + 'static,
	C: ClientRepositoryTrait + Send + 'static,
> {
	/// Map of subscription names to subscriptions
	pub subscriptions: HashMap<String, Subscription>,
	_network_repository: PhantomData<N>,
	_client_repository: PhantomData<C>,
}

impl<
		N: NetworkRepositoryTrait + Send + Sync + 'static,
		C: ClientRepositoryTrait + Send + Sync + 'static,
	> SubscriptionRepository<N, C>
{
	pub async fn new(
		path: Option<&Path>,
		network_service: Option<NetworkService<N>>,
		client_service: Option<ClientService<C>>,
	) -> Result<Self, RepositoryError> {
		let subscriptions = Self::load_all(path, network_service, client_service).await?;
		Ok(Self::new_with_subscriptions(subscriptions))
	}

	pub fn new_with_subscriptions(subscriptions: HashMap<String, Subscription>) -> Self {
		SubscriptionRepository {
			subscriptions,
			_network_repository: PhantomData,
			_client_repository: PhantomData,
		}
	}

	/// Checks that every subscription references a known client and network pair
	pub fn validate_subscription_references(
		subscriptions: &HashMap<String, Subscription>,
		clients: &HashMap<String, Client>,
		networks: &HashMap<String, Network>,
	) -> Result<(), RepositoryError> {
		let mut validation_errors = Vec::new();
		let mut metadata = HashMap::new();

		let pairs: Vec<ChainPair> = networks.values().map(Network::pair).collect();

		for subscription in subscriptions.values() {
			if !clients.contains_key(&subscription.client_id) {
				validation_errors.push(format!(
					"Subscription '{}' references non-existent client '{}'",
					subscription.name, subscription.client_id
				));
				metadata.insert(
					format!("subscription_{}_invalid_client", subscription.name),
					subscription.client_id.clone(),
				);
			}

			let pair = subscription.pair();
			if !pairs.contains(&pair) {
				validation_errors.push(format!(
					"Subscription '{}' references non-existent network '{}'",
					subscription.name, pair
				));
				metadata.insert(
					format!("subscription_{}_invalid_network", subscription.name),
					pair.to_string(),
				);
			}
		}

		if !validation_errors.is_empty() {
			return Err(RepositoryError::validation_error(
				format!(
					"Configuration validation failed:\n{}",
					validation_errors.join("\n"),
				),
				None,
				Some(metadata),
			));
		}

		Ok(())
	}
}

/// Interface for subscription repository implementations
#[async_trait]
pub trait SubscriptionRepositoryTrait<
	N: NetworkRepositoryTrait + Send + 'static,
	C: ClientRepositoryTrait + Send + 'static,
>: Clone + Send
{
	async fn new(
		path: Option<&Path>,
		network_service: Option<NetworkService<N>>,
		client_service: Option<ClientService<C>>,
	) -> Result<Self, RepositoryError>
	where
		Self: Sized;

	/// Loads subscriptions and validates their references.
	///
	/// Services that are not provided are loaded from their default directories.
	async fn load_all(
		path: Option<&Path>,
		network_service: Option<NetworkService<N>>,
		client_service: Option<ClientService<C>>,
	) -> Result<HashMap<String, Subscription>, RepositoryError>;

	fn get(&self, name: &str) -> Option<Subscription>;

	fn get_all(&self) -> HashMap<String, Subscription>;
}

#[async_trait]
impl<
		N: NetworkRepositoryTrait + Send + Sync + 'static,
		C: ClientRepositoryTrait + Send + Sync + 'static,
	> SubscriptionRepositoryTrait<N, C> for SubscriptionRepository<N, C>
{
	async fn new(
		path: Option<&Path>,
		network_service: Option<NetworkService<N>>,
		client_service: Option<ClientService<C>>,
	) -> Result<Self, RepositoryError> {
		SubscriptionRepository::new(path, network_service, client_service).await
	}

	async fn load_all(
		path: Option<&Path>,
		network_service: Option<NetworkService<N>>,
		client_service: Option<ClientService<C>>,
	) -> Result<HashMap<String, Subscription>, RepositoryError> {
		let subscriptions: HashMap<String, Subscription> =
			Subscription::load_all(path).await.map_err(|e| {
				RepositoryError::load_error(
					"Failed to load subscriptions",
					Some(Box::new(e)),
					path_metadata(path),
				)
			})?;

		let networks = match network_service {
			Some(service) => service.get_all(),
			None => NetworkRepository::new(None).await?.networks,
		};
		let clients = match client_service {
			Some(service) => service.get_all(),
			None => ClientRepository::new(None).await?.clients,
		};

		Self::validate_subscription_references(&subscriptions, &clients, &networks)?;
		Ok(subscriptions)
	}

	fn get(&self, name: &str) -> Option<Subscription> {
		self.subscriptions.get(name).cloned()
	}

	fn get_all(&self) -> HashMap<String, Subscription> {
		self.subscriptions.clone()
	}
}

/// Service layer for subscription repository operations
#[derive(Clone)]
pub struct SubscriptionService<
	S: SubscriptionRepositoryTrait<N, C>,
	N: NetworkRepositoryTrait + Send + 'static,
	C: ClientRepositoryTrait + Send + 'static,
> {
	repository: S,
	_network_repository: PhantomData<N>,
	_client_repository: PhantomData<C>,
}

impl<
		S: SubscriptionRepositoryTrait<N, C>,
		N: NetworkRepositoryTrait + Send + Sync + 'static,
		C: ClientRepositoryTrait + Send + Sync + 'static,
	> SubscriptionService<S, N, C>
{
	pub async fn new(
		path: Option<&Path>,
		network_service: Option<NetworkService<N>>,
		client_service: Option<ClientService<C>>,
	) -> Result<SubscriptionService<SubscriptionRepository<N, C>, N, C>, RepositoryError> {
		let repository = SubscriptionRepository::new(path, network_service, client_service).await?;
		Ok(SubscriptionService {
			repository,
			_network_repository: PhantomData,
			_client_repository: PhantomData,
		})
	}

	pub fn new_with_repository(repository: S) -> Result<Self, RepositoryError> {
		Ok(SubscriptionService {
			repository,
			_network_repository: PhantomData,
			_client_repository: PhantomData,
		})
	}

	pub fn get(&self, name: &str) -> Option<Subscription> {
		self.repository.get(name)
	}

	pub fn get_all(&self) -> HashMap<String, Subscription> {
		self.repository.get_all()
	}

	/// Active (not paused) subscriptions of `pair`, sorted by name
	pub fn active_for_pair(&self, pair: &ChainPair) -> Vec<Subscription> {
		let mut subscriptions: Vec<Subscription> = self
			.repository
			.get_all()
			.into_values()
			.filter(|s| !s.paused && &s.pair() == pair)
			.collect();
		subscriptions.sort_by(|a, b| a.name.cmp(&b.name));
		subscriptions
	}
}
