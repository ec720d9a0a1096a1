//! Client configuration repository implementation.
//!
//! Clients are keyed by `client_id` (not by file name), since that is how subscriptions and
//! action items refer to them.

#![allow(clippy::result_large_err)]

use std::{collections::HashMap, path::Path};

use async_trait::async_trait;

use crate::{
	models::{Client, ConfigLoader},
	repositories::error::{path_metadata, RepositoryError},
};

/// Repository for storing and retrieving client configurations
#[derive(Clone)]
pub struct ClientRepository {
	/// Map of client ids to their configurations
	pub clients: HashMap<String, Client>,
}

impl ClientRepository {
	pub async fn new(path: Option<&Path>) -> Result<Self, RepositoryError> {
		let clients = Self::load_all(path).await?;
		Ok(ClientRepository { clients })
	}

	pub fn new_with_clients(clients: impl IntoIterator<Item = Client>) -> Self {
		ClientRepository {
			clients: clients
				.into_iter()
				.map(|client| (client.client_id.clone(), client))
				.collect(),
		}
	}
}

/// Interface for client repository implementations
#[async_trait]
pub trait ClientRepositoryTrait: Clone {
	async fn new(path: Option<&Path>) -> Result<Self, RepositoryError>
	where
		Self: Sized;

	/// Load all clients from the given path, keyed by `client_id`
	async fn load_all(path: Option<&Path>) -> Result<HashMap<String, Client>, RepositoryError>;

	/// Get a client by id
	fn get(&self, client_id: &str) -> Option<Client>;

	fn get_all(&self) -> HashMap<String, Client>;
}

#[async_trait]
impl ClientRepositoryTrait for ClientRepository {
	async fn new(path: Option<&Path>) -> Result<Self, RepositoryError> {
		ClientRepository::new(path).await
	}

	async fn load_all(path: Option<&Path>) -> Result<HashMap<String, Client>, RepositoryError> {
		let by_file: HashMap<String, Client> = Client::load_all(path).await.map_err(|e| {
			RepositoryError::load_error(
				"Failed to load clients",
				Some(Box::new(e)),
				path_metadata(path),
			)
		})?;

		Ok(by_file
			.into_values()
			.map(|client| (client.client_id.clone(), client))
			.collect())
	}

	fn get(&self, client_id: &str) -> Option<Client> {
		self.clients.get(client_id).cloned()
	}

	fn get_all(&self) -> HashMap<String, Client> {
		self.clients.clone()
	}
}

/// Service layer for client repository operations
#[derive(Clone)]
pub struct ClientService<T: ClientRepositoryTrait> {
	repository: T,
}

impl<T: ClientRepositoryTrait> ClientService<T> {
	pub async fn new(
		path: Option<&Path>,
	) -> Result<ClientService<ClientRepository>, RepositoryError> {
		let repository = ClientRepository::new(path).await?;
		Ok(ClientService { repository })
	}

	pub fn new_with_repository(repository: T) -> Result<Self, RepositoryError> {
		Ok(ClientService { repository })
	}

	pub fn get(&self, client_id: &str) -> Option<Client> {
		self.repository.get(client_id)
	}

	pub fn get_all(&self) -> HashMap<String, Client> {
		self.repository.get_all()
	}
}
