//! Listener service implementation.
//!
//! Schedules the cycles of every pair: one cron job per pair, all pairs in parallel. Each job
//! only calls [`ChainPoller::execute`], which owns the single-active-cycle guard.

use anyhow::Context;
use std::{collections::HashMap, sync::Arc};
use tokio::sync::RwLock;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{debug, info, instrument, warn};

use crate::{
	models::ChainPair,
	services::{
		listener::{
			error::ListenerError,
			poller::{ChainPoller, CycleOutcome},
		},
		tracker::ActionItemStore,
	},
};

/// Trait for job scheduler
///
/// This trait is used to abstract the job scheduler implementation.
/// It is used to allow the listener service to be used with different job scheduler
/// implementations.
#[async_trait::async_trait]
pub trait JobSchedulerTrait: Send + Sync + Sized {
	async fn new() -> Result<Self, Box<dyn std::error::Error + Send + Sync>>;
	async fn add(&self, job: Job) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
	async fn start(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
	async fn shutdown(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Implementation of the job scheduler trait for the JobScheduler struct
#[async_trait::async_trait]
impl JobSchedulerTrait for JobScheduler {
	async fn new() -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
		Self::new().await.map_err(Into::into)
	}

	async fn add(&self, job: Job) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
		self.add(job).await.map(|_| ()).map_err(Into::into)
	}

	async fn start(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
		self.start().await.map(|_| ()).map_err(Into::into)
	}

	async fn shutdown(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
		self.shutdown().await.map(|_| ()).map_err(Into::into)
	}
}

fn job_metadata(pair: &ChainPair) -> Option<HashMap<String, String>> {
	Some(HashMap::from([("job_id".to_string(), pair.job_id())]))
}

/// Scheduled listener of a single pair
///
/// # Type Parameters
/// * `S` - Action item storage of the poller
/// * `J` - Job scheduler implementation (must implement JobSchedulerTrait)
pub struct PairListener<S, J>
where
	S: ActionItemStore,
	J: JobSchedulerTrait,
{
	pub poller: Arc<ChainPoller<S>>,
	pub scheduler: J,
}

impl<S, J> PairListener<S, J>
where
	S: ActionItemStore + 'static,
	J: JobSchedulerTrait,
{
	pub async fn new(poller: Arc<ChainPoller<S>>) -> Result<Self, ListenerError> {
		let scheduler = J::new().await.map_err(|e| {
			ListenerError::scheduler_error(e.to_string(), Some(e), job_metadata(poller.pair()))
		})?;
		Ok(Self { poller, scheduler })
	}

	/// Registers the cron job of the pair and starts the scheduler
	pub async fn start(&mut self) -> Result<(), ListenerError> {
		let pair = self.poller.pair().clone();
		let poller = self.poller.clone();

		let job = Job::new_async(
			self.poller.network().cron_schedule.as_str(),
			move |_uuid, _l| {
				let poller = poller.clone();
				Box::pin(async move {
					run_scheduled_cycle(&poller).await;
				})
			},
		)
		.with_context(|| format!("Failed to create job {}", pair.job_id()))?;

		self.scheduler.add(job).await.map_err(|e| {
			ListenerError::scheduler_error(e.to_string(), Some(e), job_metadata(&pair))
		})?;

		self.scheduler.start().await.map_err(|e| {
			ListenerError::scheduler_error(e.to_string(), Some(e), job_metadata(&pair))
		})?;

		info!("Started listener job {}", pair.job_id());
		Ok(())
	}

	/// Shuts the scheduler down; a cycle already running is not interrupted
	pub async fn stop(&mut self) -> Result<(), ListenerError> {
		let pair = self.poller.pair().clone();
		self.scheduler.shutdown().await.map_err(|e| {
			ListenerError::scheduler_error(e.to_string(), Some(e), job_metadata(&pair))
		})?;

		info!("Stopped listener job {}", pair.job_id());
		Ok(())
	}
}

/// Runs one scheduled invocation of `poller`.
///
/// Errors were already logged when they were created; retryable ones are picked up again by the
/// next tick.
#[instrument(skip_all, fields(job_id = %poller.pair().job_id()))]
pub async fn run_scheduled_cycle<S: ActionItemStore>(poller: &ChainPoller<S>) {
	match poller.execute().await {
		Ok(CycleOutcome::Completed(report)) => {
			debug!(?report, "Scheduled cycle completed");
		}
		Ok(CycleOutcome::Skipped) => debug!("Scheduled cycle skipped"),
		Ok(CycleOutcome::Halted) => debug!("Listener halted, scheduled cycle not run"),
		Err(e) if e.is_retryable() => {
			warn!("Cycle failed, retrying on the next tick: {}", e);
		}
		Err(e) => {
			warn!("Cycle failed and the listener is halted: {}", e);
		}
	}
}

/// Map of active listeners, keyed by job id
type PairListenersMap<S, J> = HashMap<String, PairListener<S, J>>;

/// Service for managing the listeners of all pairs
///
/// # Type Parameters
/// * `S` - Action item storage of the pollers
/// * `J` - Job scheduler implementation (must implement JobSchedulerTrait)
pub struct ListenerService<S, J>
where
	S: ActionItemStore,
	J: JobSchedulerTrait,
{
	pub active_listeners: Arc<RwLock<PairListenersMap<S, J>>>,
}

impl<S, J> Default for ListenerService<S, J>
where
	S: ActionItemStore + 'static,
	J: JobSchedulerTrait,
{
	fn default() -> Self {
		Self::new()
	}
}

impl<S, J> ListenerService<S, J>
where
	S: ActionItemStore + 'static,
	J: JobSchedulerTrait,
{
	pub fn new() -> Self {
		Self {
			active_listeners: Arc::new(RwLock::new(HashMap::new())),
		}
	}

	/// Starts the scheduled listener of `poller`'s pair; a no-op if it is already running
	pub async fn start_listener(&self, poller: Arc<ChainPoller<S>>) -> Result<(), ListenerError> {
		let job_id = poller.pair().job_id();
		let mut listeners = self.active_listeners.write().await;

		if listeners.contains_key(&job_id) {
			info!("Listener already running: {}", job_id);
			return Ok(());
		}

		let mut listener = PairListener::<S, J>::new(poller).await?;
		listener.start().await?;
		listeners.insert(job_id, listener);

		Ok(())
	}

	/// Stops the listener of `pair` if it is running
	pub async fn stop_listener(&self, pair: &ChainPair) -> Result<(), ListenerError> {
		let mut listeners = self.active_listeners.write().await;

		if let Some(mut listener) = listeners.remove(&pair.job_id()) {
			listener.stop().await?;
		}

		Ok(())
	}

	/// Stops every listener, returning the first error after trying all of them
	pub async fn stop_all(&self) -> Result<(), ListenerError> {
		let mut listeners = self.active_listeners.write().await;
		let mut first_error = None;

		for (_, mut listener) in listeners.drain() {
			if let Err(e) = listener.stop().await {
				first_error.get_or_insert(e);
			}
		}

		first_error.map_or(Ok(()), Err)
	}

	/// Resumes a halted pair; `false` if no listener runs for it
	pub async fn resume(&self, pair: &ChainPair) -> bool {
		match self.active_listeners.read().await.get(&pair.job_id()) {
			Some(listener) => {
				listener.poller.resume();
				true
			}
			None => false,
		}
	}

	/// Job ids of the running listeners, sorted
	pub async fn active_jobs(&self) -> Vec<String> {
		let mut jobs: Vec<String> = self.active_listeners.read().await.keys().cloned().collect();
		jobs.sort();
		jobs
	}
}
