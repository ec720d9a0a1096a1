//! Chain poller: one polling cycle for one pair.
//!
//! A cycle reads the provider head, reconciles the cursor with the provider's chain, scans the
//! next batch of blocks one at a time (committing the cursor after each), then lets the
//! confirmation tracker fire items and the dispatcher deliver them.

use std::{
	collections::HashMap,
	sync::{
		atomic::{AtomicBool, Ordering},
		Arc,
	},
	time::{Duration, Instant},
};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::{
	models::{ActionItemKind, Block, ChainCursor, ChainPair, Network, Subscription},
	services::{
		blockchain::ChainDataProvider,
		listener::{
			error::ListenerError,
			reorg::{compare_with_chain, ChainComparison, ReorgReport},
			storage::CursorStore,
		},
		notification::{DeliveryOutcome, WebhookDispatcher},
		scanner::{default_scanners, Scanner},
		tracker::{ActionItemStore, ConfirmationTracker, TrackerError},
	},
	utils::metrics,
};

/// Phase of a running cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CyclePhase {
	Idle,
	FetchingHead,
	DetectingReorg,
	FetchingBlocks,
	Scanning,
	Committing,
}

/// Summary of a completed cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
	pub head: u64,
	/// First block committed by this cycle
	pub scanned_from: Option<u64>,
	/// Last block committed by this cycle
	pub scanned_to: Option<u64>,
	pub blocks_scanned: u64,
	pub matches_found: usize,
	pub fired: usize,
	pub delivered: usize,
	pub retrying: usize,
	pub exhausted: usize,
	pub reorg: Option<ReorgReport>,
}

impl CycleReport {
	fn record_block(&mut self, height: u64, matches: usize) {
		self.scanned_from.get_or_insert(height);
		self.scanned_to = Some(height);
		self.blocks_scanned += 1;
		self.matches_found += matches;
	}

	fn record_delivery(&mut self, outcome: DeliveryOutcome) {
		match outcome {
			DeliveryOutcome::Delivered => self.delivered += 1,
			DeliveryOutcome::Retrying => self.retrying += 1,
			DeliveryOutcome::Exhausted => self.exhausted += 1,
		}
	}
}

/// What happened to a scheduled invocation
#[derive(Debug)]
pub enum CycleOutcome {
	Completed(CycleReport),
	/// A previous cycle of the pair was still running
	Skipped,
	/// The pair is halted until resumed
	Halted,
}

/// Polls one (blockchain, network) pair.
///
/// All collaborators are supplied at construction; the pair never changes afterwards.
pub struct ChainPoller<S: ActionItemStore> {
	pair: ChainPair,
	network: Network,
	provider: Arc<dyn ChainDataProvider>,
	cursors: Arc<dyn CursorStore>,
	tracker: ConfirmationTracker<S>,
	dispatcher: WebhookDispatcher<S>,
	scanners: Vec<Box<dyn Scanner>>,
	subscriptions: Vec<Subscription>,
	cycle_lock: Mutex<()>,
	halted: AtomicBool,
}

impl<S: ActionItemStore> ChainPoller<S> {
	/// Creates a poller for `network`'s pair using the default scanners.
	///
	/// Subscriptions of other pairs are ignored. A provider serving another pair is a
	/// `ProviderMismatch` error.
	pub fn new(
		network: Network,
		provider: Arc<dyn ChainDataProvider>,
		cursors: Arc<dyn CursorStore>,
		tracker: ConfirmationTracker<S>,
		dispatcher: WebhookDispatcher<S>,
		subscriptions: Vec<Subscription>,
	) -> Result<Self, ListenerError> {
		let pair = network.pair();
		if !pair.matches(provider.chain_id(), provider.network_id()) {
			return Err(ListenerError::provider_mismatch(
				format!(
					"Provider serves {}/{} instead of {}",
					provider.chain_id(),
					provider.network_id(),
					pair
				),
				None,
				Some(HashMap::from([
					("blockchain_id".to_string(), pair.blockchain_id.clone()),
					("network_id".to_string(), pair.network_id.clone()),
				])),
			));
		}

		let subscriptions = subscriptions
			.into_iter()
			.filter(|s| s.pair() == pair)
			.collect();

		Ok(Self {
			pair,
			network,
			provider,
			cursors,
			tracker,
			dispatcher,
			scanners: default_scanners(),
			subscriptions,
			cycle_lock: Mutex::new(()),
			halted: AtomicBool::new(false),
		})
	}

	/// Replaces the scanner set
	pub fn with_scanners(mut self, scanners: Vec<Box<dyn Scanner>>) -> Self {
		self.scanners = scanners;
		self
	}

	pub fn pair(&self) -> &ChainPair {
		&self.pair
	}

	pub fn network(&self) -> &Network {
		&self.network
	}

	pub fn is_halted(&self) -> bool {
		self.halted.load(Ordering::SeqCst)
	}

	/// Clears the halted state so the next invocation runs a cycle again
	pub fn resume(&self) {
		if self.halted.swap(false, Ordering::SeqCst) {
			metrics::set_halted(&self.pair, false);
			info!("Resumed listener for {}", self.pair);
		}
	}

	fn halt(&self) {
		self.halted.store(true, Ordering::SeqCst);
		metrics::set_halted(&self.pair, true);
		warn!("Listener for {} halted until resumed", self.pair);
	}

	fn enter(&self, phase: CyclePhase) {
		debug!(pair = %self.pair, phase = ?phase, "Cycle phase");
	}

	fn metadata(&self) -> HashMap<String, String> {
		HashMap::from([
			("blockchain_id".to_string(), self.pair.blockchain_id.clone()),
			("network_id".to_string(), self.pair.network_id.clone()),
		])
	}

	fn tracker_failure(&self, msg: &str, error: TrackerError) -> ListenerError {
		ListenerError::storage_error(msg, Some(error.into()), Some(self.metadata()))
	}

	/// Scheduled entry point.
	///
	/// Runs at most one cycle of the pair at a time, bounded by the network's cycle timeout.
	/// Overlapping invocations are skipped and a halted pair does not run at all.
	pub async fn execute(&self) -> Result<CycleOutcome, ListenerError> {
		if self.is_halted() {
			debug!("Listener for {} is halted, skipping cycle", self.pair);
			return Ok(CycleOutcome::Halted);
		}

		let Ok(_guard) = self.cycle_lock.try_lock() else {
			debug!("Previous cycle of {} still running, skipping", self.pair);
			return Ok(CycleOutcome::Skipped);
		};

		let timeout = Duration::from_millis(self.network.cycle_timeout_ms);
		match tokio::time::timeout(timeout, self.run_cycle()).await {
			Ok(result) => result.map(CycleOutcome::Completed),
			Err(_) => {
				let mut metadata = self.metadata();
				metadata.insert(
					"cycle_timeout_ms".to_string(),
					self.network.cycle_timeout_ms.to_string(),
				);
				Err(ListenerError::cycle_timeout(
					format!("Cycle of {} did not finish in time", self.pair),
					None,
					Some(metadata),
				))
			}
		}
	}

	/// Runs one cycle without the single-cycle guard or timeout of [`Self::execute`]
	#[instrument(skip(self), fields(pair = %self.pair))]
	pub async fn run_cycle(&self) -> Result<CycleReport, ListenerError> {
		if self.is_halted() {
			return Err(ListenerError::halted(
				format!("Listener for {} is halted", self.pair),
				None,
				Some(self.metadata()),
			));
		}

		let start_time = Instant::now();

		self.enter(CyclePhase::FetchingHead);
		let head = self.provider.get_head_height().await.map_err(|e| {
			ListenerError::provider_unavailable(
				"Failed to get head height",
				Some(e.into()),
				Some(self.metadata()),
			)
		})?;

		let mut report = CycleReport {
			head,
			..Default::default()
		};

		let mut cursor = self.cursors.get(&self.pair).await?;
		if let Some(current) = cursor.take() {
			self.enter(CyclePhase::DetectingReorg);
			cursor = Some(self.reconcile(current, head, &mut report).await?);
		}

		self.scan_batch(cursor, head, &mut report).await?;

		let fired = self
			.tracker
			.evaluate_all(&self.pair, head)
			.await
			.map_err(|e| self.tracker_failure("Failed to evaluate action items", e))?;
		report.fired = fired.len();

		self.deliver_undelivered(&mut report).await?;
		self.prune(&report).await?;

		self.enter(CyclePhase::Idle);
		info!(
			head,
			blocks = report.blocks_scanned,
			matches = report.matches_found,
			fired = report.fired,
			delivered = report.delivered,
			"Cycle of {} completed in {}ms",
			self.pair,
			start_time.elapsed().as_millis()
		);

		Ok(report)
	}

	/// Rolls the cursor back to the fork point when the provider's chain diverged
	async fn reconcile(
		&self,
		current: ChainCursor,
		head: u64,
		report: &mut CycleReport,
	) -> Result<ChainCursor, ListenerError> {
		let comparison = match compare_with_chain(
			self.provider.as_ref(),
			&current,
			head,
			self.network.max_reorg_depth,
		)
		.await
		{
			Ok(comparison) => comparison,
			Err(e @ ListenerError::ReorgTooDeep(_)) => {
				self.halt();
				return Err(e);
			}
			Err(e) => return Err(e),
		};

		let (common_height, rolled_back) = match comparison {
			ChainComparison::Consistent | ChainComparison::HeadBehind => return Ok(current),
			ChainComparison::Diverged { common_height } => {
				let rolled_back = current.rolled_back_to(common_height).ok_or_else(|| {
					ListenerError::reorg_too_deep(
						format!("Cursor has no hash at fork point {}", common_height),
						None,
						Some(self.metadata()),
					)
				})?;
				(common_height, rolled_back)
			}
			ChainComparison::BeyondHistory { rollback_height } => {
				(rollback_height, self.restart_at(rollback_height).await?)
			}
		};

		// Pending items go first: a crash before the cursor moves re-detects the same reorg
		let discarded = self
			.tracker
			.discard_above(&self.pair, common_height)
			.await
			.map_err(|e| self.tracker_failure("Failed to discard reorganized action items", e))?;

		self.cursors
			.compare_and_set(&self.pair, Some(&current), rolled_back.clone())
			.await?;

		metrics::record_reorg(&self.pair, common_height);
		let reorg = ReorgReport {
			detected_at: current.last_height,
			common_height,
			discarded,
		};
		warn!(
			depth = reorg.depth(),
			discarded,
			"Reorg on {}: rolled back from {} to {}",
			self.pair,
			current.last_height,
			common_height
		);
		report.reorg = Some(reorg);

		Ok(rolled_back)
	}

	/// Cursor at the provider's block `height`, for a fork point below the retained history
	async fn restart_at(&self, height: u64) -> Result<ChainCursor, ListenerError> {
		let mut metadata = self.metadata();
		metadata.insert("height".to_string(), height.to_string());

		match self.provider.get_block(height).await {
			Ok(Some(block)) => {
				warn!(
					"Fork point on {} is below the retained history, restarting at {}",
					self.pair, height
				);
				Ok(ChainCursor::at_block(&self.pair, &block))
			}
			Ok(None) => Err(ListenerError::provider_unavailable(
				format!("Provider has no block at rollback height {}", height),
				None,
				Some(metadata),
			)),
			Err(e) => Err(ListenerError::provider_unavailable(
				format!("Failed to get block {}", height),
				Some(e.into()),
				Some(metadata),
			)),
		}
	}

	/// First and last height of this cycle's batch; empty when `from > to`
	fn batch_range(&self, cursor: Option<&ChainCursor>, head: u64) -> (u64, u64) {
		let batch = self.network.max_batch_size.max(1);
		match cursor {
			Some(cursor) => (
				cursor.last_height.saturating_add(1),
				cursor.last_height.saturating_add(batch).min(head),
			),
			None => {
				let start = self.network.start_height.unwrap_or(head);
				(start, start.saturating_add(batch - 1).min(head))
			}
		}
	}

	async fn scan_batch(
		&self,
		mut cursor: Option<ChainCursor>,
		head: u64,
		report: &mut CycleReport,
	) -> Result<(), ListenerError> {
		let (from, to) = self.batch_range(cursor.as_ref(), head);
		if from > to {
			debug!("No new blocks on {} (head {})", self.pair, head);
			return Ok(());
		}

		let history = usize::try_from(self.network.max_reorg_depth.saturating_add(1))
			.unwrap_or(usize::MAX);

		for height in from..=to {
			self.enter(CyclePhase::FetchingBlocks);
			let block = match self.provider.get_block(height).await {
				Ok(Some(block)) => block,
				Ok(None) => {
					debug!("Block {} of {} not available yet", height, self.pair);
					break;
				}
				Err(e) => {
					let mut metadata = self.metadata();
					metadata.insert("height".to_string(), height.to_string());
					return Err(ListenerError::provider_unavailable(
						format!("Failed to get block {}", height),
						Some(e.into()),
						Some(metadata),
					));
				}
			};

			if let Some(current) = &cursor {
				if !block.links_to(&current.last_hash) {
					info!(
						"Block {} of {} does not link to the cursor, deferring to the next cycle",
						height, self.pair
					);
					break;
				}
			}

			self.enter(CyclePhase::Scanning);
			let matches = self.scan_block(&block, head).await?;
			let match_count: usize = matches.iter().map(|(_, count)| count).sum();

			self.enter(CyclePhase::Committing);
			let next = match &cursor {
				Some(current) => current.advanced(&block, history),
				None => ChainCursor::at_block(&self.pair, &block),
			};
			self.cursors
				.compare_and_set(&self.pair, cursor.as_ref(), next.clone())
				.await?;
			metrics::record_block_scanned(&self.pair, height);
			for (kind, count) in matches {
				metrics::record_matches(&self.pair, kind, count);
			}
			report.record_block(height, match_count);
			cursor = Some(next);
		}

		Ok(())
	}

	/// Runs every scanner over `block` and tracks the candidates; returns the match count of
	/// each scanner kind
	async fn scan_block(
		&self,
		block: &Block,
		head: u64,
	) -> Result<Vec<(ActionItemKind, usize)>, ListenerError> {
		let mut matches = Vec::with_capacity(self.scanners.len());
		for scanner in &self.scanners {
			let candidates = scanner.scan(block, &self.subscriptions);
			matches.push((scanner.kind(), candidates.len()));

			for candidate in candidates {
				self.tracker
					.upsert(candidate, head)
					.await
					.map_err(|e| self.tracker_failure("Failed to store action item", e))?;
			}
		}
		Ok(matches)
	}

	async fn deliver_undelivered(&self, report: &mut CycleReport) -> Result<(), ListenerError> {
		let items = self
			.tracker
			.undelivered(&self.pair)
			.await
			.map_err(|e| self.tracker_failure("Failed to list undelivered action items", e))?;

		for item in items {
			match self.dispatcher.deliver(&item).await {
				Ok(outcome) => report.record_delivery(outcome),
				Err(e) => {
					warn!(key = %item.key(), "Delivery of action item failed: {}", e);
				}
			}
		}
		Ok(())
	}

	async fn prune(&self, report: &CycleReport) -> Result<(), ListenerError> {
		let Some(retention) = self.network.terminal_retention_blocks else {
			return Ok(());
		};
		let Some(cursor) = self.cursors.get(&self.pair).await? else {
			return Ok(());
		};

		let below = cursor.last_height.saturating_sub(retention);
		let pruned = self
			.tracker
			.prune_terminal_below(&self.pair, below)
			.await
			.map_err(|e| self.tracker_failure("Failed to prune action items", e))?;
		if pruned > 0 {
			debug!(head = report.head, "Pruned {} terminal action item(s) below {}", pruned, below);
		}
		Ok(())
	}
}
