//! Metrics module for the application.
//!
//! - This module contains the global Prometheus registry.
//! - Defines specific metrics for the application.

pub mod server;
use lazy_static::lazy_static;
use prometheus::{
	Encoder, Gauge, GaugeVec, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::collections::{HashMap, HashSet};
use sysinfo::{Disks, System};

use crate::models::{ActionItemKind, ChainPair, Network, Subscription};

/// Label names shared by every per-pair metric
const PAIR_LABELS: [&str; 2] = ["blockchain_id", "network_id"];

fn pair_counter(name: &str, help: &str) -> IntCounterVec {
	let counter = IntCounterVec::new(Opts::new(name, help), &PAIR_LABELS).unwrap();
	REGISTRY.register(Box::new(counter.clone())).unwrap();
	counter
}

fn pair_gauge(name: &str, help: &str) -> GaugeVec {
	let gauge = GaugeVec::new(Opts::new(name, help), &PAIR_LABELS).unwrap();
	REGISTRY.register(Box::new(gauge.clone())).unwrap();
	gauge
}

lazy_static! {
	/// Global Prometheus registry.
	///
	/// This registry holds all metrics defined in this module and is used
	/// to gather metrics for exposure via the metrics endpoint.
	pub static ref REGISTRY: Registry = Registry::new();

	/// Gauge for CPU usage percentage.
	///
	/// Tracks the current CPU usage as a percentage (0-100) across all cores.
	pub static ref CPU_USAGE: Gauge = {
	  let gauge = Gauge::new("cpu_usage_percentage", "Current CPU usage percentage").unwrap();
	  REGISTRY.register(Box::new(gauge.clone())).unwrap();
	  gauge
	};

	/// Gauge for memory usage percentage.
	pub static ref MEMORY_USAGE_PERCENT: Gauge = {
	  let gauge = Gauge::new("memory_usage_percentage", "Memory usage percentage").unwrap();
	  REGISTRY.register(Box::new(gauge.clone())).unwrap();
	  gauge
	};

	/// Gauge for memory usage in bytes.
	pub static ref MEMORY_USAGE: Gauge = {
		let gauge = Gauge::new("memory_usage_bytes", "Memory usage in bytes").unwrap();
		REGISTRY.register(Box::new(gauge.clone())).unwrap();
		gauge
	};

	/// Gauge for total memory in bytes.
	pub static ref TOTAL_MEMORY: Gauge = {
	  let gauge = Gauge::new("total_memory_bytes", "Total memory in bytes").unwrap();
	  REGISTRY.register(Box::new(gauge.clone())).unwrap();
	  gauge
	};

	/// Gauge for available memory in bytes.
	pub static ref AVAILABLE_MEMORY: Gauge = {
		let gauge = Gauge::new("available_memory_bytes", "Available memory in bytes").unwrap();
		REGISTRY.register(Box::new(gauge.clone())).unwrap();
		gauge
	};

	/// Gauge for used disk space in bytes, summed across all mounted filesystems.
	pub static ref DISK_USAGE: Gauge = {
	  let gauge = Gauge::new("disk_usage_bytes", "Used disk space in bytes").unwrap();
	  REGISTRY.register(Box::new(gauge.clone())).unwrap();
	  gauge
	};

	/// Gauge for disk usage percentage.
	pub static ref DISK_USAGE_PERCENT: Gauge = {
	  let gauge = Gauge::new("disk_usage_percentage", "Disk usage percentage").unwrap();
	  REGISTRY.register(Box::new(gauge.clone())).unwrap();
	  gauge
	};

	/// Gauge for total number of subscriptions (active and paused).
	pub static ref SUBSCRIPTIONS_TOTAL: Gauge = {
		let gauge = Gauge::new("subscriptions_total", "Total number of configured subscriptions").unwrap();
		REGISTRY.register(Box::new(gauge.clone())).unwrap();
		gauge
	};

	/// Gauge for number of active subscriptions (not paused).
	pub static ref SUBSCRIPTIONS_ACTIVE: Gauge = {
		let gauge = Gauge::new("subscriptions_active", "Number of active subscriptions").unwrap();
		REGISTRY.register(Box::new(gauge.clone())).unwrap();
		gauge
	};

	/// Gauge for total number of networks being listened on.
	///
	/// Tracks the count of configured pairs that have at least one active subscription.
	pub static ref NETWORKS_LISTENED: Gauge = {
		let gauge = Gauge::new("networks_listened", "Total number of networks being listened to").unwrap();
		REGISTRY.register(Box::new(gauge.clone())).unwrap();
		gauge
	};

	/// Active subscriptions per pair.
	pub static ref NETWORK_SUBSCRIPTIONS: GaugeVec =
		pair_gauge("network_subscriptions", "Number of active subscriptions per network");

	/// Transaction matches, incremented per block by match count.
	pub static ref TRANSACTIONS_FOUND: IntCounterVec =
		pair_counter("transactions_found_total", "Transaction matches found");

	/// Contract event matches, incremented per block by match count.
	pub static ref CONTRACTS_FOUND: IntCounterVec =
		pair_counter("contracts_found_total", "Contract event matches found");

	/// Address matches, incremented per block by match count.
	pub static ref ADDRESS_FOUND: IntCounterVec =
		pair_counter("address_found_total", "Address matches found");

	pub static ref BLOCKS_SCANNED: IntCounterVec =
		pair_counter("blocks_scanned_total", "Blocks scanned and committed");

	pub static ref REORGS_DETECTED: IntCounterVec =
		pair_counter("reorgs_detected_total", "Chain reorganizations detected");

	/// Webhook delivery attempts by outcome (`delivered`, `retrying`, `exhausted`).
	pub static ref WEBHOOK_DELIVERIES: IntCounterVec = {
		let counter = IntCounterVec::new(
			Opts::new("webhook_deliveries_total", "Webhook deliveries by outcome"),
			&["blockchain_id", "network_id", "outcome"],
		)
		.unwrap();
		REGISTRY.register(Box::new(counter.clone())).unwrap();
		counter
	};

	/// Height of the last committed block per pair.
	pub static ref CURSOR_HEIGHT: GaugeVec =
		pair_gauge("cursor_height", "Height of the last committed block");

	/// 1 while a pair is halted after a reorg deeper than allowed.
	pub static ref LISTENER_HALTED: GaugeVec =
		pair_gauge("listener_halted", "Whether the listener of a network is halted");
}

/// Gather all metrics and encode into the provided format.
pub fn gather_metrics() -> Result<Vec<u8>, Box<dyn std::error::Error>> {
	let encoder = TextEncoder::new();
	let metric_families = REGISTRY.gather();
	let mut buffer = Vec::new();
	encoder.encode(&metric_families, &mut buffer)?;
	Ok(buffer)
}

/// Updates the system metrics for CPU and memory usage.
pub fn update_system_metrics() {
	let mut sys = System::new_all();
	sys.refresh_all();

	CPU_USAGE.set(sys.global_cpu_usage() as f64);

	let total_memory = sys.total_memory();
	TOTAL_MEMORY.set(total_memory as f64);
	AVAILABLE_MEMORY.set(sys.available_memory() as f64);

	let memory_usage = sys.used_memory();
	MEMORY_USAGE.set(memory_usage as f64);

	let memory_percentage = if total_memory > 0 {
		(memory_usage as f64 / total_memory as f64) * 100.0
	} else {
		0.0
	};
	MEMORY_USAGE_PERCENT.set(memory_percentage);

	let disks = Disks::new_with_refreshed_list();
	let mut total_disk_space: u64 = 0;
	let mut total_disk_available: u64 = 0;
	for disk in disks.list() {
		total_disk_space += disk.total_space();
		total_disk_available += disk.available_space();
	}
	let used_disk_space = total_disk_space.saturating_sub(total_disk_available);
	DISK_USAGE.set(used_disk_space as f64);

	let disk_percentage = if total_disk_space > 0 {
		(used_disk_space as f64 / total_disk_space as f64) * 100.0
	} else {
		0.0
	};
	DISK_USAGE_PERCENT.set(disk_percentage);
}

/// Updates metrics related to subscriptions and networks.
///
/// Subscriptions referring to a pair without network configuration are counted in the
/// totals but not per network.
pub fn update_listener_metrics(
	subscriptions: &HashMap<String, Subscription>,
	networks: &HashMap<String, Network>,
) {
	SUBSCRIPTIONS_TOTAL.set(subscriptions.len() as f64);
	SUBSCRIPTIONS_ACTIVE.set(subscriptions.values().filter(|s| !s.paused).count() as f64);

	let configured: HashSet<ChainPair> = networks.values().map(Network::pair).collect();
	let mut per_pair = HashMap::<ChainPair, usize>::new();
	for subscription in subscriptions.values().filter(|s| !s.paused) {
		let pair = subscription.pair();
		if configured.contains(&pair) {
			*per_pair.entry(pair).or_insert(0) += 1;
		}
	}
	NETWORKS_LISTENED.set(per_pair.len() as f64);

	NETWORK_SUBSCRIPTIONS.reset();
	for (pair, count) in per_pair {
		NETWORK_SUBSCRIPTIONS
			.with_label_values(&pair.labels())
			.set(count as f64);
	}
}

/// Adds `count` matches of `kind` found in one block of `pair`
pub fn record_matches(pair: &ChainPair, kind: ActionItemKind, count: usize) {
	let counter = match kind {
		ActionItemKind::Transaction => &*TRANSACTIONS_FOUND,
		ActionItemKind::Address => &*ADDRESS_FOUND,
		ActionItemKind::ContractEvent => &*CONTRACTS_FOUND,
	};
	counter
		.with_label_values(&pair.labels())
		.inc_by(count as u64);
}

/// Records a committed block of `pair`
pub fn record_block_scanned(pair: &ChainPair, height: u64) {
	BLOCKS_SCANNED.with_label_values(&pair.labels()).inc();
	CURSOR_HEIGHT
		.with_label_values(&pair.labels())
		.set(height as f64);
}

/// Records a detected reorg and the height the cursor was rolled back to
pub fn record_reorg(pair: &ChainPair, common_height: u64) {
	REORGS_DETECTED.with_label_values(&pair.labels()).inc();
	CURSOR_HEIGHT
		.with_label_values(&pair.labels())
		.set(common_height as f64);
}

pub fn record_delivery(pair: &ChainPair, outcome: &str) {
	WEBHOOK_DELIVERIES
		.with_label_values(&[pair.blockchain_id.as_str(), pair.network_id.as_str(), outcome])
		.inc();
}

pub fn set_halted(pair: &ChainPair, halted: bool) {
	LISTENER_HALTED
		.with_label_values(&pair.labels())
		.set(if halted { 1.0 } else { 0.0 });
}
