use crate::properties::strategies::delivery_policy_strategy;

use blockchain_listener::services::notification::backoff_delay;
use proptest::{prelude::*, test_runner::Config};
use std::time::Duration;

proptest! {
	#![proptest_config(Config {
		failure_persistence: None,
		..Config::default()
	})]

	#[test]
	fn test_backoff_is_monotonic_and_capped(policy in delivery_policy_strategy()) {
		let delays: Vec<Duration> = (1..=policy.max_attempts)
			.map(|attempts| backoff_delay(&policy, attempts))
			.collect();

		prop_assert_eq!(delays[0], policy.initial_backoff().min(policy.max_backoff()));
		for window in delays.windows(2) {
			prop_assert!(window[0] <= window[1]);
		}
		for delay in &delays {
			prop_assert!(*delay <= policy.max_backoff());
		}
	}

	#[test]
	fn test_backoff_doubles_until_capped(
		policy in delivery_policy_strategy(),
		attempts in 1u32..8,
	) {
		let expected = policy
			.initial_backoff()
			.saturating_mul(1 << (attempts - 1))
			.min(policy.max_backoff());
		let delay = backoff_delay(&policy, attempts);
		// Growth is computed in floating point
		let difference = delay.max(expected) - delay.min(expected);
		prop_assert!(difference <= Duration::from_millis(1), "{:?} vs {:?}", delay, expected);
	}
}
