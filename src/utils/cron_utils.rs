//! Helpers for the cron schedules that drive listener cycles

use chrono::Utc;
use cron::Schedule;
use std::str::FromStr;

/// Milliseconds between the next two occurrences of `cron_schedule`, or `None` when the
/// expression is invalid or does not fire twice.
pub fn get_cron_interval_ms(cron_schedule: &str) -> Option<i64> {
	let schedule = Schedule::from_str(cron_schedule).ok()?;
	let now = Utc::now();

	let mut occurrences = schedule.after(&now).take(2);
	match (occurrences.next(), occurrences.next()) {
		(Some(first), Some(second)) => Some((second - first).num_milliseconds()),
		_ => None,
	}
}

/// Checks that `cron_schedule` parses as a (seconds-resolution) cron expression
pub fn validate_cron_schedule(cron_schedule: &str) -> Result<(), String> {
	Schedule::from_str(cron_schedule)
		.map(|_| ())
		.map_err(|e| format!("Invalid cron schedule '{}': {}", cron_schedule, e))
}
