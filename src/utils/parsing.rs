//! Parsing utilities
//!
//! Size strings for the CLI, hex quantities from JSON-RPC responses and normalization of
//! identifiers compared case-insensitively.

use byte_unit::Byte;
use std::str::FromStr;

/// Parses a string argument into a `u64` value representing a file size.
///
/// Accepts human-readable formats like "1GB", "500MB", "1024KB", etc.
pub fn parse_string_to_bytes_size(s: &str) -> Result<u64, String> {
	match Byte::from_str(s) {
		Ok(byte) => Ok(byte.as_u64()),
		Err(e) => Err(format!("Invalid size format: '{}'. Error: {}", s, e)),
	}
}

/// Normalizes a string by trimming whitespace and converting to lowercase.
pub fn normalize_string(input: &str) -> String {
	input.trim().to_lowercase()
}

/// Case-insensitive comparison of two hex identifiers (hashes, addresses, topics)
pub fn hex_eq(a: &str, b: &str) -> bool {
	a.trim().eq_ignore_ascii_case(b.trim())
}

/// Parses a `0x`-prefixed hex quantity such as `"0x1b4"`
pub fn parse_hex_quantity(value: &str) -> Result<u64, String> {
	let digits = value
		.strip_prefix("0x")
		.or_else(|| value.strip_prefix("0X"))
		.ok_or_else(|| format!("Hex quantity '{}' is missing the 0x prefix", value))?;
	if digits.is_empty() {
		return Err(format!("Hex quantity '{}' has no digits", value));
	}
	u64::from_str_radix(digits, 16).map_err(|e| format!("Invalid hex quantity '{}': {}", value, e))
}

/// Renders `value` as a `0x`-prefixed hex quantity
pub fn to_hex_quantity(value: u64) -> String {
	format!("{:#x}", value)
}
