//! Environment lookups with defaults.
//!
//! Empty values count as unset, and values that fail to parse fall back to the
//! default instead of aborting startup.

use std::str::FromStr;

use tracing::warn;

/// Read `key`, treating a missing or empty variable as absent.
pub fn var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Parse a raw value, logging and returning `default` when it does not parse.
pub fn parse_or<T: FromStr>(key: &str, raw: Option<String>, default: T) -> T {
    match raw {
        Some(v) => match v.trim().parse::<T>() {
            Ok(parsed) => parsed,
            Err(_) => {
                warn!(%key, value = %v, "ignoring unparseable environment value");
                default
            }
        },
        None => default,
    }
}

/// Parse a boolean flag accepting `1/0`, `true/false`, `yes/no`, `on/off`.
pub fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
