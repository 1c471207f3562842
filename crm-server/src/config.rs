//! Configuration module for environment variable parsing.
//!
//! Reads all configuration from environment variables, falling back to
//! defaults that reproduce the behaviour of the hosted CRM.

use std::env;
use std::str::FromStr;
use tracing::warn;

use crate::segment::CombinatorPolicy;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port for the web server to listen on
    pub port: u16,

    /// Shared session token checked by the session gate.
    /// When unset every request is let through.
    pub session_token: Option<String>,

    /// Signing key for HMAC verification of delivery receipts
    pub receipt_signing_key: Option<String>,

    /// Maximum age in seconds for signed receipt timestamps
    pub receipt_signature_max_age: u64,

    /// Real vendor endpoint; the simulated vendor is used when absent
    pub vendor_api_url: Option<String>,

    /// Simulated vendor latency per message, in milliseconds
    pub vendor_latency_ms: u64,

    /// Probability that the simulated vendor accepts a message (0.0 - 1.0)
    pub vendor_success_rate: f64,

    /// HTTP request timeout in milliseconds
    pub request_timeout_ms: u64,

    /// Maximum number of in-flight sends per campaign
    pub dispatch_concurrency: usize,

    /// Capacity of the dispatch job queue
    pub dispatch_queue_capacity: usize,

    /// Whether campaign creation waits for dispatch to finish
    pub await_dispatch: bool,

    /// How rule group combinators are interpreted
    pub combinator_policy: CombinatorPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            port: 8080,
            session_token: None,
            receipt_signing_key: None,
            receipt_signature_max_age: 300,
            vendor_api_url: None,
            vendor_latency_ms: 500,
            vendor_success_rate: 0.9,
            request_timeout_ms: 8000,
            dispatch_concurrency: 1,
            dispatch_queue_capacity: 64,
            await_dispatch: true,
            combinator_policy: CombinatorPolicy::Legacy,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let defaults = Config::default();

        Config {
            port: parse_or("PORT", defaults.port),

            session_token: non_empty("SESSION_TOKEN"),

            receipt_signing_key: non_empty("RECEIPT_SIGNING_KEY"),

            receipt_signature_max_age: parse_or(
                "RECEIPT_SIGNATURE_MAX_AGE",
                defaults.receipt_signature_max_age,
            ),

            vendor_api_url: non_empty("VENDOR_API_URL"),

            vendor_latency_ms: parse_or("VENDOR_LATENCY_MS", defaults.vendor_latency_ms),

            vendor_success_rate: parse_probability(
                "VENDOR_SUCCESS_RATE",
                defaults.vendor_success_rate,
            ),

            request_timeout_ms: parse_or("REQUEST_TIMEOUT_MS", defaults.request_timeout_ms),

            dispatch_concurrency: parse_or("DISPATCH_CONCURRENCY", defaults.dispatch_concurrency)
                .max(1),

            dispatch_queue_capacity: parse_or(
                "DISPATCH_QUEUE_CAPACITY",
                defaults.dispatch_queue_capacity,
            )
            .max(1),

            await_dispatch: parse_bool("AWAIT_DISPATCH", defaults.await_dispatch),

            combinator_policy: parse_or("SEGMENT_COMBINATOR_POLICY", defaults.combinator_policy),
        }
    }
}

/// Parse a variable with `FromStr`, warning and falling back on bad input.
fn parse_or<T: FromStr>(name: &str, default: T) -> T {
    let raw = match env::var(name) {
        Ok(v) => v,
        Err(_) => return default,
    };

    match raw.trim().parse() {
        Ok(value) => value,
        Err(_) => {
            warn!(env_var = name, value = %raw, "Invalid value, using default");
            default
        }
    }
}

/// Parse a probability, rejecting values outside 0.0 - 1.0.
fn parse_probability(name: &str, default: f64) -> f64 {
    let value = parse_or(name, default);
    if (0.0..=1.0).contains(&value) {
        value
    } else {
        warn!(env_var = name, value = value, "Probability out of range, using default");
        default
    }
}

/// Parse a boolean flag such as "true", "1", "no".
fn parse_bool(name: &str, default: bool) -> bool {
    let raw = match env::var(name) {
        Ok(v) => v,
        Err(_) => return default,
    };

    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => {
            warn!(env_var = name, value = %raw, "Invalid boolean, using default");
            default
        }
    }
}

fn non_empty(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_or_valid() {
        env::set_var("ZENO_TEST_PORT", "9090");
        assert_eq!(parse_or("ZENO_TEST_PORT", 1u16), 9090);
        env::remove_var("ZENO_TEST_PORT");
    }

    #[test]
    fn test_parse_or_invalid_falls_back() {
        env::set_var("ZENO_TEST_BAD_PORT", "not-a-port");
        assert_eq!(parse_or("ZENO_TEST_BAD_PORT", 8080u16), 8080);
        env::remove_var("ZENO_TEST_BAD_PORT");
    }

    #[test]
    fn test_parse_probability_out_of_range() {
        env::set_var("ZENO_TEST_RATE", "1.5");
        assert_eq!(parse_probability("ZENO_TEST_RATE", 0.9), 0.9);
        env::remove_var("ZENO_TEST_RATE");
    }

    #[test]
    fn test_parse_bool() {
        env::set_var("ZENO_TEST_FLAG", "No");
        assert!(!parse_bool("ZENO_TEST_FLAG", true));
        env::remove_var("ZENO_TEST_FLAG");
        assert!(parse_bool("ZENO_TEST_FLAG", true));
    }

    #[test]
    fn test_non_empty_ignores_blank() {
        env::set_var("ZENO_TEST_BLANK", "   ");
        assert_eq!(non_empty("ZENO_TEST_BLANK"), None);
        env::remove_var("ZENO_TEST_BLANK");
    }

    #[test]
    fn test_combinator_policy_from_env() {
        env::set_var("ZENO_TEST_POLICY", "honor");
        assert_eq!(
            parse_or("ZENO_TEST_POLICY", CombinatorPolicy::Legacy),
            CombinatorPolicy::Honor
        );
        env::remove_var("ZENO_TEST_POLICY");
    }
}
