//! Delivery channels - the vendor side of a campaign send.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::Config;

/// Outcome reported by a vendor for one message.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryOutcome {
    pub success: bool,
    /// Correlation key for later receipts; issued only on success
    pub vendor_message_id: Option<String>,
    pub detail: String,
}

impl DeliveryOutcome {
    pub fn sent(vendor_message_id: impl Into<String>) -> Self {
        Self {
            success: true,
            vendor_message_id: Some(vendor_message_id.into()),
            detail: "Message sent successfully".to_string(),
        }
    }

    pub fn failed(detail: impl Into<String>) -> Self {
        Self {
            success: false,
            vendor_message_id: None,
            detail: detail.into(),
        }
    }
}

/// Capability to hand one rendered message to a vendor.
///
/// Sends never error: transport problems are reported as failed outcomes
/// and no send is retried.
#[async_trait]
pub trait DeliveryChannel: Send + Sync {
    async fn send(&self, customer_id: Uuid, message: &str) -> DeliveryOutcome;
}

/// Build the channel selected by configuration.
pub fn from_config(config: &Config) -> anyhow::Result<Arc<dyn DeliveryChannel>> {
    match &config.vendor_api_url {
        Some(url) => Ok(Arc::new(HttpVendor::new(
            url.clone(),
            Duration::from_millis(config.request_timeout_ms),
        )?)),
        None => Ok(Arc::new(SimulatedVendor::new(
            Duration::from_millis(config.vendor_latency_ms),
            config.vendor_success_rate,
        ))),
    }
}

// =============================================================================
// Simulated vendor
// =============================================================================

/// Vendor stand-in with fixed latency and a random accept/reject roll.
#[derive(Debug, Clone)]
pub struct SimulatedVendor {
    latency: Duration,
    success_rate: f64,
}

impl SimulatedVendor {
    pub fn new(latency: Duration, success_rate: f64) -> Self {
        Self {
            latency,
            success_rate: success_rate.clamp(0.0, 1.0),
        }
    }
}

#[async_trait]
impl DeliveryChannel for SimulatedVendor {
    async fn send(&self, customer_id: Uuid, message: &str) -> DeliveryOutcome {
        // ThreadRng is not Send, roll before awaiting
        let roll: f64 = rand::thread_rng().gen();

        sleep(self.latency).await;

        let accepted = roll < self.success_rate;

        info!(
            customer_id = %customer_id,
            message_length = message.len(),
            roll = roll,
            threshold = self.success_rate,
            accepted = accepted,
            "vendor_simulated_send"
        );

        if accepted {
            DeliveryOutcome::sent(format!(
                "msg_{}_{}",
                Utc::now().timestamp_millis(),
                customer_id
            ))
        } else {
            DeliveryOutcome::failed("Failed to send message")
        }
    }
}

// =============================================================================
// HTTP vendor
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VendorRequest<'a> {
    customer_id: Uuid,
    message: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VendorResponse {
    vendor_message_id: Option<String>,
}

/// Vendor reached over HTTP.
///
/// A 2xx response carrying a `vendorMessageId` counts as sent; any other
/// response, timeout or transport error counts as failed.
#[derive(Debug, Clone)]
pub struct HttpVendor {
    client: Client,
    url: String,
    timeout: Duration,
}

impl HttpVendor {
    pub fn new(url: String, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder().pool_max_idle_per_host(16).build()?;
        Ok(Self {
            client,
            url,
            timeout,
        })
    }
}

#[async_trait]
impl DeliveryChannel for HttpVendor {
    async fn send(&self, customer_id: Uuid, message: &str) -> DeliveryOutcome {
        let request = self
            .client
            .post(&self.url)
            .timeout(self.timeout)
            .json(&VendorRequest {
                customer_id,
                message,
            });

        let response = match request.send().await {
            Ok(resp) => resp,
            Err(e) => {
                if e.is_timeout() {
                    error!(
                        customer_id = %customer_id,
                        timeout_seconds = self.timeout.as_secs_f64(),
                        error = %e,
                        "vendor_send_timeout"
                    );
                } else {
                    error!(customer_id = %customer_id, error = %e, "vendor_send_error");
                }
                return DeliveryOutcome::failed(e.to_string());
            }
        };

        let status = response.status();
        if !status.is_success() {
            warn!(
                customer_id = %customer_id,
                status_code = status.as_u16(),
                "vendor_send_rejected"
            );
            return DeliveryOutcome::failed(format!("vendor responded {}", status.as_u16()));
        }

        match response.json::<VendorResponse>().await {
            Ok(VendorResponse {
                vendor_message_id: Some(id),
            }) if !id.is_empty() => {
                info!(customer_id = %customer_id, vendor_message_id = %id, "vendor_send_accepted");
                DeliveryOutcome::sent(id)
            }
            Ok(_) => {
                warn!(customer_id = %customer_id, "vendor_response_missing_id");
                DeliveryOutcome::failed("vendor response missing vendorMessageId")
            }
            Err(e) => {
                warn!(customer_id = %customer_id, error = %e, "vendor_response_unreadable");
                DeliveryOutcome::failed(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_simulated_vendor_always_accepts() {
        let vendor = SimulatedVendor::new(Duration::ZERO, 1.0);
        let customer_id = Uuid::new_v4();

        let outcome = vendor.send(customer_id, "Hi A!").await;
        assert!(outcome.success);

        let id = outcome.vendor_message_id.unwrap();
        assert!(id.starts_with("msg_"));
        assert!(id.ends_with(&customer_id.to_string()));
    }

    #[tokio::test]
    async fn test_simulated_vendor_always_rejects() {
        let vendor = SimulatedVendor::new(Duration::ZERO, 0.0);

        let outcome = vendor.send(Uuid::new_v4(), "Hi B!").await;
        assert!(!outcome.success);
        assert_eq!(outcome.vendor_message_id, None);
        assert_eq!(outcome.detail, "Failed to send message");
    }

    #[tokio::test]
    async fn test_http_vendor_unreachable_is_failure() {
        let vendor = HttpVendor::new(
            "http://127.0.0.1:9/send".to_string(),
            Duration::from_millis(200),
        )
        .unwrap();

        let outcome = vendor.send(Uuid::new_v4(), "Hi C!").await;
        assert!(!outcome.success);
        assert!(outcome.vendor_message_id.is_none());
    }

    #[test]
    fn test_from_config_defaults_to_simulated() {
        let config = Config::default();
        assert!(from_config(&config).is_ok());
    }
}
