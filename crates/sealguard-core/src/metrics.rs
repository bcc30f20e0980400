//! Seal-state metric samples and best-effort collector delivery.

use crate::error::{SealguardError, SealguardResult};
use log::{info, warn};
use std::time::{SystemTime, UNIX_EPOCH};

/// One Graphite plaintext observation, constructed fresh per poll cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricSample {
    pub hostname: String,
    pub path: String,
    pub value: u8,
    pub timestamp: u64,
}

impl MetricSample {
    /// Build the seal gauge for `hostname`, stamped with the current time.
    pub fn seal_gauge(prefix: &str, hostname: &str, sealed: bool) -> Self {
        Self {
            hostname: hostname.to_string(),
            path: format!("{prefix}.{hostname}.sealed"),
            value: u8::from(sealed),
            timestamp: unix_now(),
        }
    }

    /// Render the Graphite plaintext protocol line: `<path> <value> <seconds>`.
    pub fn render(&self) -> String {
        format!("{} {} {}", self.path, self.value, self.timestamp)
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or_default()
}

/// Delivers one sample to one collector endpoint.
///
/// The HTTP implementation lives in `sealguard-vault`; the trait keeps the
/// fallback combinator below testable without a network.
pub trait MetricSink {
    type Error: std::error::Error + Send + Sync + 'static;

    fn deliver(&self, endpoint: &str, sample: &MetricSample) -> Result<(), Self::Error>;
}

/// Try `endpoints` in order and stop at the first successful delivery.
///
/// Returns the endpoint that accepted the sample, or an aggregate
/// [`SealguardError::MetricDelivery`] once every endpoint has failed. The
/// sample is then dropped; there is no retry buffer, and delivery must never
/// stall the monitor loop beyond the per-endpoint timeout.
pub fn deliver_first<S: MetricSink>(
    sink: &S,
    endpoints: &[String],
    sample: &MetricSample,
) -> SealguardResult<String> {
    for endpoint in endpoints {
        match sink.deliver(endpoint, sample) {
            Ok(()) => {
                info!("delivered seal metric to {endpoint}");
                return Ok(endpoint.clone());
            }
            Err(err) => warn!("failed to deliver seal metric to {endpoint}: {err}"),
        }
    }

    Err(SealguardError::MetricDelivery(format!(
        "all {} collector endpoints failed; dropping sample {}",
        endpoints.len(),
        sample.render()
    )))
}
