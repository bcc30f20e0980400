//! Collector delivery over the Graphite queue endpoint.

use reqwest::blocking::Client;
use reqwest::StatusCode;
use sealguard_core::{MetricSample, MetricSink, SealguardError, SealguardResult};
use std::time::Duration;

/// POSTs rendered samples to `<endpoint>/queues/graphite-metrics`.
///
/// One short-timeout attempt per endpoint; the ordered-fallback behaviour
/// lives in [`sealguard_core::deliver_first`].
#[derive(Debug, Clone)]
pub struct GraphiteQueueSink {
    http: Client,
}

impl GraphiteQueueSink {
    pub fn new(timeout: Duration) -> SealguardResult<Self> {
        let http = Client::builder()
            .danger_accept_invalid_certs(true)
            .timeout(timeout)
            .build()
            .map_err(|err| SealguardError::Transport(err.to_string()))?;

        Ok(Self { http })
    }
}

impl MetricSink for GraphiteQueueSink {
    type Error = SealguardError;

    fn deliver(&self, endpoint: &str, sample: &MetricSample) -> Result<(), Self::Error> {
        let url = format!("{}/queues/graphite-metrics", endpoint.trim_end_matches('/'));
        // the queue expects the submission timestamp in milliseconds
        let timestamp_ms = sample.timestamp.saturating_mul(1000);

        let response = self
            .http
            .post(url)
            .query(&[
                ("hostname", sample.hostname.as_str()),
                ("timestamp", timestamp_ms.to_string().as_str()),
            ])
            .body(sample.render())
            .send()
            .map_err(|err| SealguardError::MetricDelivery(format!("{endpoint}: {err}")))?;

        if response.status() == StatusCode::OK {
            Ok(())
        } else {
            Err(SealguardError::MetricDelivery(format!(
                "{endpoint} answered {}",
                response.status()
            )))
        }
    }
}
