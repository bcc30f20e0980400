//! Blocking client for the Vault health and unseal endpoints.

use log::warn;
use reqwest::blocking::Client;
use reqwest::StatusCode;
use sealguard_core::{
    SealState, SealTarget, SealguardConfig, SealguardError, SealguardResult, SubmitOutcome,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Serialize)]
struct UnsealRequest<'a> {
    key: &'a str,
}

#[derive(Deserialize)]
struct UnsealResponse {
    sealed: bool,
}

/// Map a health-endpoint status code onto a seal state.
///
/// Vault answers `sys/health` with 200 for an active unsealed node (standby
/// nodes included via `standbyok`) and a non-2xx code, typically 503, while
/// sealed. Any erroring status is read conservatively as sealed so recovery
/// runs rather than being skipped.
pub fn classify_health(status: StatusCode) -> SealState {
    if status.is_success() {
        SealState::Unsealed
    } else {
        SealState::Sealed
    }
}

/// Blocking Vault API client used by the monitor cycle.
#[derive(Debug, Clone)]
pub struct VaultClient {
    http: Client,
    base_url: String,
}

impl VaultClient {
    /// Build a client for `base_url` with an explicit request timeout.
    ///
    /// Certificate verification is disabled: the service is reached over
    /// loopback or a trusted network, and deployments routinely run it with a
    /// self-signed listener certificate. This is a compatibility trade-off,
    /// not a recommendation.
    pub fn new(base_url: &str, timeout: Duration) -> SealguardResult<Self> {
        let http = Client::builder()
            .danger_accept_invalid_certs(true)
            .timeout(timeout)
            .build()
            .map_err(|err| SealguardError::Transport(err.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &SealguardConfig) -> SealguardResult<Self> {
        Self::new(
            &config.vault.addr,
            Duration::from_secs(config.vault.timeout_secs),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl SealTarget for VaultClient {
    type Error = SealguardError;

    fn seal_status(&self) -> SealState {
        let url = format!("{}/v1/sys/health", self.base_url);
        match self
            .http
            .get(url)
            .query(&[("standbyok", "true")])
            .send()
        {
            Ok(response) => classify_health(response.status()),
            Err(err) => {
                warn!("health check transport failure: {err}");
                SealState::Unreachable
            }
        }
    }

    fn submit_share(&self, key: &str) -> Result<SubmitOutcome, Self::Error> {
        let url = format!("{}/v1/sys/unseal", self.base_url);
        let response = self
            .http
            .put(url)
            .json(&UnsealRequest { key })
            .send()
            .map_err(|err| SealguardError::Submission(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SealguardError::Submission(format!(
                "unexpected http status {status}"
            )));
        }

        let body: UnsealResponse = response
            .json()
            .map_err(|err| SealguardError::Submission(format!("malformed response: {err}")))?;

        if body.sealed {
            Ok(SubmitOutcome::StillSealed)
        } else {
            Ok(SubmitOutcome::Unsealed)
        }
    }
}
