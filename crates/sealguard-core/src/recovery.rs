//! Recovery engine: turn stored key shares into an unsealed service.

use crate::share::KeyShareBlob;
use crate::target::{SealTarget, SubmitOutcome};
use log::{info, warn};
use rsa::RsaPrivateKey;

/// Terminal result of one recovery attempt, consumed by the monitor cycle to
/// decide the metric value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryOutcome {
    /// The service reported `sealed = false` after submitting `share`.
    Unsealed { share: String, submitted: usize },
    /// Fewer shares than the threshold were available; nothing was decrypted
    /// or submitted.
    InsufficientShares { available: usize, required: usize },
    /// Every available share was tried without unsealing the service.
    AllSharesFailed { attempted: usize },
}

impl RecoveryOutcome {
    pub fn succeeded(&self) -> bool {
        matches!(self, RecoveryOutcome::Unsealed { .. })
    }
}

/// Orchestrates decryption and submission across the available key shares.
#[derive(Debug, Clone)]
pub struct RecoveryEngine {
    min_shares: usize,
}

impl RecoveryEngine {
    pub fn new(min_shares: usize) -> Self {
        Self { min_shares }
    }

    /// Report the threshold shortfall for `available` shares, if any.
    ///
    /// Callers can short-circuit on this before loading key material: with a
    /// threshold secret-sharing scheme, fewer shares can never reconstruct
    /// access, so nothing else is worth touching.
    pub fn shortfall(&self, available: usize) -> Option<RecoveryOutcome> {
        if available >= self.min_shares {
            return None;
        }
        warn!(
            "not enough key shares to run recovery ({available} available, {} required)",
            self.min_shares
        );
        Some(RecoveryOutcome::InsufficientShares {
            available,
            required: self.min_shares,
        })
    }

    /// Run one recovery attempt over `shares` in enumeration order.
    ///
    /// Below the share threshold no decryption or network activity happens at
    /// all. Each share is submitted at most once; a failed share is retried
    /// only on the next poll cycle via fresh enumeration.
    pub fn run<T: SealTarget>(
        &self,
        target: &T,
        private_key: &RsaPrivateKey,
        shares: &[KeyShareBlob],
    ) -> RecoveryOutcome {
        if let Some(outcome) = self.shortfall(shares.len()) {
            return outcome;
        }

        let mut submitted = 0;
        for share in shares {
            let plaintext = match share.decrypt(private_key) {
                Ok(plaintext) => plaintext,
                Err(err) => {
                    warn!("{err}");
                    continue;
                }
            };

            submitted += 1;
            match target.submit_share(&plaintext) {
                Ok(SubmitOutcome::Unsealed) => {
                    info!("service unsealed after submitting share {}", share.name());
                    return RecoveryOutcome::Unsealed {
                        share: share.name().to_string(),
                        submitted,
                    };
                }
                Ok(SubmitOutcome::StillSealed) => {
                    info!("share {} accepted, service still sealed", share.name());
                }
                Err(err) => {
                    warn!("submission of share {} failed: {err}", share.name());
                }
            }
        }

        warn!(
            "recovery exhausted all {} shares without unsealing",
            shares.len()
        );
        RecoveryOutcome::AllSharesFailed {
            attempted: shares.len(),
        }
    }
}
