//! Trait seam between the recovery/monitor logic and the watched service.
//!
//! The concrete HTTP implementation lives in `sealguard-vault`; keeping the
//! trait here lets the engine and the monitor cycle run against mocks.

use std::fmt;

/// Observed seal state of the watched service, derived fresh on every poll.
///
/// `Unreachable` is kept distinct from `Sealed` for log readability, but both
/// trigger a recovery attempt and both count as "sealed" in the emitted
/// metric. Quietly skipping recovery because the service did not answer would
/// hide exactly the outages this daemon exists for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SealState {
    Unsealed,
    Sealed,
    Unreachable,
}

impl SealState {
    /// Whether this state should trigger a recovery attempt.
    pub fn requires_recovery(self) -> bool {
        !matches!(self, SealState::Unsealed)
    }
}

impl fmt::Display for SealState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SealState::Unsealed => write!(f, "unsealed"),
            SealState::Sealed => write!(f, "sealed"),
            SealState::Unreachable => write!(f, "unreachable"),
        }
    }
}

/// Result of one accepted unseal submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The service reported `sealed = false`; recovery is complete.
    Unsealed,
    /// The share was accepted but more shares are needed.
    StillSealed,
}

/// A service whose seal state can be observed and repaired one share at a time.
pub trait SealTarget {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Query the service health endpoint and classify the answer.
    ///
    /// Transport failures are folded into the returned state instead of
    /// surfacing as errors; the poll loop provides the retry cadence.
    fn seal_status(&self) -> SealState;

    /// Submit one decrypted key share to the unseal endpoint.
    ///
    /// Every submission is a live state-changing call; callers must not retry
    /// the same share within one recovery attempt.
    fn submit_share(&self, key: &str) -> Result<SubmitOutcome, Self::Error>;
}
