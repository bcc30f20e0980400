//! Core building blocks shared by sealguard binaries.
//!
//! Configuration, the recovery engine, and the monitor cycle live here so the
//! daemon can focus on process wiring instead of reimplementing orchestration.

pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod monitor;
pub mod recovery;
pub mod share;
pub mod target;

pub use config::{SealguardConfig, DEFAULT_CONFIG_PATH};
pub use error::{SealguardError, SealguardResult};
pub use metrics::{deliver_first, MetricSample, MetricSink};
pub use monitor::{CycleReport, Monitor};
pub use recovery::{RecoveryEngine, RecoveryOutcome};
pub use share::{load_private_key, load_share_dir, DecryptedShare, KeyShareBlob};
pub use target::{SealState, SealTarget, SubmitOutcome};
