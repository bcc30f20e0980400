//! One poll cycle: observe seal state, recover when needed, report the gauge.

use crate::config::SealguardConfig;
use crate::error::SealguardResult;
use crate::metrics::{deliver_first, MetricSample, MetricSink};
use crate::recovery::{RecoveryEngine, RecoveryOutcome};
use crate::share::{load_private_key, load_share_dir};
use crate::target::{SealState, SealTarget};
use log::{info, warn};
use std::path::PathBuf;

/// What one cycle observed and did; the daemon logs this.
#[derive(Debug)]
pub struct CycleReport {
    pub state: SealState,
    pub recovery: Option<RecoveryOutcome>,
    pub metric_value: u8,
    pub delivered_to: Option<String>,
}

/// Ties health checking, recovery, and metric reporting together for the
/// daemon loop. Holds no state across cycles: key material and share blobs
/// are loaded fresh per recovery attempt, and every sample carries a fresh
/// timestamp.
pub struct Monitor<T, S> {
    target: T,
    sink: S,
    engine: RecoveryEngine,
    share_dir: PathBuf,
    private_key_path: PathBuf,
    endpoints: Vec<String>,
    hostname: String,
    prefix: String,
}

impl<T, S> Monitor<T, S>
where
    T: SealTarget,
    S: MetricSink,
{
    pub fn new(config: &SealguardConfig, target: T, sink: S) -> Self {
        Self {
            target,
            sink,
            engine: RecoveryEngine::new(config.unseal.min_shares),
            share_dir: config.unseal.share_dir.clone(),
            private_key_path: config.unseal.private_key_path.clone(),
            endpoints: config.metrics.endpoints.clone(),
            hostname: config.metrics.hostname.clone(),
            prefix: config.metrics.prefix.clone(),
        }
    }

    /// Run one poll cycle.
    ///
    /// Metric delivery failures are logged and absorbed here; only key or
    /// share I/O failures bubble up, and the daemon loop treats those as a
    /// skipped cycle rather than a reason to exit.
    pub fn run_cycle(&self) -> SealguardResult<CycleReport> {
        let state = self.target.seal_status();

        let recovery = if state.requires_recovery() {
            info!("service reported {state}; starting recovery attempt");
            // check the threshold before touching the key: a below-threshold
            // attempt must still produce a sealed sample even when the
            // private key itself is missing or unreadable
            let shares = load_share_dir(&self.share_dir)?;
            let outcome = match self.engine.shortfall(shares.len()) {
                Some(outcome) => outcome,
                None => {
                    let private_key = load_private_key(&self.private_key_path)?;
                    self.engine.run(&self.target, &private_key, &shares)
                }
            };
            Some(outcome)
        } else {
            None
        };

        let sealed = match &recovery {
            None => false,
            Some(outcome) => !outcome.succeeded(),
        };

        let sample = MetricSample::seal_gauge(&self.prefix, &self.hostname, sealed);
        let delivered_to = match deliver_first(&self.sink, &self.endpoints, &sample) {
            Ok(endpoint) => Some(endpoint),
            Err(err) => {
                warn!("{err}");
                None
            }
        };

        Ok(CycleReport {
            state,
            recovery,
            metric_value: sample.value,
            delivered_to,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SealguardError;
    use crate::target::SubmitOutcome;
    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine;
    use rsa::pkcs8::EncodePrivateKey;
    use rsa::{Pkcs1v15Encrypt, RsaPrivateKey};
    use std::collections::HashMap;
    use std::fs;
    use std::path::Path;
    use std::sync::Mutex;
    use tempfile::{tempdir, TempDir};

    #[derive(Clone, Copy)]
    enum Script {
        Unseals,
        StaysSealed,
    }

    struct MockTarget {
        status: SealState,
        scripts: HashMap<String, Script>,
        submitted: Mutex<Vec<String>>,
    }

    impl MockTarget {
        fn new(status: SealState, scripts: &[(&str, Script)]) -> Self {
            Self {
                status,
                scripts: scripts
                    .iter()
                    .map(|(key, script)| (key.to_string(), *script))
                    .collect(),
                submitted: Mutex::new(Vec::new()),
            }
        }

        fn submissions(&self) -> usize {
            self.submitted.lock().unwrap().len()
        }
    }

    impl SealTarget for MockTarget {
        type Error = SealguardError;

        fn seal_status(&self) -> SealState {
            self.status
        }

        fn submit_share(&self, key: &str) -> Result<SubmitOutcome, Self::Error> {
            self.submitted.lock().unwrap().push(key.to_string());
            match self.scripts.get(key) {
                Some(Script::Unseals) => Ok(SubmitOutcome::Unsealed),
                Some(Script::StaysSealed) => Ok(SubmitOutcome::StillSealed),
                None => Err(SealguardError::Submission("unknown share".to_string())),
            }
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        fail_all: bool,
        samples: Mutex<Vec<MetricSample>>,
    }

    impl RecordingSink {
        fn samples(&self) -> Vec<MetricSample> {
            self.samples.lock().unwrap().clone()
        }
    }

    impl MetricSink for &RecordingSink {
        type Error = SealguardError;

        fn deliver(&self, endpoint: &str, sample: &MetricSample) -> Result<(), Self::Error> {
            self.samples.lock().unwrap().push(sample.clone());
            if self.fail_all {
                Err(SealguardError::MetricDelivery(format!(
                    "{endpoint} unreachable"
                )))
            } else {
                Ok(())
            }
        }
    }

    struct Fixture {
        key: RsaPrivateKey,
        dir: TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            let mut rng = rand::thread_rng();
            let key = RsaPrivateKey::new(&mut rng, 1024).unwrap();
            let dir = tempdir().unwrap();
            let pem = key.to_pkcs8_pem(rsa::pkcs8::LineEnding::LF).unwrap();
            fs::write(dir.path().join("default.key"), pem.as_bytes()).unwrap();
            fs::create_dir(dir.path().join("unseal")).unwrap();
            Self { key, dir }
        }

        fn add_share(&self, name: &str, plaintext: &str) {
            let mut rng = rand::thread_rng();
            let ciphertext = self
                .key
                .to_public_key()
                .encrypt(&mut rng, Pkcs1v15Encrypt, plaintext.as_bytes())
                .unwrap();
            fs::write(
                self.dir.path().join("unseal").join(name),
                BASE64.encode(ciphertext),
            )
            .unwrap();
        }

        fn config(&self) -> SealguardConfig {
            let mut config = SealguardConfig::default();
            config.unseal.share_dir = self.dir.path().join("unseal");
            config.unseal.private_key_path = self.dir.path().join("default.key");
            config.metrics.endpoints = vec!["http://collector".to_string()];
            config.metrics.hostname = "vault01".to_string();
            config
        }
    }

    #[test]
    fn sealed_service_recovered_on_third_share_reports_healthy() {
        let fixture = Fixture::new();
        fixture.add_share("01-share", "frag-a");
        fixture.add_share("02-share", "frag-b");
        fixture.add_share("03-share", "frag-c");

        let target = MockTarget::new(
            SealState::Sealed,
            &[
                ("frag-a", Script::StaysSealed),
                ("frag-b", Script::StaysSealed),
                ("frag-c", Script::Unseals),
            ],
        );
        let sink = RecordingSink::default();
        let monitor = Monitor::new(&fixture.config(), target, &sink);

        let report = monitor.run_cycle().unwrap();
        assert!(matches!(
            report.recovery,
            Some(RecoveryOutcome::Unsealed { .. })
        ));
        assert_eq!(report.metric_value, 0);
        assert_eq!(sink.samples()[0].value, 0);
    }

    #[test]
    fn insufficient_shares_report_sealed_without_submissions() {
        let fixture = Fixture::new();
        fixture.add_share("01-share", "frag-a");
        fixture.add_share("02-share", "frag-b");

        let target = MockTarget::new(SealState::Sealed, &[("frag-a", Script::Unseals)]);
        let sink = RecordingSink::default();
        let monitor = Monitor::new(&fixture.config(), target, &sink);

        let report = monitor.run_cycle().unwrap();
        assert_eq!(
            report.recovery,
            Some(RecoveryOutcome::InsufficientShares {
                available: 2,
                required: 3,
            })
        );
        assert_eq!(report.metric_value, 1);
        assert_eq!(monitor.target.submissions(), 0);
        assert_eq!(sink.samples()[0].value, 1);
    }

    #[test]
    fn below_threshold_reports_sealed_even_without_a_private_key() {
        let fixture = Fixture::new();
        fixture.add_share("01-share", "frag-a");
        fixture.add_share("02-share", "frag-b");
        fs::remove_file(fixture.dir.path().join("default.key")).unwrap();

        let target = MockTarget::new(SealState::Sealed, &[]);
        let sink = RecordingSink::default();
        let monitor = Monitor::new(&fixture.config(), target, &sink);

        let report = monitor.run_cycle().unwrap();
        assert_eq!(
            report.recovery,
            Some(RecoveryOutcome::InsufficientShares {
                available: 2,
                required: 3,
            })
        );
        assert_eq!(report.metric_value, 1);
        assert_eq!(monitor.target.submissions(), 0);
        // the sealed sample still goes out; the key is only needed once the
        // threshold is met
        assert_eq!(sink.samples().len(), 1);
        assert_eq!(sink.samples()[0].value, 1);
    }

    #[test]
    fn healthy_cycles_are_idempotent() {
        let fixture = Fixture::new();
        // no shares staged: recovery would fail loudly if it were triggered

        let target = MockTarget::new(SealState::Unsealed, &[]);
        let sink = RecordingSink::default();
        let monitor = Monitor::new(&fixture.config(), target, &sink);

        let first = monitor.run_cycle().unwrap();
        let second = monitor.run_cycle().unwrap();
        assert!(first.recovery.is_none());
        assert!(second.recovery.is_none());
        assert_eq!(monitor.target.submissions(), 0);

        let samples = sink.samples();
        assert_eq!(samples.len(), 2);
        assert!(samples.iter().all(|sample| sample.value == 0));
    }

    #[test]
    fn unreachable_service_triggers_recovery() {
        let fixture = Fixture::new();
        fixture.add_share("01-share", "frag-a");
        fixture.add_share("02-share", "frag-b");
        fixture.add_share("03-share", "frag-c");

        let target = MockTarget::new(SealState::Unreachable, &[("frag-a", Script::Unseals)]);
        let sink = RecordingSink::default();
        let monitor = Monitor::new(&fixture.config(), target, &sink);

        let report = monitor.run_cycle().unwrap();
        assert!(report.recovery.as_ref().unwrap().succeeded());
        assert_eq!(report.metric_value, 0);
    }

    #[test]
    fn delivery_failure_never_escapes_the_cycle() {
        let fixture = Fixture::new();
        let target = MockTarget::new(SealState::Unsealed, &[]);
        let sink = RecordingSink {
            fail_all: true,
            ..RecordingSink::default()
        };
        let monitor = Monitor::new(&fixture.config(), target, &sink);

        let report = monitor.run_cycle().unwrap();
        assert!(report.delivered_to.is_none());
        assert_eq!(report.metric_value, 0);
    }

    #[test]
    fn missing_private_key_aborts_only_this_cycle() {
        let fixture = Fixture::new();
        fixture.add_share("01-share", "frag-a");
        fixture.add_share("02-share", "frag-b");
        fixture.add_share("03-share", "frag-c");
        fs::remove_file(fixture.dir.path().join("default.key")).unwrap();

        let target = MockTarget::new(SealState::Sealed, &[]);
        let sink = RecordingSink::default();
        let monitor = Monitor::new(&fixture.config(), target, &sink);

        assert!(monitor.run_cycle().is_err());
        // no metric was emitted for the aborted cycle
        assert!(sink.samples().is_empty());
        assert!(Path::new(&fixture.config().unseal.share_dir).exists());
    }
}
