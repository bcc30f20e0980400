//! Configuration model and helpers used by sealguard services.

use crate::error::{SealguardError, SealguardResult};
use log::warn;
use schemars::JsonSchema;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "/etc/sealguard.toml";

/// Connection settings for the watched secret-management service.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct VaultCfg {
    #[serde(default = "default_vault_addr")]
    pub addr: String,

    #[serde(default = "default_vault_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_vault_addr() -> String {
    "https://127.0.0.1:8200".to_string()
}

fn default_vault_timeout_secs() -> u64 {
    10
}

impl Default for VaultCfg {
    fn default() -> Self {
        Self {
            addr: default_vault_addr(),
            timeout_secs: default_vault_timeout_secs(),
        }
    }
}

/// Where encrypted key shares and the matching private key live, plus the
/// share threshold below which recovery is not attempted.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct UnsealCfg {
    #[serde(default = "default_share_dir")]
    pub share_dir: PathBuf,

    #[serde(default = "default_private_key_path")]
    pub private_key_path: PathBuf,

    #[serde(default = "default_min_shares")]
    pub min_shares: usize,
}

fn default_share_dir() -> PathBuf {
    PathBuf::from("/unseal")
}

fn default_private_key_path() -> PathBuf {
    PathBuf::from("/etc/certs/default.key")
}

fn default_min_shares() -> usize {
    3
}

impl Default for UnsealCfg {
    fn default() -> Self {
        Self {
            share_dir: default_share_dir(),
            private_key_path: default_private_key_path(),
            min_shares: default_min_shares(),
        }
    }
}

/// Collector endpoints and sample naming for seal-state reporting.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct MetricsCfg {
    #[serde(default)]
    pub endpoints: Vec<String>,

    #[serde(default = "default_hostname")]
    pub hostname: String,

    #[serde(default = "default_metric_prefix")]
    pub prefix: String,

    #[serde(default = "default_metrics_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_hostname() -> String {
    "localhost".to_string()
}

fn default_metric_prefix() -> String {
    "vault".to_string()
}

fn default_metrics_timeout_secs() -> u64 {
    5
}

impl Default for MetricsCfg {
    fn default() -> Self {
        Self {
            endpoints: Vec::new(),
            hostname: default_hostname(),
            prefix: default_metric_prefix(),
            timeout_secs: default_metrics_timeout_secs(),
        }
    }
}

/// Poll cadence for the monitor loop.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct MonitorCfg {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

fn default_interval_secs() -> u64 {
    60
}

impl Default for MonitorCfg {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
        }
    }
}

/// Top-level configuration snapshot loaded from disk.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct SealguardConfig {
    #[serde(default)]
    pub vault: VaultCfg,

    #[serde(default)]
    pub unseal: UnsealCfg,

    #[serde(default)]
    pub metrics: MetricsCfg,

    #[serde(default)]
    pub monitor: MonitorCfg,
}

impl SealguardConfig {
    /// Read a config file from disk (TOML, or YAML by extension) and validate
    /// basics.
    pub fn load<P: AsRef<Path>>(path: P) -> SealguardResult<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        let is_toml = matches!(
            path.extension().and_then(|ext| ext.to_str()),
            Some(ext) if ext.eq_ignore_ascii_case("toml")
        );
        let cfg = if is_toml {
            toml::from_str::<Self>(&contents)?
        } else {
            serde_yaml::from_str::<Self>(&contents)?
        };

        if cfg.unseal.min_shares == 0 {
            return Err(SealguardError::InvalidConfig(
                "unseal.min_shares must be at least 1".to_string(),
            ));
        }

        Ok(cfg)
    }

    /// Load configuration from disk, falling back to defaults when missing.
    ///
    /// The daemon is expected to run on pure defaults plus CLI overrides on
    /// hosts that never received a config file, so a missing file is a warning
    /// rather than an error.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> SealguardResult<Self> {
        let target = path.as_ref();
        if target.exists() {
            return Self::load(target);
        }

        warn!(
            "configuration missing at {}; running on built-in defaults",
            target.display()
        );
        Ok(Self::default())
    }

    /// Perform a best-effort validation pass and return human-readable issues.
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if !self.vault.addr.starts_with("http://") && !self.vault.addr.starts_with("https://") {
            issues.push(format!(
                "vault.addr must start with http:// or https:// (got {})",
                self.vault.addr
            ));
        }
        if self.vault.timeout_secs == 0 {
            issues.push("vault.timeout_secs must be greater than 0".to_string());
        }

        if self.unseal.min_shares == 0 {
            issues.push("unseal.min_shares must be at least 1".to_string());
        }

        if self.metrics.endpoints.is_empty() {
            issues.push(
                "metrics.endpoints is empty; seal-state samples will be dropped".to_string(),
            );
        }
        for endpoint in &self.metrics.endpoints {
            if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                issues.push(format!("metrics.endpoints entry is not a URL: {endpoint}"));
            }
        }
        if self.metrics.hostname.trim().is_empty() {
            issues.push("metrics.hostname must not be empty".to_string());
        }
        if self.metrics.timeout_secs == 0 {
            issues.push("metrics.timeout_secs must be greater than 0".to_string());
        }

        if self.monitor.interval_secs == 0 {
            issues.push("monitor.interval_secs must be greater than 0".to_string());
        }

        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn load_parses_toml() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sealguard.toml");
        let mut file = fs::File::create(&path).unwrap();
        writeln!(
            file,
            "[vault]\naddr = \"https://10.0.0.5:8200\"\n\n\
             [unseal]\nshare_dir = \"/var/lib/sealguard/shares\"\nmin_shares = 5\n\n\
             [metrics]\nendpoints = [\"http://collector-a\", \"http://collector-b\"]\nhostname = \"vault01\"\n"
        )
        .unwrap();

        let cfg = SealguardConfig::load(&path).unwrap();
        assert_eq!(cfg.vault.addr, "https://10.0.0.5:8200");
        assert_eq!(cfg.unseal.min_shares, 5);
        assert_eq!(
            cfg.unseal.share_dir,
            PathBuf::from("/var/lib/sealguard/shares")
        );
        assert_eq!(cfg.metrics.endpoints.len(), 2);
        assert_eq!(cfg.metrics.hostname, "vault01");
        // untouched sections keep their defaults
        assert_eq!(cfg.monitor.interval_secs, 60);
        assert_eq!(cfg.metrics.timeout_secs, 5);
    }

    #[test]
    fn load_rejects_zero_threshold() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sealguard.toml");
        fs::write(&path, "[unseal]\nmin_shares = 0\n").unwrap();

        match SealguardConfig::load(&path).unwrap_err() {
            SealguardError::InvalidConfig(msg) => assert!(msg.contains("min_shares")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn load_or_default_tolerates_missing_file() {
        let dir = tempdir().unwrap();
        let cfg = SealguardConfig::load_or_default(dir.path().join("absent.toml")).unwrap();
        assert_eq!(cfg.vault.addr, "https://127.0.0.1:8200");
        assert_eq!(cfg.unseal.min_shares, 3);
        assert_eq!(cfg.unseal.share_dir, PathBuf::from("/unseal"));
    }

    #[test]
    fn validate_reports_empty_endpoints_and_bad_urls() {
        let mut cfg = SealguardConfig::default();
        cfg.metrics.endpoints.clear();
        let issues = cfg.validate();
        assert!(issues.iter().any(|issue| issue.contains("endpoints")));

        cfg.metrics.endpoints = vec!["collector.example.net".to_string()];
        let issues = cfg.validate();
        assert!(issues.iter().any(|issue| issue.contains("not a URL")));
    }
}
