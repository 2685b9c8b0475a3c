use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{AgentError, Result};
use crate::key::TargetKey;
use crate::program::XdpMode;

/// Agent configuration, loadable from CLI or YAML file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Network interface to attach the XDP program to.
    #[serde(default = "default_interface")]
    pub interface: String,

    /// IPv4 address whose packet count is reported.
    #[serde(default)]
    pub target: Option<String>,

    /// Milliseconds between counter reads.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// XDP attach mode.
    #[serde(default)]
    pub xdp_mode: XdpMode,

    /// Compiled eBPF object to load.
    #[serde(default = "default_program_path")]
    pub program_path: PathBuf,

    /// Quiet mode (suppress non-error logs).
    #[serde(default)]
    pub quiet: bool,
}

fn default_interface() -> String {
    "eth0".to_string()
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_program_path() -> PathBuf {
    PathBuf::from("pktwatch-ebpf/target/bpfel-unknown-none/release/pktwatch")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            interface: default_interface(),
            target: None,
            poll_interval_ms: default_poll_interval_ms(),
            xdp_mode: XdpMode::default(),
            program_path: default_program_path(),
            quiet: false,
        }
    }
}

impl Config {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Merge CLI args into config (CLI takes precedence).
    pub fn merge_cli(&mut self, cli: &CliArgs) {
        if let Some(interface) = &cli.interface {
            self.interface = interface.clone();
        }
        if cli.target.is_some() {
            self.target = cli.target.clone();
        }
        if let Some(ms) = cli.poll_interval_ms {
            self.poll_interval_ms = ms;
        }
        if let Some(mode) = cli.xdp_mode {
            self.xdp_mode = mode;
        }
        if let Some(path) = &cli.program {
            self.program_path = path.clone();
        }
        if cli.quiet {
            self.quiet = true;
        }
    }

    /// Check everything that can be checked without touching the kernel.
    /// Returns the encoded target on success.
    pub fn validate(&self) -> Result<TargetKey> {
        if self.interface.is_empty() {
            return Err(AgentError::Config("interface must not be empty".into()));
        }
        if self.poll_interval_ms == 0 {
            return Err(AgentError::Config(
                "poll_interval_ms must be greater than zero".into(),
            ));
        }
        let target = self
            .target
            .as_deref()
            .ok_or_else(|| AgentError::Config("no target address configured".into()))?;
        TargetKey::encode(target)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

use clap::Parser;

/// pktwatch: count packets from one IPv4 address with an XDP program
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
pub struct CliArgs {
    /// Network interface to attach the XDP program to [default: eth0].
    #[arg(short, long)]
    pub interface: Option<String>,

    /// IPv4 address to report packet counts for (e.g., 142.251.40.196).
    #[arg(short, long)]
    pub target: Option<String>,

    /// Milliseconds between counter reads [default: 1000].
    #[arg(long)]
    pub poll_interval_ms: Option<u64>,

    /// XDP attach mode [default: default].
    #[arg(long, value_enum)]
    pub xdp_mode: Option<XdpMode>,

    /// Path to the compiled eBPF object.
    #[arg(long)]
    pub program: Option<PathBuf>,

    /// Path to YAML config file.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Quiet mode (suppress non-error logs).
    #[arg(short = 'q', long)]
    pub quiet: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.interface, "eth0");
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
        assert_eq!(config.xdp_mode, XdpMode::Default);
        assert!(config.target.is_none());
        assert!(!config.quiet);
    }

    #[test]
    fn test_from_file_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "target: 10.1.2.3\nxdp_mode: skb").unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.target.as_deref(), Some("10.1.2.3"));
        assert_eq!(config.xdp_mode, XdpMode::Skb);
        assert_eq!(config.interface, "eth0");
        assert_eq!(config.poll_interval_ms, 1000);
    }

    #[test]
    fn test_from_file_rejects_unknown_keys() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "targte: 10.1.2.3").unwrap();
        assert!(Config::from_file(file.path()).is_err());
    }

    #[test]
    fn test_cli_overrides_file() {
        let mut config: Config =
            serde_yaml::from_str("interface: ens3\ntarget: 10.0.0.1\npoll_interval_ms: 500").unwrap();
        let cli = CliArgs::parse_from([
            "pktwatch",
            "--target",
            "10.0.0.2",
            "--xdp-mode",
            "driver",
            "-q",
        ]);

        config.merge_cli(&cli);

        assert_eq!(config.interface, "ens3");
        assert_eq!(config.target.as_deref(), Some("10.0.0.2"));
        assert_eq!(config.poll_interval_ms, 500);
        assert_eq!(config.xdp_mode, XdpMode::Driver);
        assert!(config.quiet);
    }

    #[test]
    fn test_validate_returns_key() {
        let config = Config {
            target: Some("1.2.3.4".into()),
            ..Config::default()
        };
        assert_eq!(config.validate().unwrap().value(), 0x0403_0201);
    }

    #[test]
    fn test_validate_failures() {
        let missing = Config::default();
        assert!(matches!(missing.validate(), Err(AgentError::Config(_))));

        let bad_target = Config {
            target: Some("1.2.3.256".into()),
            ..Config::default()
        };
        assert!(matches!(
            bad_target.validate(),
            Err(AgentError::InvalidAddress { .. })
        ));

        let zero_interval = Config {
            target: Some("1.2.3.4".into()),
            poll_interval_ms: 0,
            ..Config::default()
        };
        assert!(matches!(zero_interval.validate(), Err(AgentError::Config(_))));
    }
}
