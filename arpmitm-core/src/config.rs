//! Engine configuration

use crate::{Error, Result};
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::time::Duration;

/// Delay between two poison rounds
pub const DEFAULT_POISON_INTERVAL: Duration = Duration::from_secs(2);

/// How long to wait for an ARP reply
pub const DEFAULT_RESOLVE_TIMEOUT: Duration = Duration::from_secs(3);

/// Corrective replies sent to each side on shutdown
pub const DEFAULT_RESTORE_COUNT: usize = 4;

/// Pause between corrective rounds
pub const DEFAULT_RESTORE_INTERVAL: Duration = Duration::from_millis(200);

/// Linux IPv4 forwarding switch
pub const DEFAULT_FORWARD_PATH: &str = "/proc/sys/net/ipv4/ip_forward";

/// Everything the engine needs to poison one target/gateway pair
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Interface to send and sniff on
    pub interface: String,
    /// Victim host
    pub target: Ipv4Addr,
    /// Router the victim talks through
    pub gateway: Ipv4Addr,
    pub poison_interval: Duration,
    pub resolve_timeout: Duration,
    pub restore_count: usize,
    pub restore_interval: Duration,
    /// File toggled to enable/disable IP forwarding
    pub forward_path: PathBuf,
    /// Optional BPF filter for the sniffer
    pub capture_filter: Option<String>,
    /// Run the HTTP sniffer alongside the poisoner
    pub capture_http: bool,
}

impl EngineConfig {
    pub fn new(interface: impl Into<String>, target: Ipv4Addr, gateway: Ipv4Addr) -> Self {
        Self {
            interface: interface.into(),
            target,
            gateway,
            poison_interval: DEFAULT_POISON_INTERVAL,
            resolve_timeout: DEFAULT_RESOLVE_TIMEOUT,
            restore_count: DEFAULT_RESTORE_COUNT,
            restore_interval: DEFAULT_RESTORE_INTERVAL,
            forward_path: PathBuf::from(DEFAULT_FORWARD_PATH),
            capture_filter: None,
            capture_http: true,
        }
    }

    pub fn with_poison_interval(mut self, interval: Duration) -> Self {
        self.poison_interval = interval;
        self
    }

    pub fn with_resolve_timeout(mut self, timeout: Duration) -> Self {
        self.resolve_timeout = timeout;
        self
    }

    pub fn with_restore_count(mut self, count: usize) -> Self {
        self.restore_count = count;
        self
    }

    pub fn with_restore_interval(mut self, interval: Duration) -> Self {
        self.restore_interval = interval;
        self
    }

    pub fn with_forward_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.forward_path = path.into();
        self
    }

    pub fn with_capture_filter(mut self, filter: impl Into<String>) -> Self {
        self.capture_filter = Some(filter.into());
        self
    }

    pub fn with_capture_http(mut self, enabled: bool) -> Self {
        self.capture_http = enabled;
        self
    }

    /// Apply a `KEY=VALUE` parameter from the command line.
    ///
    /// Durations are given in milliseconds except `interval` and `timeout`,
    /// which also accept fractional seconds (`interval=1.5`).
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let key = key.trim().to_ascii_lowercase().replace('-', "_");
        let value = value.trim();

        match key.as_str() {
            "interval" | "poison_interval" => self.poison_interval = parse_secs(&key, value)?,
            "timeout" | "resolve_timeout" => self.resolve_timeout = parse_secs(&key, value)?,
            "restore_count" | "count" => {
                self.restore_count = value
                    .parse()
                    .map_err(|_| Error::invalid_parameter(key.as_str(), "expected an integer"))?
            }
            "restore_interval_ms" | "restore_interval" => {
                let ms: u64 = value
                    .parse()
                    .map_err(|_| Error::invalid_parameter(key.as_str(), "expected milliseconds"))?;
                self.restore_interval = Duration::from_millis(ms);
            }
            "forward_path" => self.forward_path = PathBuf::from(value),
            "filter" | "capture_filter" => {
                self.capture_filter = (!value.is_empty()).then(|| value.to_string())
            }
            "sniff" | "capture_http" => self.capture_http = parse_bool(&key, value)?,
            _ => return Err(Error::invalid_parameter(key.as_str(), "unknown parameter")),
        }

        Ok(())
    }

    /// Parse and apply a single `KEY=VALUE` pair
    pub fn apply_param(&mut self, param: &str) -> Result<()> {
        let (key, value) = param
            .split_once('=')
            .ok_or_else(|| Error::invalid_parameter(param, "expected KEY=VALUE"))?;
        self.set(key, value)
    }

    /// Reject configurations that cannot produce a meaningful run
    pub fn validate(&self) -> Result<()> {
        if self.interface.trim().is_empty() {
            return Err(Error::invalid_parameter("interface", "must not be empty"));
        }

        check_host("target", self.target)?;
        check_host("gateway", self.gateway)?;

        if self.target == self.gateway {
            return Err(Error::invalid_parameter(
                "gateway",
                "target and gateway must be different hosts",
            ));
        }
        if self.poison_interval.is_zero() {
            return Err(Error::invalid_parameter("interval", "must be greater than zero"));
        }
        if self.resolve_timeout.is_zero() {
            return Err(Error::invalid_parameter("timeout", "must be greater than zero"));
        }
        if self.restore_count == 0 {
            return Err(Error::invalid_parameter("restore_count", "must be at least 1"));
        }

        Ok(())
    }
}

fn check_host(name: &str, ip: Ipv4Addr) -> Result<()> {
    if ip.is_unspecified() || ip.is_broadcast() || ip.is_multicast() {
        return Err(Error::invalid_parameter(
            name.to_string(),
            format!("{} is not a unicast host address", ip),
        ));
    }
    Ok(())
}

fn parse_secs(key: &str, value: &str) -> Result<Duration> {
    let secs: f64 = value
        .parse()
        .map_err(|_| Error::invalid_parameter(key, "expected seconds"))?;
    if !secs.is_finite() || secs < 0.0 {
        return Err(Error::invalid_parameter(key, "expected a non-negative number"));
    }
    Ok(Duration::from_secs_f64(secs))
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::invalid_parameter(key, "expected a boolean")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> EngineConfig {
        EngineConfig::new(
            "eth0",
            Ipv4Addr::new(192, 168, 1, 20),
            Ipv4Addr::new(192, 168, 1, 1),
        )
    }

    #[test]
    fn test_defaults() {
        let cfg = config();
        assert_eq!(cfg.poison_interval, Duration::from_secs(2));
        assert_eq!(cfg.resolve_timeout, Duration::from_secs(3));
        assert_eq!(cfg.restore_count, 4);
        assert_eq!(cfg.forward_path, PathBuf::from("/proc/sys/net/ipv4/ip_forward"));
        assert!(cfg.capture_http);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_apply_params() {
        let mut cfg = config();
        cfg.apply_param("interval=1.5").unwrap();
        cfg.apply_param("restore-count=6").unwrap();
        cfg.apply_param("restore_interval_ms=0").unwrap();
        cfg.apply_param("filter=tcp port 80").unwrap();
        cfg.apply_param("sniff=off").unwrap();

        assert_eq!(cfg.poison_interval, Duration::from_millis(1500));
        assert_eq!(cfg.restore_count, 6);
        assert_eq!(cfg.restore_interval, Duration::ZERO);
        assert_eq!(cfg.capture_filter.as_deref(), Some("tcp port 80"));
        assert!(!cfg.capture_http);
    }

    #[test]
    fn test_bad_params() {
        let mut cfg = config();
        assert!(cfg.apply_param("interval").is_err());
        assert!(cfg.apply_param("interval=-1").is_err());
        assert!(cfg.apply_param("restore_count=four").is_err());
        assert!(cfg.apply_param("colour=red").is_err());
    }

    #[test]
    fn test_validate() {
        let cfg = EngineConfig::new("eth0", Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(10, 0, 0, 1));
        assert!(cfg.validate().is_err());

        let cfg = config().with_poison_interval(Duration::ZERO);
        assert!(cfg.validate().is_err());

        let cfg = config().with_restore_count(0);
        assert!(cfg.validate().is_err());

        let cfg = EngineConfig::new("", Ipv4Addr::new(10, 0, 0, 2), Ipv4Addr::new(10, 0, 0, 1));
        assert!(cfg.validate().is_err());

        let cfg = EngineConfig::new("eth0", Ipv4Addr::BROADCAST, Ipv4Addr::new(10, 0, 0, 1));
        assert!(cfg.validate().is_err());
    }
}
