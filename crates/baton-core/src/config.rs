//! baton.toml configuration parser.
//!
//! Durations are written as strings with a unit suffix (`"100s"`, `"10m"`,
//! `"500ms"`). Every field is optional; missing values fall back to the
//! defaults below.

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use crate::error::{CoreError, CoreResult};

pub const DEFAULT_STANDARD_BUDGET: Duration = Duration::from_secs(100);
pub const DEFAULT_ELEVATED_BUDGET: Duration = Duration::from_secs(600);
pub const DEFAULT_LIVENESS_TIMEOUT: Duration = Duration::from_secs(15);
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatonConfig {
    #[serde(default)]
    pub scheduler: SchedulerSection,
    #[serde(default)]
    pub server: ServerSection,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchedulerSection {
    pub standard_budget: Option<String>,
    pub elevated_budget: Option<String>,
    pub liveness_timeout: Option<String>,
    pub tick_interval: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerSection {
    pub bind: Option<IpAddr>,
    pub port: Option<u16>,
}

/// Fully resolved scheduler timings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    pub standard_budget: Duration,
    pub elevated_budget: Duration,
    pub liveness_timeout: Duration,
    pub tick_interval: Duration,
}

impl BatonConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: BatonConfig = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Resolve the scheduler section into concrete durations and check them.
    pub fn timings(&self) -> CoreResult<Timings> {
        let s = &self.scheduler;
        let timings = Timings {
            standard_budget: resolve("standard_budget", &s.standard_budget, DEFAULT_STANDARD_BUDGET)?,
            elevated_budget: resolve("elevated_budget", &s.elevated_budget, DEFAULT_ELEVATED_BUDGET)?,
            liveness_timeout: resolve(
                "liveness_timeout",
                &s.liveness_timeout,
                DEFAULT_LIVENESS_TIMEOUT,
            )?,
            tick_interval: resolve("tick_interval", &s.tick_interval, DEFAULT_TICK_INTERVAL)?,
        };

        if timings.tick_interval.is_zero() {
            return Err(CoreError::InvalidConfig(
                "tick_interval must be greater than zero".to_string(),
            ));
        }
        Ok(timings)
    }

    /// Socket address the HTTP server listens on.
    pub fn listen_addr(&self) -> SocketAddr {
        let ip = self
            .server
            .bind
            .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        SocketAddr::new(ip, self.server.port.unwrap_or(DEFAULT_PORT))
    }

    /// A config with every default spelled out, for `batond config`.
    pub fn scaffold() -> Self {
        BatonConfig {
            scheduler: SchedulerSection {
                standard_budget: Some(format_duration(DEFAULT_STANDARD_BUDGET)),
                elevated_budget: Some(format_duration(DEFAULT_ELEVATED_BUDGET)),
                liveness_timeout: Some(format_duration(DEFAULT_LIVENESS_TIMEOUT)),
                tick_interval: Some(format_duration(DEFAULT_TICK_INTERVAL)),
            },
            server: ServerSection {
                bind: Some(IpAddr::V4(Ipv4Addr::UNSPECIFIED)),
                port: Some(DEFAULT_PORT),
            },
        }
    }
}

fn resolve(field: &'static str, value: &Option<String>, default: Duration) -> CoreResult<Duration> {
    match value {
        Some(raw) => parse_duration(raw).ok_or_else(|| CoreError::InvalidDuration {
            field,
            value: raw.clone(),
        }),
        None => Ok(default),
    }
}

/// Parse `"500ms"`, `"30s"`, `"10m"`, or a bare number of seconds.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(ms) = s.strip_suffix("ms") {
        ms.trim().parse::<u64>().ok().map(Duration::from_millis)
    } else if let Some(secs) = s.strip_suffix('s') {
        secs.trim().parse::<u64>().ok().map(Duration::from_secs)
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.trim()
            .parse::<u64>()
            .ok()
            .and_then(|m| m.checked_mul(60))
            .map(Duration::from_secs)
    } else {
        s.parse::<u64>().ok().map(Duration::from_secs)
    }
}

/// Inverse of [`parse_duration`] for whole seconds and milliseconds.
pub fn format_duration(d: Duration) -> String {
    if d.subsec_millis() != 0 {
        format!("{}ms", d.as_millis())
    } else {
        format!("{}s", d.as_secs())
    }
}
