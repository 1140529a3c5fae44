//! Sidecar configuration and loopback enforcement.

use std::net::IpAddr;

use url::Url;

use crate::error::ConfigError;

/// Static configuration for the sidecar, built once from CLI flags.
#[derive(Debug, Clone, Default)]
pub struct SidecarConfig {
    /// Start and supervise a local drand subprocess.
    pub supervise: bool,
    /// drand HTTP base URL; must point at loopback.
    pub drand_http: String,

    pub binary_path: String,
    /// Exact-match version string; empty disables the check.
    pub expected_binary_version: String,

    pub data_dir: String,
    pub public_listen: String,
    pub private_listen: String,
    pub control_listen: String,

    /// Expected chain parameters; `/info` must match all four byte-exactly.
    pub chain_hash: Vec<u8>,
    pub public_key: Vec<u8>,
    pub period_seconds: u64,
    pub genesis_unix_sec: i64,
}

impl SidecarConfig {
    /// The four chain parameters the fetcher validates `/info` against.
    pub fn has_chain_params(&self) -> bool {
        !self.chain_hash.is_empty()
            && !self.public_key.is_empty()
            && self.period_seconds != 0
            && self.genesis_unix_sec != 0
    }
}

/// Reject drand HTTP endpoints that are not loopback.
pub fn enforce_loopback_http(endpoint: &str) -> Result<(), ConfigError> {
    if endpoint.trim().is_empty() {
        return Err(ConfigError::Invalid(
            "drand HTTP endpoint must be provided".into(),
        ));
    }

    let url = Url::parse(endpoint)
        .map_err(|err| ConfigError::Invalid(format!("invalid drand HTTP endpoint: {err}")))?;

    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(ConfigError::Invalid(format!(
                "invalid drand HTTP endpoint scheme: {other:?}"
            )));
        }
    }

    let Some(host) = url.host_str() else {
        return Err(ConfigError::Invalid(
            "drand HTTP endpoint must include host".into(),
        ));
    };

    if is_loopback_host(host) {
        return Ok(());
    }

    Err(ConfigError::Invalid(format!(
        "drand HTTP endpoint must be loopback-only, got host {host:?}"
    )))
}

/// Whether a listen address (`host:port` or `unix://path`) is local-only.
/// Unix sockets are always considered local.
pub fn is_loopback_listen_addr(addr: &str) -> bool {
    if addr.starts_with("unix://") {
        return true;
    }

    let Some((host, _port)) = addr.rsplit_once(':') else {
        return false;
    };

    is_loopback_host(host)
}

fn is_loopback_host(host: &str) -> bool {
    if host.eq_ignore_ascii_case("localhost") {
        return true;
    }

    host.trim_start_matches('[')
        .trim_end_matches(']')
        .parse::<IpAddr>()
        .map(|ip| ip.is_loopback())
        .unwrap_or(false)
}
