use clap::Parser;

/// VRF sidecar daemon: supervises a local drand node and serves validated
/// randomness beacons to the chain node over a loopback RPC.
#[derive(Parser, Debug)]
#[command(name = "vrf-sidecar", version, about, long_about = None)]
pub struct SidecarOpts {
    /// Sidecar RPC listen address (loopback TCP or unix://)
    #[arg(long = "listen-addr", default_value = "127.0.0.1:8090")]
    pub listen_addr: String,

    /// Allow binding to non-loopback addresses (unsafe; operators must
    /// secure access)
    #[arg(long = "vrf-allow-public-bind", default_value_t = false)]
    pub allow_public_bind: bool,

    /// Enable Prometheus metrics
    #[arg(long = "metrics-enabled", default_value_t = false)]
    pub metrics_enabled: bool,

    /// Prometheus metrics listen address (loopback only)
    #[arg(long = "metrics-addr", default_value = "127.0.0.1:8091")]
    pub metrics_addr: String,

    /// Chain ID label for metrics (optional)
    #[arg(long = "chain-id", default_value = "")]
    pub chain_id: String,

    /// Start and supervise a local drand subprocess
    #[arg(
        long = "drand-supervise",
        default_value_t = true,
        action = clap::ArgAction::Set
    )]
    pub drand_supervise: bool,

    /// drand HTTP base URL (defaults to http://<drand-public-addr>)
    #[arg(long = "drand-http", default_value = "")]
    pub drand_http: String,

    /// drand public listen address (also used for HTTP)
    #[arg(long = "drand-public-addr", default_value = "127.0.0.1:8081")]
    pub drand_public_addr: String,

    /// drand private listen address
    #[arg(long = "drand-private-addr", default_value = "0.0.0.0:4444")]
    pub drand_private_addr: String,

    /// drand control listen address
    #[arg(long = "drand-control-addr", default_value = "127.0.0.1:8881")]
    pub drand_control_addr: String,

    /// drand data directory (required when --drand-supervise)
    #[arg(long = "drand-data-dir", default_value = "")]
    pub drand_data_dir: String,

    /// Path to the drand binary
    #[arg(long = "drand-binary", default_value = "drand")]
    pub drand_binary: String,

    /// Expected drand version string (optional, exact match)
    #[arg(long = "drand-expected-version", default_value = "")]
    pub drand_expected_version: String,

    /// Expected drand chain hash (hex)
    #[arg(long = "drand-chain-hash", default_value = "")]
    pub drand_chain_hash: String,

    /// Expected drand group public key (base64)
    #[arg(long = "drand-public-key", default_value = "")]
    pub drand_public_key: String,

    /// drand beacon period in seconds
    #[arg(long = "drand-period-seconds", default_value_t = 0)]
    pub drand_period_seconds: u64,

    /// drand genesis time (unix seconds)
    #[arg(long = "drand-genesis-unix", default_value_t = 0)]
    pub drand_genesis_unix: i64,
}
