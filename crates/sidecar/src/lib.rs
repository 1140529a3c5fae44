//! VRF sidecar: a supervised local daemon that keeps a drand subprocess
//! running, fetches and validates its beacons over loopback HTTP, and serves
//! them to the chain node over a rate-limited local RPC.

pub mod client;
pub mod config;
pub mod drand;
pub mod error;
pub mod limiter;
pub mod metrics;
pub mod metrics_server;
pub mod process;
pub mod server;
pub mod service;
pub mod singleflight;

/// Generated RPC types for the sidecar service.
pub mod pb {
    tonic::include_proto!("vrf.sidecar.v1");
}

pub use client::SidecarClient;
pub use config::SidecarConfig;
pub use drand::DrandBeaconService;
pub use error::{ConfigError, FetchError};
pub use metrics::SidecarMetrics;
pub use process::DrandProcess;
pub use server::{ServerConfig, SidecarServer};
pub use service::BeaconService;
