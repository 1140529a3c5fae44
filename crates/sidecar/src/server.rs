//! Loopback gRPC server for the sidecar.
//!
//! Two admission stages guard every call: a global token bucket, then a
//! per-client bucket keyed by peer identity (IP for TCP so connections from
//! one machine share a limiter, OS-level peer identity for Unix sockets).
//! Per-client limiters are cached forever; peer cardinality is bounded
//! because the server is loopback-only. A 64-permit semaphore bounds
//! in-flight requests.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tokio::net::{TcpListener, UnixListener};
use tokio_stream::wrappers::{TcpListenerStream, UnixListenerStream};
use tokio_util::sync::CancellationToken;
use tonic::transport::server::UdsConnectInfo;
use tonic::{transport::Server, Request, Response, Status};
use tracing::info;

use crate::{
    limiter::TokenBucket,
    pb::{
        self,
        vrf_server::{Vrf, VrfServer},
    },
    service::BeaconService,
};

const DEFAULT_MAX_CONCURRENT: usize = 64;
const DEFAULT_GLOBAL_RATE: f64 = 100.0;
const DEFAULT_GLOBAL_BURST: f64 = 200.0;
const DEFAULT_PER_CLIENT_RATE: f64 = 10.0;
const DEFAULT_PER_CLIENT_BURST: f64 = 20.0;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid listen address {0:?}")]
    InvalidAddr(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Transport(#[from] tonic::transport::Error),
}

/// Rate-limit and concurrency knobs. Defaults carry the production values; a
/// zero per-client burst disables that stage (test hook).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub global_rate: f64,
    pub global_burst: f64,
    pub per_client_rate: f64,
    pub per_client_burst: f64,
    pub max_concurrent: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            global_rate: DEFAULT_GLOBAL_RATE,
            global_burst: DEFAULT_GLOBAL_BURST,
            per_client_rate: DEFAULT_PER_CLIENT_RATE,
            per_client_burst: DEFAULT_PER_CLIENT_BURST,
            max_concurrent: DEFAULT_MAX_CONCURRENT,
        }
    }
}

/// Identity a per-client limiter is keyed by.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub enum PeerKey {
    Ip(IpAddr),
    Unix(String),
    Unknown,
}

impl PeerKey {
    /// TCP peers are keyed by IP, not `host:port`, so multiple connections
    /// from the same machine share one limiter.
    pub fn from_tcp(addr: SocketAddr) -> Self {
        PeerKey::Ip(addr.ip())
    }
}

pub struct SidecarServer<S> {
    svc: Arc<S>,
    config: ServerConfig,
    global: TokenBucket,
    per_client: Mutex<HashMap<PeerKey, Arc<TokenBucket>>>,
    sem: Arc<tokio::sync::Semaphore>,
}

impl<S: BeaconService + 'static> SidecarServer<S> {
    pub fn new(svc: Arc<S>, config: ServerConfig) -> Self {
        Self {
            svc,
            global: TokenBucket::new(config.global_rate, config.global_burst),
            sem: Arc::new(tokio::sync::Semaphore::new(config.max_concurrent)),
            per_client: Mutex::new(HashMap::new()),
            config,
        }
    }

    /// Serve on a loopback TCP address or a `unix://` socket path until
    /// cancellation. Stale Unix socket files are removed before binding and
    /// after shutdown.
    pub async fn serve(self, addr: &str, cancel: CancellationToken) -> Result<(), ServerError> {
        if let Some(path) = addr.strip_prefix("unix://") {
            if path.trim().is_empty() {
                return Err(ServerError::InvalidAddr(addr.to_string()));
            }

            let _ = std::fs::remove_file(path);
            let listener = UnixListener::bind(path)?;
            info!(addr, "starting vrf sidecar server");

            let result = Server::builder()
                .add_service(VrfServer::new(self))
                .serve_with_incoming_shutdown(
                    UnixListenerStream::new(listener),
                    cancel.cancelled_owned(),
                )
                .await;

            let _ = std::fs::remove_file(path);
            info!("vrf sidecar server stopped");
            return result.map_err(Into::into);
        }

        let listener = TcpListener::bind(addr).await?;
        info!(addr = %listener.local_addr()?, "starting vrf sidecar server");

        Server::builder()
            .add_service(VrfServer::new(self))
            .serve_with_incoming_shutdown(TcpListenerStream::new(listener), cancel.cancelled_owned())
            .await?;

        info!("vrf sidecar server stopped");
        Ok(())
    }

    fn peer_key<T>(request: &Request<T>) -> PeerKey {
        if let Some(addr) = request.remote_addr() {
            return PeerKey::from_tcp(addr);
        }

        if let Some(uds) = request.extensions().get::<UdsConnectInfo>() {
            if let Some(cred) = uds.peer_cred {
                let pid = cred.pid().unwrap_or(-1);
                return PeerKey::Unix(format!("uid={},pid={pid}", cred.uid()));
            }
            if let Some(peer) = &uds.peer_addr {
                return PeerKey::Unix(format!("{peer:?}"));
            }
        }

        PeerKey::Unknown
    }

    /// Both admission stages; either denial maps to `resource_exhausted`.
    fn admit<T>(&self, request: &Request<T>) -> Result<(), Status> {
        if !self.global.allow() {
            return Err(Status::resource_exhausted("vrf: rate limit exceeded"));
        }

        self.admit_peer(Self::peer_key(request))
    }

    fn admit_peer(&self, key: PeerKey) -> Result<(), Status> {
        if self.config.per_client_burst == 0.0 {
            return Ok(());
        }

        let limiter = {
            let mut per_client = self.per_client.lock().expect("per-client lock poisoned");
            per_client
                .entry(key)
                .or_insert_with(|| {
                    Arc::new(TokenBucket::new(
                        self.config.per_client_rate,
                        self.config.per_client_burst,
                    ))
                })
                .clone()
        };

        if !limiter.allow() {
            return Err(Status::resource_exhausted("vrf: client rate limit exceeded"));
        }

        Ok(())
    }
}

#[tonic::async_trait]
impl<S: BeaconService + 'static> Vrf for SidecarServer<S> {
    async fn randomness(
        &self,
        request: Request<pb::QueryRandomnessRequest>,
    ) -> Result<Response<pb::QueryRandomnessResponse>, Status> {
        self.admit(&request)?;

        let _permit = self
            .sem
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| Status::unavailable("vrf: server shutting down"))?;

        let round = request.into_inner().round;
        let beacon = self.svc.randomness(round).await?;
        Ok(Response::new(beacon))
    }

    async fn info(
        &self,
        request: Request<pb::QueryInfoRequest>,
    ) -> Result<Response<pb::QueryInfoResponse>, Status> {
        self.admit(&request)?;

        let _permit = self
            .sem
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| Status::unavailable("vrf: server shutting down"))?;

        let info = self.svc.info().await?;
        Ok(Response::new(info))
    }
}
