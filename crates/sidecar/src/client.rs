//! Loopback RPC client for the chain node.

use std::time::Duration;

use hyper_util::rt::TokioIo;
use thiserror::Error;
use tokio::net::UnixStream;
use tokio::sync::Mutex;
use tonic::transport::{Channel, Endpoint, Uri};
use tower::service_fn;
use tracing::info;

use crate::{
    error::ConfigError,
    pb::{self, vrf_client::VrfClient},
};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("vrf sidecar client not started")]
    NotStarted,

    #[error("failed to dial vrf sidecar server: {0}")]
    Dial(#[from] tonic::transport::Error),

    #[error(transparent)]
    Rpc(#[from] tonic::Status),
}

/// Client for the sidecar's loopback RPC. `start` dials, `stop` tears the
/// connection down; both are idempotent, and the handle is read under a lock
/// so `stop` is safe against in-flight calls.
pub struct SidecarClient {
    addr: String,
    timeout: Duration,
    inner: Mutex<Option<VrfClient<Channel>>>,
}

impl SidecarClient {
    pub fn new(addr: impl Into<String>, timeout: Duration) -> Result<Self, ConfigError> {
        if timeout.is_zero() {
            return Err(ConfigError::Invalid("timeout must be positive".into()));
        }

        Ok(Self {
            addr: addr.into(),
            timeout,
            inner: Mutex::new(None),
        })
    }

    /// Dial the sidecar over loopback TCP or a `unix://` socket. Plaintext
    /// transport; the socket never leaves the machine.
    pub async fn start(&self) -> Result<(), ClientError> {
        info!(addr = %self.addr, "starting vrf sidecar client");

        let channel = if let Some(path) = self.addr.strip_prefix("unix://") {
            let path = path.to_string();
            // the URI is required but ignored by the connector
            Endpoint::try_from("http://127.0.0.1:0")?
                .timeout(self.timeout)
                .connect_with_connector(service_fn(move |_: Uri| {
                    let path = path.clone();
                    async move {
                        let stream = UnixStream::connect(path).await?;
                        Ok::<_, std::io::Error>(TokioIo::new(stream))
                    }
                }))
                .await?
        } else {
            Endpoint::try_from(format!("http://{}", self.addr))?
                .timeout(self.timeout)
                .connect()
                .await?
        };

        *self.inner.lock().await = Some(VrfClient::new(channel));
        info!("vrf sidecar client started");
        Ok(())
    }

    /// Tear down the connection. Safe to call repeatedly or concurrently
    /// with in-flight calls (they complete or fail with a transport error).
    pub async fn stop(&self) {
        let mut inner = self.inner.lock().await;
        if inner.take().is_some() {
            info!("vrf sidecar client stopped");
        }
    }

    async fn client(&self) -> Result<VrfClient<Channel>, ClientError> {
        self.inner
            .lock()
            .await
            .clone()
            .ok_or(ClientError::NotStarted)
    }

    pub async fn randomness(&self, round: u64) -> Result<pb::QueryRandomnessResponse, ClientError> {
        let mut client = self.client().await?;
        let response = client
            .randomness(pb::QueryRandomnessRequest { round })
            .await?;
        Ok(response.into_inner())
    }

    pub async fn info(&self) -> Result<pb::QueryInfoResponse, ClientError> {
        let mut client = self.client().await?;
        let response = client.info(pb::QueryInfoRequest {}).await?;
        Ok(response.into_inner())
    }
}
