//! HTTP-backed beacon fetcher.
//!
//! Talks to a local drand HTTP endpoint using only statically configured
//! URLs. Construction validates the endpoint, the drand binary version, and
//! the chain info against the configured expected parameters; any mismatch is
//! fatal. Fetches for the same round are deduplicated and at most one
//! upstream HTTP request is in flight at a time.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    OnceLock,
};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{
    config::{enforce_loopback_http, SidecarConfig},
    error::{ConfigError, FetchError},
    metrics::SidecarMetrics,
    pb,
    service::BeaconService,
    singleflight::SingleFlight,
};

/// Per-request HTTP timeout against the local drand endpoint.
const HTTP_TIMEOUT: Duration = Duration::from_secs(5);

/// Timeout for the startup `drand version` check.
const VERSION_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// Beacon service backed by a local drand HTTP endpoint.
#[derive(Debug)]
pub struct DrandBeaconService {
    cfg: SidecarConfig,
    metrics: SidecarMetrics,

    http: reqwest::Client,

    single: SingleFlight<Result<pb::QueryRandomnessResponse, FetchError>>,
    /// 1-deep: at most one upstream HTTP request in flight.
    fetch_sem: Semaphore,

    started: Instant,
    /// Nanos since `started` of the last successful fetch; 0 = never.
    last_success_nanos: AtomicU64,
    chain_info: OnceLock<pb::QueryInfoResponse>,
}

impl DrandBeaconService {
    /// Construct a new service, checking the configured drand binary version
    /// and validating `/info` against the configured chain params.
    pub async fn new(cfg: SidecarConfig, metrics: SidecarMetrics) -> Result<Self, ConfigError> {
        enforce_loopback_http(&cfg.drand_http)?;

        if !cfg.has_chain_params() {
            return Err(ConfigError::Invalid(
                "drand chain configuration is incomplete: chain hash, public key, period, and genesis are required"
                    .into(),
            ));
        }

        check_drand_binary(&cfg).await?;

        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|err| ConfigError::Invalid(format!("building HTTP client: {err}")))?;

        let svc = Self {
            cfg,
            metrics,
            http,
            single: SingleFlight::new(),
            fetch_sem: Semaphore::new(1),
            started: Instant::now(),
            last_success_nanos: AtomicU64::new(0),
            chain_info: OnceLock::new(),
        };

        let chain_info = svc
            .fetch_chain_info()
            .await
            .map_err(|err| ConfigError::Invalid(format!("fetching drand /info: {err}")))?;
        validate_chain_info(&chain_info, &svc.cfg)?;
        let _ = svc.chain_info.set(chain_info);

        Ok(svc)
    }

    fn base_url(&self) -> &str {
        self.cfg.drand_http.trim_end_matches('/')
    }

    fn chain_hash_hex(&self) -> String {
        const_hex::encode(&self.cfg.chain_hash)
    }

    fn mark_success(&self) {
        let nanos = (self.started.elapsed().as_nanos() as u64).max(1);
        self.last_success_nanos.store(nanos, Ordering::Relaxed);
    }

    fn observe_time_since_last_success(&self) {
        let last = self.last_success_nanos.load(Ordering::Relaxed);
        if last == 0 {
            self.metrics.observe_time_since_last_success(0.0);
            return;
        }

        let now = self.started.elapsed().as_nanos() as u64;
        let seconds = now.saturating_sub(last) as f64 / 1e9;
        self.metrics.observe_time_since_last_success(seconds);
    }

    async fn fetch_beacon(&self, round: u64) -> Result<pb::QueryRandomnessResponse, FetchError> {
        let chain_hash_hex = self.chain_hash_hex();

        let url = if round == 0 {
            format!("{}/{}/public/latest", self.base_url(), chain_hash_hex)
        } else {
            format!("{}/{}/public/{}", self.base_url(), chain_hash_hex, round)
        };

        let resp = match self.http.get(&url).send().await {
            Ok(resp) => resp,
            Err(err) => {
                self.metrics.observe_fetch(false);
                warn!(round, chain_hash = %chain_hash_hex, %err, "drand fetch failed");
                return Err(FetchError::Unavailable(format!("querying drand: {err}")));
            }
        };

        if resp.status() == StatusCode::NOT_FOUND {
            self.metrics.observe_fetch(false);
            warn!(round, chain_hash = %chain_hash_hex, "drand round not yet available");
            return Err(FetchError::RoundNotAvailable);
        }

        if !resp.status().is_success() {
            self.metrics.observe_fetch(false);
            warn!(round, chain_hash = %chain_hash_hex, status = %resp.status(), "drand returned non-200");
            return Err(FetchError::Unavailable(format!(
                "drand returned non-200: {}",
                resp.status()
            )));
        }

        let beacon: DrandHttpBeacon = match resp.json().await {
            Ok(beacon) => beacon,
            Err(err) => {
                self.metrics.observe_fetch(false);
                return Err(FetchError::Unavailable(format!(
                    "decoding drand response: {err}"
                )));
            }
        };

        let response = match self.validate_beacon(beacon) {
            Ok(response) => response,
            Err(err) => {
                self.metrics.observe_fetch(false);
                return Err(err);
            }
        };

        self.metrics.observe_fetch(true);
        self.metrics.set_latest_round(response.drand_round);
        self.mark_success();

        info!(
            round = response.drand_round,
            chain_hash = %chain_hash_hex,
            "fetched drand beacon"
        );

        Ok(response)
    }

    /// Decode the hex fields and enforce `randomness == sha256(signature)`.
    fn validate_beacon(
        &self,
        beacon: DrandHttpBeacon,
    ) -> Result<pb::QueryRandomnessResponse, FetchError> {
        let signature = decode_hex_bytes(&beacon.signature)
            .map_err(|err| FetchError::Unavailable(format!("decoding signature: {err}")))?;

        let previous_signature = if beacon.previous_signature.trim().is_empty() {
            Vec::new()
        } else {
            decode_hex_bytes(&beacon.previous_signature).map_err(|err| {
                FetchError::Unavailable(format!("decoding previous signature: {err}"))
            })?
        };

        let rand_hash = Sha256::digest(&signature);

        // If the endpoint also returned randomness, it must match.
        if !beacon.randomness.trim().is_empty() {
            let got = decode_hex_bytes(&beacon.randomness)
                .map_err(|err| FetchError::Unavailable(format!("decoding randomness: {err}")))?;
            if got.as_slice() != rand_hash.as_slice() {
                return Err(FetchError::Unavailable(
                    "drand randomness mismatch: sha256(signature) != randomness".into(),
                ));
            }
        }

        Ok(pb::QueryRandomnessResponse {
            drand_round: beacon.round,
            randomness: rand_hash.to_vec(),
            signature,
            previous_signature,
        })
    }

    async fn fetch_chain_info(&self) -> Result<pb::QueryInfoResponse, FetchError> {
        let url = format!("{}/{}/info", self.base_url(), self.chain_hash_hex());

        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|err| FetchError::Unavailable(format!("querying drand /info: {err}")))?;

        if !resp.status().is_success() {
            return Err(FetchError::Unavailable(format!(
                "drand /info returned non-200: {}",
                resp.status()
            )));
        }

        let info: DrandChainInfo = resp
            .json()
            .await
            .map_err(|err| FetchError::Unavailable(format!("decoding drand /info: {err}")))?;

        let chain_hash = decode_hex_bytes(&info.hash)
            .map_err(|err| FetchError::Unavailable(format!("decoding chain hash: {err}")))?;
        let public_key = decode_hex_bytes(&info.public_key)
            .map_err(|err| FetchError::Unavailable(format!("decoding public key: {err}")))?;

        Ok(pb::QueryInfoResponse {
            chain_hash,
            public_key,
            period_seconds: info.period,
            genesis_unix_sec: info.genesis_time,
        })
    }
}

#[async_trait]
impl BeaconService for DrandBeaconService {
    /// Fetch a beacon for the given round; zero requests the latest. Fetches
    /// are serialized so at most one upstream drand HTTP request is
    /// in flight, and concurrent requests for the same round share one call.
    async fn randomness(&self, round: u64) -> Result<pb::QueryRandomnessResponse, FetchError> {
        let result = self
            .single
            .run(round, || async {
                let _permit = self
                    .fetch_sem
                    .acquire()
                    .await
                    .map_err(|_| FetchError::Unavailable("fetcher closed".into()))?;
                self.fetch_beacon(round).await
            })
            .await;

        self.observe_time_since_last_success();
        result
    }

    /// Chain info discovered from `/info`; cached after the first validated
    /// fetch.
    async fn info(&self) -> Result<pb::QueryInfoResponse, FetchError> {
        if let Some(info) = self.chain_info.get() {
            return Ok(info.clone());
        }

        let info = self.fetch_chain_info().await?;
        validate_chain_info(&info, &self.cfg)
            .map_err(|err| FetchError::Unavailable(err.to_string()))?;

        let _ = self.chain_info.set(info.clone());
        Ok(info)
    }
}

/// Construct the drand service, retrying for up to `timeout` with 1s gaps.
/// Absorbs the cold-start window while a freshly supervised drand finishes
/// initialization.
pub async fn new_with_retry(
    cfg: SidecarConfig,
    metrics: SidecarMetrics,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<DrandBeaconService, ConfigError> {
    let deadline = Instant::now() + timeout;

    loop {
        if cancel.is_cancelled() {
            return Err(ConfigError::Shutdown);
        }

        let err = match DrandBeaconService::new(cfg.clone(), metrics.clone()).await {
            Ok(svc) => return Ok(svc),
            Err(err) => err,
        };

        if Instant::now() >= deadline {
            return Err(err);
        }

        warn!(%err, "drand service not ready yet; retrying");
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs(1)) => {}
            _ = cancel.cancelled() => return Err(ConfigError::Shutdown),
        }
    }
}

/// Enforce that discovered drand chain info matches the configured expected
/// values (which should match the on-chain VrfParams).
pub fn validate_chain_info(
    info: &pb::QueryInfoResponse,
    cfg: &SidecarConfig,
) -> Result<(), ConfigError> {
    if info.chain_hash != cfg.chain_hash {
        return Err(ConfigError::InfoMismatch(format!(
            "chain hash mismatch: got {}, expected {}",
            const_hex::encode(&info.chain_hash),
            const_hex::encode(&cfg.chain_hash)
        )));
    }

    if info.public_key != cfg.public_key {
        return Err(ConfigError::InfoMismatch("public key mismatch".into()));
    }

    if info.period_seconds != cfg.period_seconds {
        return Err(ConfigError::InfoMismatch(format!(
            "period mismatch: got {}, expected {}",
            info.period_seconds, cfg.period_seconds
        )));
    }

    if info.genesis_unix_sec != cfg.genesis_unix_sec {
        return Err(ConfigError::InfoMismatch(format!(
            "genesis mismatch: got {}, expected {}",
            info.genesis_unix_sec, cfg.genesis_unix_sec
        )));
    }

    Ok(())
}

/// Run `<binary> version` and, when an expected version is configured,
/// enforce an exact match.
async fn check_drand_binary(cfg: &SidecarConfig) -> Result<(), ConfigError> {
    let bin = if cfg.binary_path.trim().is_empty() {
        "drand"
    } else {
        cfg.binary_path.trim()
    };

    let output = tokio::time::timeout(
        VERSION_CHECK_TIMEOUT,
        tokio::process::Command::new(bin).arg("version").output(),
    )
    .await
    .map_err(|_| ConfigError::BinaryCheck(format!("running {bin} version timed out")))?
    .map_err(|err| ConfigError::BinaryCheck(format!("running {bin} version: {err}")))?;

    if !output.status.success() {
        return Err(ConfigError::BinaryCheck(format!(
            "{bin} version exited with {}",
            output.status
        )));
    }

    let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
    info!(%version, "detected drand binary version");

    if !cfg.expected_binary_version.is_empty() && version != cfg.expected_binary_version {
        return Err(ConfigError::BinaryCheck(format!(
            "version mismatch: got {version:?}, expected {:?}",
            cfg.expected_binary_version
        )));
    }

    Ok(())
}

fn decode_hex_bytes(s: &str) -> Result<Vec<u8>, String> {
    let s = s.trim().trim_start_matches("0x");
    if s.is_empty() {
        return Err("empty hex string".into());
    }
    const_hex::decode(s).map_err(|err| err.to_string())
}

/// Minimal view of the drand HTTP randomness response.
#[derive(Debug, Clone, Deserialize)]
struct DrandHttpBeacon {
    round: u64,
    #[serde(default)]
    randomness: String,
    signature: String,
    #[serde(default)]
    previous_signature: String,
}

/// The drand `/info` document (hex-encoded key material).
#[derive(Debug, Clone, Deserialize)]
struct DrandChainInfo {
    public_key: String,
    period: u64,
    genesis_time: i64,
    hash: String,
}
