//! Beacon service seam.
//!
//! The RPC server depends on this capability set, not a concrete fetcher, so
//! the live HTTP-backed service and the always-failing stub are
//! interchangeable.

use async_trait::async_trait;

use crate::{error::FetchError, pb};

#[async_trait]
pub trait BeaconService: Send + Sync {
    /// Fetch the beacon for `round`; 0 means latest.
    async fn randomness(&self, round: u64) -> Result<pb::QueryRandomnessResponse, FetchError>;

    /// Chain parameters of the backing drand network.
    async fn info(&self) -> Result<pb::QueryInfoResponse, FetchError>;
}

/// A service that always fails. Stands in wherever no drand endpoint is
/// wired up, keeping the server surface alive while every call errors.
#[derive(Debug, Clone, Copy, Default)]
pub struct StubBeaconService;

#[async_trait]
impl BeaconService for StubBeaconService {
    async fn randomness(&self, _round: u64) -> Result<pb::QueryRandomnessResponse, FetchError> {
        Err(FetchError::Unavailable("stub beacon service".into()))
    }

    async fn info(&self) -> Result<pb::QueryInfoResponse, FetchError> {
        Err(FetchError::Unavailable("stub beacon service".into()))
    }
}
