//! Telemetry for the block-lifecycle handlers, recorded through the
//! `metrics` facade so the application picks the exporter.

use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbciMethod {
    PreBlock,
    ExtendVote,
    VerifyVoteExtension,
}

impl AbciMethod {
    fn as_str(&self) -> &'static str {
        match self {
            AbciMethod::PreBlock => "pre_block",
            AbciMethod::ExtendVote => "extend_vote",
            AbciMethod::VerifyVoteExtension => "verify_vote_extension",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    ExtendedCommit,
}

impl MessageType {
    fn as_str(&self) -> &'static str {
        match self {
            MessageType::ExtendedCommit => "extended_commit",
        }
    }
}

/// Record a handler's end-to-end latency and request status.
pub fn record_latency_and_status(latency: Duration, ok: bool, method: AbciMethod) {
    metrics::histogram!("vrf_abci_latency_seconds", "method" => method.as_str())
        .record(latency.as_secs_f64());

    let status = if ok { "success" } else { "error" };
    metrics::counter!(
        "vrf_abci_requests_total",
        "method" => method.as_str(),
        "status" => status,
    )
    .increment(1);
}

/// Record the size of an encoded or decoded payload.
pub fn record_message_size(message_type: MessageType, size: usize) {
    metrics::gauge!("vrf_abci_message_size_bytes", "type" => message_type.as_str())
        .set(size as f64);
}
