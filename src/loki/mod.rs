//! Grafana Loki push API: request shape and client.
//!
//! Each vehicle becomes one log line. All lines from one batch go into a
//! single stream labelled `{job, service, line_ref}`, one request per batch.

mod client;

pub use client::LokiClient;

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SendError;
use crate::types::ParsedBusData;

pub const PUSH_PATH: &str = "/loki/api/v1/push";
pub const JOB_LABEL: &str = "bods2loki";
pub const SERVICE_LABEL: &str = "bus-tracking";

/// Downstream sink for parsed batches.
#[async_trait]
pub trait Pusher: Send + Sync {
    async fn push(&self, data: &ParsedBusData) -> Result<(), SendError>;
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct PushRequest {
    pub streams: Vec<Stream>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct Stream {
    pub stream: BTreeMap<String, String>,
    /// `[unix_nanos, line]` pairs.
    pub values: Vec<[String; 2]>,
}

/// Labels attached to every stream for `line_ref`.
pub fn stream_labels(line_ref: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        ("job".to_string(), JOB_LABEL.to_string()),
        ("service".to_string(), SERVICE_LABEL.to_string()),
        ("line_ref".to_string(), line_ref.to_string()),
    ])
}

/// Builds the push body for one batch.
///
/// Entry `i` is stamped `sent_at + i` nanoseconds so lines keep their batch
/// order and never share a timestamp inside the stream.
pub fn build_push_request(
    data: &ParsedBusData,
    sent_at: DateTime<Utc>,
) -> Result<PushRequest, SendError> {
    let base = sent_at.timestamp_nanos_opt().unwrap_or_default();

    let values = data
        .log_entries()
        .enumerate()
        .map(|(i, entry)| -> Result<[String; 2], SendError> {
            let line = serde_json::to_string(&entry)?;
            Ok([(base + i as i64).to_string(), line])
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(PushRequest {
        streams: vec![Stream {
            stream: stream_labels(&data.line_ref),
            values,
        }],
    })
}
