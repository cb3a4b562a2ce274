//! Self-describing artifacts handed to the downstream consumer through the
//! exchange directory, one canonical CBOR document per file.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tally_cbor::Hash;

use crate::{model::CodeBaseModel, now_millis, signature::Signature};

pub const INVOCATIONS_PREFIX: &str = "invocations";
pub const CODE_BASE_PREFIX: &str = "codebase";
pub const INVOCATIONS_PATTERN: &str = "invocations-*";
pub const CODE_BASE_PATTERN: &str = "codebase-*";
/// Every publication kind.
pub const ALL_PATTERN: &str = "*";

/// Identity of the monitored process.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppIdentity {
    pub app_name: String,
    pub app_version: String,
    pub environment: String,
    pub host_name: String,
    /// Unique per process start; separates restarts of the same host.
    pub process_uuid: String,
    pub started_at_millis: u64,
}

impl AppIdentity {
    pub fn new(
        app_name: impl Into<String>,
        app_version: impl Into<String>,
        environment: impl Into<String>,
    ) -> Self {
        Self {
            app_name: app_name.into(),
            app_version: app_version.into(),
            environment: environment.into(),
            host_name: host_name(),
            process_uuid: uuid::Uuid::new_v4().to_string(),
            started_at_millis: now_millis(),
        }
    }
}

fn host_name() -> String {
    ["HOSTNAME", "COMPUTERNAME"]
        .iter()
        .find_map(|var| std::env::var(var).ok().filter(|v| !v.is_empty()))
        .unwrap_or_else(|| "localhost".into())
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicationHeader {
    pub app: AppIdentity,
    /// Monotonic per publication kind within one process.
    pub sequence: u64,
    /// Content hash of the fingerprint of the code base the payload refers to.
    pub code_base_fingerprint: Option<Hash>,
    pub recording_interval_started_at_millis: u64,
    pub published_at_millis: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Payload {
    CodeBase(CodeBaseModel),
    InvocationData(InvocationData),
}

/// Signatures invoked at least once during the recording interval.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvocationData {
    pub invocations: BTreeSet<Signature>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Publication {
    pub header: PublicationHeader,
    pub payload: Payload,
}

impl Publication {
    /// File name prefix for the exchange directory; sorts by kind, then sequence.
    pub fn file_prefix(&self) -> String {
        let kind = match self.payload {
            Payload::CodeBase(_) => CODE_BASE_PREFIX,
            Payload::InvocationData(_) => INVOCATIONS_PREFIX,
        };
        format!("{kind}-{:08}", self.header.sequence)
    }

    pub fn encode(&self) -> Result<Vec<u8>, serde_cbor::Error> {
        tally_cbor::to_canonical_cbor(self)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, serde_cbor::Error> {
        tally_cbor::from_cbor(bytes)
    }
}
