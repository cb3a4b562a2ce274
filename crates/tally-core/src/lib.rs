//! Recording, scanning and reconciliation engine of the tally agent.
//!
//! - [`registry`]: lock-minimal two-generation buffer of invoked signatures.
//! - [`scanner`]: builds the [`CodeBaseModel`] from type descriptors.
//! - [`normalize`]: rule table folding proxy-generated names back.
//! - [`fingerprint`]: cheap change detection for the code base.
//! - [`publication`]: the artifacts written to the exchange directory.

pub mod codebase;
pub mod error;
pub mod filter;
pub mod fingerprint;
pub mod graph;
pub mod model;
pub mod normalize;
pub mod publication;
pub mod registry;
pub mod scanner;
pub mod signature;

use std::time::{SystemTime, UNIX_EPOCH};

pub use codebase::CodeBase;
pub use error::{FlushError, ScanError};
pub use filter::MethodFilter;
pub use fingerprint::{Fingerprint, FingerprintBuilder};
pub use graph::{ConstructorDef, DescriptorGraph, MethodDef, TypeDef, TypeGraph, TypeKind};
pub use model::{CodeBaseModel, Resolution};
pub use normalize::Normalizer;
pub use publication::{AppIdentity, Payload, Publication, PublicationHeader};
pub use registry::{FlushOutcome, FlushTarget, InvocationRegistry, Recorder};
pub use scanner::{ScanScope, SignatureResolver};
pub use signature::{Signature, Visibility};

/// Wall-clock milliseconds since the Unix epoch; zero if the clock is before it.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
