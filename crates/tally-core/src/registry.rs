//! In-memory recording of invoked signatures.
//!
//! Two generations alternate: instrumentation threads insert into whichever
//! one the `current` index names, and the scheduler loop swaps the index
//! before draining the retired generation. Recording never blocks on a flush
//! and takes no lock beyond a set shard.

use std::{
    collections::BTreeSet,
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicU64, AtomicUsize, Ordering},
    },
};

use dashmap::DashSet;
use tally_exchange::ExchangeDir;
use tracing::debug;

use crate::{
    error::FlushError,
    model::{CodeBaseModel, Resolution},
    normalize::Normalizer,
    now_millis,
    publication::{AppIdentity, InvocationData, Payload, Publication, PublicationHeader},
};

#[derive(Debug, Default)]
struct Generation {
    signatures: DashSet<String>,
    started_at_millis: AtomicU64,
}

/// A generation taken out of rotation by [`InvocationRegistry::retire`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RetiredGeneration {
    pub started_at_millis: u64,
    /// Raw signatures as recorded, in no particular order.
    pub signatures: Vec<String>,
}

impl RetiredGeneration {
    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }
}

/// Where and how a flush publishes.
#[derive(Clone, Copy, Debug)]
pub struct FlushTarget<'a> {
    pub exchange: &'a ExchangeDir,
    pub app: &'a AppIdentity,
    /// Freshest scanned model; without one, signatures are only normalized.
    pub model: Option<&'a CodeBaseModel>,
    pub normalizer: &'a Normalizer,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FlushOutcome {
    /// Distinct raw signatures taken from the retired generation.
    pub recorded: usize,
    /// Distinct resolved signatures written.
    pub published: usize,
    /// Noise and excluded signatures.
    pub dropped: usize,
    /// Kept signatures the model does not know.
    pub unknown: usize,
    pub file: Option<PathBuf>,
}

#[derive(Debug)]
pub struct InvocationRegistry {
    generations: [Generation; 2],
    current: AtomicUsize,
}

impl Default for InvocationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl InvocationRegistry {
    pub fn new() -> Self {
        let registry = Self {
            generations: Default::default(),
            current: AtomicUsize::new(0),
        };
        registry.generations[0]
            .started_at_millis
            .store(now_millis(), Ordering::Release);
        registry
    }

    /// Records one invocation. Never blocks and never fails; repeated
    /// signatures within a generation cost a lookup only.
    pub fn register(&self, raw_signature: &str) {
        let generation = &self.generations[self.current.load(Ordering::Acquire)];
        if !generation.signatures.contains(raw_signature) {
            generation.signatures.insert(raw_signature.to_owned());
        }
    }

    /// Distinct signatures in the current generation.
    pub fn pending(&self) -> usize {
        self.generations[self.current.load(Ordering::Acquire)]
            .signatures
            .len()
    }

    /// Start of the current recording interval.
    pub fn interval_started_at_millis(&self) -> u64 {
        self.generations[self.current.load(Ordering::Acquire)]
            .started_at_millis
            .load(Ordering::Acquire)
    }

    /// Swaps the current generation and drains the retired one.
    ///
    /// Only the members present when the drain starts are removed, so a
    /// registration that read the old index and lands late stays behind for
    /// that generation's next turn instead of being lost.
    pub fn retire(&self) -> RetiredGeneration {
        let old = self.current.load(Ordering::Acquire);
        let new = 1 - old;
        self.generations[new]
            .started_at_millis
            .store(now_millis(), Ordering::Release);
        self.current.store(new, Ordering::Release);

        let retired = &self.generations[old];
        let signatures: Vec<String> = retired
            .signatures
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        for sig in &signatures {
            retired.signatures.remove(sig);
        }
        RetiredGeneration {
            started_at_millis: retired.started_at_millis.load(Ordering::Acquire),
            signatures,
        }
    }

    /// Retires the current generation, resolves it against the target's
    /// model and publishes the result as one pending file. Nothing is written
    /// when no signature survives resolution.
    pub fn flush_due(
        &self,
        sequence: u64,
        target: &FlushTarget<'_>,
    ) -> Result<FlushOutcome, FlushError> {
        let retired = self.retire();
        let mut outcome = FlushOutcome {
            recorded: retired.signatures.len(),
            ..FlushOutcome::default()
        };
        if retired.is_empty() {
            return Ok(outcome);
        }

        let mut invocations = BTreeSet::new();
        for raw in &retired.signatures {
            let resolution = match target.model {
                Some(model) => model.resolve(target.normalizer, raw),
                None => target
                    .normalizer
                    .normalize(raw)
                    .map_or(Resolution::Noise, Resolution::Unknown),
            };
            if matches!(resolution, Resolution::Unknown(_)) {
                outcome.unknown += 1;
            }
            match resolution.into_kept() {
                Some(sig) => {
                    invocations.insert(sig);
                }
                None => outcome.dropped += 1,
            }
        }
        outcome.published = invocations.len();
        if invocations.is_empty() {
            debug!(recorded = outcome.recorded, "nothing left to publish after resolution");
            return Ok(outcome);
        }

        let publication = Publication {
            header: PublicationHeader {
                app: target.app.clone(),
                sequence,
                code_base_fingerprint: target.model.map(|m| m.fingerprint.content_hash()),
                recording_interval_started_at_millis: retired.started_at_millis,
                published_at_millis: now_millis(),
            },
            payload: Payload::InvocationData(InvocationData { invocations }),
        };
        let bytes = publication.encode()?;
        outcome.file = Some(target.exchange.publish(&bytes, &publication.file_prefix())?);
        Ok(outcome)
    }
}

/// Cloneable handle given to the instrumentation adapter.
#[derive(Clone, Debug)]
pub struct Recorder {
    registry: Arc<InvocationRegistry>,
}

impl Recorder {
    pub fn new(registry: Arc<InvocationRegistry>) -> Self {
        Self { registry }
    }

    /// Fire and forget.
    pub fn record(&self, raw_signature: &str) {
        self.registry.register(raw_signature);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registration_is_idempotent_within_a_generation() {
        let registry = InvocationRegistry::new();
        registry.register("public void a.B.c()");
        registry.register("public void a.B.c()");
        registry.register("public void a.B.d()");
        assert_eq!(registry.pending(), 2);
    }

    #[test]
    fn retire_swaps_and_drains() {
        let registry = InvocationRegistry::new();
        let started = registry.interval_started_at_millis();
        registry.register("x");
        let retired = registry.retire();
        assert_eq!(retired.signatures, vec!["x".to_string()]);
        assert_eq!(retired.started_at_millis, started);
        assert_eq!(registry.pending(), 0);

        registry.register("y");
        assert_eq!(registry.retire().signatures, vec!["y".to_string()]);
        // The first generation was emptied and is current again.
        assert_eq!(registry.pending(), 0);
        assert!(registry.retire().is_empty());
    }

    #[test]
    fn recorder_shares_the_registry() {
        let registry = Arc::new(InvocationRegistry::new());
        let recorder = Recorder::new(Arc::clone(&registry));
        recorder.clone().record("m");
        assert_eq!(registry.pending(), 1);
    }
}
