use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::{fingerprint::Fingerprint, normalize::Normalizer, signature::Signature};

/// Result of one scan: what the application's own code looks like.
///
/// Built wholesale by the scanner and then only read; a rescan produces a new
/// model that replaces the old one as a unit.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeBaseModel {
    pub fingerprint: Fingerprint,
    pub tracked: BTreeSet<Signature>,
    /// Declaring signatures in excluded packages.
    pub excluded: BTreeSet<Signature>,
    /// As-loaded signature to the declaring signature it stands for.
    pub overrides: BTreeMap<Signature, Signature>,
    pub num_classes: usize,
}

/// How a recorded signature relates to the model.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolution {
    /// Dropped: a synthetic dispatch method.
    Noise,
    Tracked(Signature),
    /// Dropped: declared in an excluded package.
    Excluded(Signature),
    /// Not in the model; kept so nothing observed is lost.
    Unknown(Signature),
}

impl Resolution {
    /// The signature to persist, if any.
    pub fn into_kept(self) -> Option<Signature> {
        match self {
            Resolution::Tracked(sig) | Resolution::Unknown(sig) => Some(sig),
            Resolution::Noise | Resolution::Excluded(_) => None,
        }
    }
}

impl CodeBaseModel {
    pub fn new(fingerprint: Fingerprint) -> Self {
        Self {
            fingerprint,
            ..Self::default()
        }
    }

    /// Adds a declaring signature. An override keyed by the same text is
    /// removed; only canonical forms live in both places.
    pub fn insert_tracked(&mut self, sig: Signature) {
        self.overrides.remove(&sig);
        self.tracked.insert(sig);
    }

    pub fn insert_excluded(&mut self, sig: Signature) {
        self.excluded.insert(sig);
    }

    /// Records `this -> declaring`, unless `this` is itself tracked.
    pub fn insert_override(&mut self, this: Signature, declaring: Signature) {
        if this == declaring || self.tracked.contains(&this) {
            return;
        }
        self.overrides.insert(this, declaring);
    }

    pub fn is_empty(&self) -> bool {
        self.tracked.is_empty()
    }

    /// Resolves a raw signature as recorded at a call site.
    ///
    /// The as-loaded form (modifiers stripped, proxy segments kept) is looked
    /// up in the override map first; failing that, the fully normalized form
    /// is looked up again before being classified.
    pub fn resolve(&self, normalizer: &Normalizer, raw: &str) -> Resolution {
        let Some(loaded) = normalizer.strip_modifiers(raw) else {
            return Resolution::Noise;
        };
        let declaring = match self.overrides.get(&loaded) {
            Some(declaring) => declaring.clone(),
            None => {
                let Some(normalized) = normalizer.normalize(loaded.as_str()) else {
                    return Resolution::Noise;
                };
                self.overrides.get(&normalized).cloned().unwrap_or(normalized)
            }
        };
        self.classify(declaring)
    }

    fn classify(&self, sig: Signature) -> Resolution {
        if self.tracked.contains(&sig) {
            Resolution::Tracked(sig)
        } else if self.excluded.contains(&sig) {
            Resolution::Excluded(sig)
        } else {
            Resolution::Unknown(sig)
        }
    }
}
