use std::{
    fs,
    path::{Path, PathBuf},
};

use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::{
    error::ScanError,
    fingerprint::{Fingerprint, FingerprintBuilder},
    graph::DescriptorGraph,
};

pub const DEFAULT_INCLUDE: &str = "**/*.type.json";

/// One descriptor file found under a code-base root.
#[derive(Clone, Debug)]
pub struct CodeBaseFile {
    pub path: PathBuf,
    /// Path relative to the root it was found under.
    pub relative: PathBuf,
    pub metadata: fs::Metadata,
}

/// The application's code base as seen by the scanner: a set of roots and the
/// globs selecting type descriptor files under them.
#[derive(Clone, Debug)]
pub struct CodeBase {
    roots: Vec<PathBuf>,
    include: GlobSet,
}

impl CodeBase {
    /// An empty `include` list means [`DEFAULT_INCLUDE`].
    pub fn new(roots: Vec<PathBuf>, include: &[String]) -> Result<Self, ScanError> {
        if roots.is_empty() {
            return Err(ScanError::NoRoots);
        }
        let defaults = [DEFAULT_INCLUDE.to_string()];
        let patterns = if include.is_empty() { &defaults[..] } else { include };
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            let glob = Glob::new(pattern).map_err(|source| ScanError::Pattern {
                pattern: pattern.clone(),
                source,
            })?;
            builder.add(glob);
        }
        let include = builder.build().map_err(|source| ScanError::Pattern {
            pattern: patterns.join(","),
            source,
        })?;
        Ok(Self { roots, include })
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Every included file under every root, roots in configured order and
    /// files sorted by name within each root. A root may also name a single
    /// file, which is then included regardless of the globs.
    pub fn files(&self) -> Result<Vec<CodeBaseFile>, ScanError> {
        let mut out = Vec::new();
        for root in &self.roots {
            let meta = fs::metadata(root).map_err(|source| ScanError::Root {
                path: root.clone(),
                source,
            })?;
            if meta.is_file() {
                let relative = root
                    .file_name()
                    .map(PathBuf::from)
                    .unwrap_or_else(|| root.clone());
                out.push(CodeBaseFile {
                    path: root.clone(),
                    relative,
                    metadata: meta,
                });
                continue;
            }
            self.walk_root(root, &mut out);
        }
        Ok(out)
    }

    fn walk_root(&self, root: &Path, out: &mut Vec<CodeBaseFile>) {
        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!(
                        root = %root.display(),
                        error = %err,
                        "skipping unreadable code base entry"
                    );
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(root) else {
                continue;
            };
            if !self.include.is_match(relative) {
                continue;
            }
            match entry.metadata() {
                Ok(metadata) => out.push(CodeBaseFile {
                    path: entry.path().to_path_buf(),
                    relative: relative.to_path_buf(),
                    metadata,
                }),
                Err(err) => {
                    warn!(path = %entry.path().display(), error = %err, "skipping unreadable file");
                }
            }
        }
    }

    pub fn fingerprint(&self) -> Result<Fingerprint, ScanError> {
        Ok(fingerprint_files(&self.files()?))
    }

    /// Loads the type graph together with the fingerprint of the files it
    /// was loaded from.
    pub fn load_graph(&self) -> Result<(DescriptorGraph, Fingerprint), ScanError> {
        let files = self.files()?;
        let fingerprint = fingerprint_files(&files);
        let mut graph = DescriptorGraph::new();
        for file in &files {
            graph.load_file(&file.path);
        }
        debug!(files = files.len(), types = graph.len(), "loaded type descriptors");
        Ok((graph, fingerprint))
    }
}

fn fingerprint_files(files: &[CodeBaseFile]) -> Fingerprint {
    let mut builder = FingerprintBuilder::new();
    for file in files {
        builder.record_metadata(&file.relative, &file.metadata);
    }
    builder.build()
}
