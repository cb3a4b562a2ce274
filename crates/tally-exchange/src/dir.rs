use crate::{ExchangeError, ExchangeResult, FileState, io_error};
use globset::{Glob, GlobMatcher};
use std::{
    fmt, fs,
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};
use tracing::{debug, warn};

const TEMP_PREFIX: &str = ".exchange-";
const TEMP_SUFFIX: &str = ".tmp";

/// A file that has been read and marked consumed, awaiting downstream commit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConsumedFile {
    pub stem: String,
    pub path: PathBuf,
    pub bytes: Vec<u8>,
}

/// Exchange directory owned exclusively by this process.
#[derive(Clone)]
pub struct ExchangeDir {
    dir: PathBuf,
}

impl fmt::Debug for ExchangeDir {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExchangeDir").field("dir", &self.dir).finish()
    }
}

impl ExchangeDir {
    /// Open (creating if needed) the exchange directory.
    ///
    /// Temp files left behind by a crash in the middle of [`publish`](Self::publish)
    /// never became visible and are removed here.
    pub fn open(dir: impl AsRef<Path>) -> ExchangeResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|e| io_error(&dir, e))?;
        let exchange = Self { dir };
        exchange.remove_stale_temp_files()?;
        Ok(exchange)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `bytes` as a new pending file named after `name_prefix`.
    ///
    /// The data is written to a temp file in the same directory, synced, and
    /// renamed into place without clobbering. If `<prefix>` is taken (pending
    /// or consumed) the stem becomes `<prefix>.1`, `<prefix>.2`, and so on.
    pub fn publish(&self, bytes: &[u8], name_prefix: &str) -> ExchangeResult<PathBuf> {
        if name_prefix.is_empty()
            || name_prefix.contains(['/', '\\'])
            || name_prefix.starts_with(TEMP_PREFIX)
            || FileState::split(name_prefix).is_some()
        {
            return Err(ExchangeError::Prefix(name_prefix.to_string()));
        }

        let mut tmp = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .suffix(TEMP_SUFFIX)
            .tempfile_in(&self.dir)
            .map_err(|e| io_error(&self.dir, e))?;
        let tmp_path = tmp.path().to_path_buf();
        tmp.write_all(bytes).map_err(|e| io_error(&tmp_path, e))?;
        tmp.as_file().sync_all().map_err(|e| io_error(&tmp_path, e))?;

        let mut attempt: u32 = 0;
        loop {
            let stem = if attempt == 0 {
                name_prefix.to_string()
            } else {
                format!("{name_prefix}.{attempt}")
            };
            attempt += 1;

            if self.path_for(&stem, FileState::Consumed).exists() {
                continue;
            }
            let target = self.path_for(&stem, FileState::Pending);
            match tmp.persist_noclobber(&target) {
                Ok(_) => {
                    self.sync_dir();
                    debug!(
                        path = %target.display(),
                        bytes = bytes.len(),
                        "published exchange file"
                    );
                    return Ok(target);
                }
                Err(err) if err.error.kind() == ErrorKind::AlreadyExists => {
                    tmp = err.file;
                }
                Err(err) => return Err(io_error(target, err.error)),
            }
        }
    }

    /// Read every pending file matching `pattern` in sorted order, mark each
    /// consumed, and return the contents.
    ///
    /// A file that cannot be read or renamed is logged and left as it was.
    pub fn consume_all(&self, pattern: &str) -> ExchangeResult<Vec<ConsumedFile>> {
        let matcher = compile(pattern)?;
        let mut consumed = Vec::new();
        for (stem, path) in self.list(FileState::Pending, &matcher)? {
            let bytes = match fs::read(&path) {
                Ok(bytes) => bytes,
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "cannot read pending file; skipping"
                    );
                    continue;
                }
            };
            let target = self.path_for(&stem, FileState::Consumed);
            if let Err(err) = fs::rename(&path, &target) {
                warn!(path = %path.display(), error = %err, "cannot mark file consumed; skipping");
                continue;
            }
            consumed.push(ConsumedFile {
                stem,
                path: target,
                bytes,
            });
        }
        Ok(consumed)
    }

    /// Permanently remove consumed files matching `pattern`.
    ///
    /// Call only after the consumed data has been committed downstream.
    pub fn delete_consumed(&self, pattern: &str) -> ExchangeResult<usize> {
        let matcher = compile(pattern)?;
        let mut count = 0;
        for (_, path) in self.list(FileState::Consumed, &matcher)? {
            fs::remove_file(&path).map_err(|e| io_error(&path, e))?;
            count += 1;
        }
        Ok(count)
    }

    /// Remove a single consumed file after its contents were committed.
    pub fn discard(&self, file: &ConsumedFile) -> ExchangeResult<()> {
        match fs::remove_file(&file.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(io_error(&file.path, err)),
        }
    }

    /// Rename consumed files matching `pattern` back to pending.
    pub fn reset_consumed_on_startup(&self, pattern: &str) -> ExchangeResult<usize> {
        let matcher = compile(pattern)?;
        let mut count = 0;
        for (stem, path) in self.list(FileState::Consumed, &matcher)? {
            let target = self.path_for(&stem, FileState::Pending);
            fs::rename(&path, &target).map_err(|e| io_error(&path, e))?;
            count += 1;
        }
        if count > 0 {
            debug!(count, pattern, "reset unconfirmed consumed files to pending");
        }
        Ok(count)
    }

    /// Pending files matching `pattern`, sorted by name.
    pub fn list_pending(&self, pattern: &str) -> ExchangeResult<Vec<PathBuf>> {
        let matcher = compile(pattern)?;
        Ok(self
            .list(FileState::Pending, &matcher)?
            .into_iter()
            .map(|(_, path)| path)
            .collect())
    }

    fn path_for(&self, stem: &str, state: FileState) -> PathBuf {
        self.dir.join(format!("{stem}{}", state.suffix()))
    }

    fn list(
        &self,
        state: FileState,
        matcher: &GlobMatcher,
    ) -> ExchangeResult<Vec<(String, PathBuf)>> {
        let entries = fs::read_dir(&self.dir).map_err(|e| io_error(&self.dir, e))?;
        let mut found = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| io_error(&self.dir, e))?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            let Some((stem, file_state)) = FileState::split(name) else {
                continue;
            };
            if file_state == state && matcher.is_match(stem) {
                found.push((stem.to_string(), entry.path()));
            }
        }
        found.sort();
        Ok(found)
    }

    fn remove_stale_temp_files(&self) -> ExchangeResult<()> {
        let entries = fs::read_dir(&self.dir).map_err(|e| io_error(&self.dir, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| io_error(&self.dir, e))?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if name.starts_with(TEMP_PREFIX) && name.ends_with(TEMP_SUFFIX) {
                let path = entry.path();
                if let Err(err) = fs::remove_file(&path) {
                    warn!(path = %path.display(), error = %err, "cannot remove stale temp file");
                }
            }
        }
        Ok(())
    }

    #[cfg(unix)]
    fn sync_dir(&self) {
        if let Err(err) = fs::File::open(&self.dir).and_then(|dir| dir.sync_all()) {
            debug!(dir = %self.dir.display(), error = %err, "directory sync failed");
        }
    }

    #[cfg(not(unix))]
    fn sync_dir(&self) {}
}

fn compile(pattern: &str) -> ExchangeResult<GlobMatcher> {
    Glob::new(pattern)
        .map(|glob| glob.compile_matcher())
        .map_err(|source| ExchangeError::Pattern {
            pattern: pattern.to_string(),
            source,
        })
}
