use anyhow::Context;
use chrono::Utc;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

// Best-effort guard against two aggregation passes writing into the same data
// directory. A lock left behind by a crashed process expires after a while.
pub const LOCK_FILE_NAME: &str = ".ivv_run.lock";
const STALE_AFTER: Duration = Duration::from_secs(6 * 60 * 60);

/// Held for the duration of one pass. On drop the lock file is removed, but
/// only while it still carries this holder's token.
#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
    token: String,
}

impl RunLock {
    /// `Ok(None)` means another pass holds the lock.
    pub fn try_acquire(dir: &Path) -> anyhow::Result<Option<Self>> {
        Self::try_acquire_with_expiry(dir, STALE_AFTER)
    }

    pub fn try_acquire_with_expiry(
        dir: &Path,
        stale_after: Duration,
    ) -> anyhow::Result<Option<Self>> {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create data dir {}", dir.display()))?;
        let path = dir.join(LOCK_FILE_NAME);

        match Self::create(&path) {
            Ok(lock) => return Ok(Some(lock)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {}
            Err(e) => {
                return Err(e).with_context(|| format!("failed to create lock {}", path.display()))
            }
        }

        let Some(seen) = read_token(&path)? else {
            // Released between our create attempt and now; retry once.
            return Self::create_or_none(&path);
        };
        if !is_stale(&path, stale_after)? {
            return Ok(None);
        }

        if !take_over(&path, &seen)? {
            return Ok(None);
        }
        tracing::warn!(path = %path.display(), previous = %seen, "took over stale run lock");
        Self::create_or_none(&path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn create_or_none(path: &Path) -> anyhow::Result<Option<Self>> {
        match Self::create(path) {
            Ok(lock) => Ok(Some(lock)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(None),
            Err(e) => Err(e).with_context(|| format!("failed to create lock {}", path.display())),
        }
    }

    fn create(path: &Path) -> std::io::Result<Self> {
        let token = format!(
            "pid={} nonce={:016x} acquired_at={}",
            std::process::id(),
            rand::random::<u64>(),
            Utc::now().to_rfc3339()
        );
        create_with(path, |file| {
            file.write_all(token.as_bytes())?;
            file.sync_all()
        })?;
        Ok(Self {
            path: path.to_path_buf(),
            token,
        })
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        let path = self.path.display();
        match read_token(&self.path) {
            Ok(Some(current)) if current == self.token => {
                if let Err(e) = fs::remove_file(&self.path) {
                    tracing::warn!(path = %path, error = %e, "failed to release run lock");
                }
            }
            Ok(Some(_)) => {
                tracing::warn!(path = %path, "run lock was taken over; leaving it in place");
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(path = %path, error = %format!("{e:#}"), "failed to read run lock");
            }
        }
    }
}

/// Creates `path` exclusively and fills it; a failed fill removes the file.
fn create_with<F>(path: &Path, fill: F) -> std::io::Result<()>
where
    F: FnOnce(&mut File) -> std::io::Result<()>,
{
    let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
    if let Err(e) = fill(&mut file) {
        drop(file);
        let _ = fs::remove_file(path);
        return Err(e);
    }
    Ok(())
}

fn read_token(path: &Path) -> anyhow::Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).with_context(|| format!("failed to read lock {}", path.display())),
    }
}

/// Moves the stale lock aside. Only the taker whose rename succeeds, and who
/// moved the lock it judged stale, may create the next one. A fresh lock
/// moved aside by mistake is linked back into place.
fn take_over(path: &Path, seen: &str) -> anyhow::Result<bool> {
    let aside = path.with_extension(format!("stale-{:016x}", rand::random::<u64>()));
    match fs::rename(path, &aside) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
        Err(e) => {
            return Err(e).with_context(|| format!("failed to move stale lock {}", path.display()))
        }
    }

    let moved = read_token(&aside)?;
    let ours = moved.as_deref() == Some(seen);
    if !ours {
        // Fails if a new lock already exists, which is fine either way.
        let _ = fs::hard_link(&aside, path);
    }
    let _ = fs::remove_file(&aside);
    Ok(ours)
}

fn is_stale(path: &Path, stale_after: Duration) -> anyhow::Result<bool> {
    let meta = match fs::metadata(path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e).with_context(|| format!("failed to stat lock {}", path.display())),
    };
    let modified = meta
        .modified()
        .with_context(|| format!("no modification time for {}", path.display()))?;
    Ok(modified.elapsed().map(|age| age >= stale_after).unwrap_or(false))
}
