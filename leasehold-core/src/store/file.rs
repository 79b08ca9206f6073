use std::{
    fs::{self, File, OpenOptions},
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};

use anyhow::{bail, Context};
use sha2::{Digest, Sha256};
use tracing::{debug, trace};

use crate::record::{LeaseId, LeaseRecord};
use crate::Result;

use super::{LockStore, WriteOutcome};

/// Directory-backed store for processes sharing one host.
///
/// Each lock id maps to `<sha256>.json` holding the record and `<sha256>.lock`
/// used as an OS-level exclusive lock while a conditional write runs. Records
/// are replaced by atomic rename, so readers never see a partial document.
///
/// Guard files are never removed: another process may hold or be waiting on
/// the lock of a guard, and unlinking it would let two writers lock different
/// files for the same key. The directory keeps one small `.lock` file per lock
/// id ever used.
#[derive(Clone, Debug)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open (or create) a store rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Result<FileStore> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("creating store directory {}", dir.display()))?;
        debug!(dir = %dir.display(), "opened file store");
        Ok(FileStore { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn key_name(lock_id: &str) -> String {
        let mut digest = Sha256::new();
        digest.update(lock_id.as_bytes());
        let digest_bytes: [u8; 32] = digest.finalize().into();
        hex::encode(digest_bytes)
    }

    fn record_path(&self, lock_id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", Self::key_name(lock_id)))
    }

    fn guard_path(&self, lock_id: &str) -> PathBuf {
        self.dir.join(format!("{}.lock", Self::key_name(lock_id)))
    }
}

async fn blocking<T, F>(f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .context("file store task failed")?
}

/// Holds the exclusive lock on a key until dropped.
fn lock_guard(path: &Path) -> Result<File> {
    let file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(path)
        .with_context(|| format!("opening guard {}", path.display()))?;
    file.lock()
        .with_context(|| format!("locking guard {}", path.display()))?;
    Ok(file)
}

fn read_record(path: &Path, lock_id: &str) -> Result<Option<LeaseRecord>> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e).with_context(|| format!("reading {}", path.display())),
    };
    let record: LeaseRecord = serde_json::from_slice(&bytes)
        .with_context(|| format!("decoding {}", path.display()))?;
    if record.lock_id != lock_id {
        bail!(
            "{} holds lock {:?}, expected {:?}",
            path.display(),
            record.lock_id,
            lock_id
        );
    }
    Ok(Some(record))
}

fn write_record(path: &Path, record: &LeaseRecord) -> Result<()> {
    let data = serde_json::to_vec_pretty(record)?;
    let tmp_path = path.with_extension(format!("tmp-{}", hex::encode(rand::random::<[u8; 8]>())));
    let mut tmp = File::create(&tmp_path)
        .with_context(|| format!("creating {}", tmp_path.display()))?;
    let written = tmp.write_all(&data).and_then(|_| tmp.sync_all());
    drop(tmp);
    let written = written.and_then(|_| fs::rename(&tmp_path, path));
    if let Err(e) = written {
        let _ = fs::remove_file(&tmp_path);
        return Err(e).with_context(|| format!("writing {}", path.display()));
    }
    Ok(())
}

impl LockStore for FileStore {
    async fn read(&self, lock_id: &str) -> Result<Option<LeaseRecord>> {
        let path = self.record_path(lock_id);
        let lock_id = lock_id.to_owned();
        blocking(move || read_record(&path, &lock_id)).await
    }

    async fn create_if_absent(&self, record: &LeaseRecord) -> Result<WriteOutcome> {
        let path = self.record_path(&record.lock_id);
        let guard_path = self.guard_path(&record.lock_id);
        let record = record.clone();
        blocking(move || {
            let _guard = lock_guard(&guard_path)?;
            if read_record(&path, &record.lock_id)?.is_some() {
                trace!(lock_id = %record.lock_id, "create: record exists");
                return Ok(WriteOutcome::PreconditionFailed);
            }
            write_record(&path, &record)?;
            Ok(WriteOutcome::Applied)
        })
        .await
    }

    async fn update_if_matches(
        &self,
        expected: &LeaseId,
        record: &LeaseRecord,
    ) -> Result<WriteOutcome> {
        let path = self.record_path(&record.lock_id);
        let guard_path = self.guard_path(&record.lock_id);
        let expected = expected.clone();
        let record = record.clone();
        blocking(move || {
            let _guard = lock_guard(&guard_path)?;
            match read_record(&path, &record.lock_id)? {
                Some(current) if current.lease_id == expected => {
                    write_record(&path, &record)?;
                    Ok(WriteOutcome::Applied)
                }
                _ => {
                    trace!(lock_id = %record.lock_id, %expected, "update: lease id mismatch");
                    Ok(WriteOutcome::PreconditionFailed)
                }
            }
        })
        .await
    }

    async fn delete_if_matches(&self, lock_id: &str, expected: &LeaseId) -> Result<WriteOutcome> {
        let path = self.record_path(lock_id);
        let guard_path = self.guard_path(lock_id);
        let lock_id = lock_id.to_owned();
        let expected = expected.clone();
        blocking(move || {
            let _guard = lock_guard(&guard_path)?;
            match read_record(&path, &lock_id)? {
                Some(current) if current.lease_id == expected => {
                    fs::remove_file(&path)
                        .with_context(|| format!("removing {}", path.display()))?;
                    Ok(WriteOutcome::Applied)
                }
                _ => {
                    trace!(%lock_id, %expected, "delete: lease id mismatch");
                    Ok(WriteOutcome::PreconditionFailed)
                }
            }
        })
        .await
    }
}
