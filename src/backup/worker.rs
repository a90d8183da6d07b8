//! Runs service calls on a thread pool, one call at a time per target.

use crate::backup::catalog::BackupEntry;
use crate::backup::result_error::result::Result;
use crate::backup::retention::RetentionPolicy;
use crate::backup::service::{BackupOutcome, BackupService};
use crate::backup::target::BackupTarget;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::mpsc::{sync_channel, Receiver, TryRecvError};
use std::sync::{Arc, Mutex, PoisonError};

/// Handle to a call submitted to a [`BackupWorker`]
///
/// Dropping the handle does not stop the call; a started filesystem operation
/// always runs to completion or failure.
#[derive(Debug)]
pub struct BackupTask<T> {
    rx: Receiver<T>,
}

impl<T> BackupTask<T> {
    /// Blocks until the call finishes.
    pub fn wait(self) -> Result<T> {
        Ok(self.rx.recv()?)
    }

    /// The value, if the call has already finished.
    pub fn try_result(&self) -> Result<Option<T>> {
        match self.rx.try_recv() {
            Ok(v) => Ok(Some(v)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(std::sync::mpsc::RecvError.into()),
        }
    }
}

/// Offloads [`BackupService`] calls from the caller's thread
///
/// Calls for the same backup folder are serialized so a restore never
/// interleaves with a backup of the same saves. Calls for different targets
/// run in parallel. Serialized calls are not guaranteed to run in submission
/// order, as `std::sync::Mutex` is not fair.
pub struct BackupWorker {
    pool: Arc<ThreadPool>,
    service: BackupService,
    locks: Arc<Mutex<LockMap>>,
}

type LockMap = HashMap<String, Arc<Mutex<()>>>;

impl BackupWorker {
    pub fn new(threads: Option<usize>) -> Result<Self> {
        let mut builder = ThreadPoolBuilder::new().thread_name(|i| format!("backup-worker-{i}"));
        if let Some(threads) = threads {
            builder = builder.num_threads(threads);
        }
        Ok(Self::with_pool(Arc::new(builder.build()?)))
    }

    pub fn with_pool(pool: Arc<ThreadPool>) -> Self {
        Self {
            pool,
            service: BackupService::new(),
            locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn lock_for(&self, key: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.entry(key.to_string()).or_default().clone()
    }

    /// Drops the entry for `key` once no other call holds its lock.
    fn release_lock(locks: &Mutex<LockMap>, key: &str, lock: Arc<Mutex<()>>) {
        let mut locks = locks.lock().unwrap_or_else(PoisonError::into_inner);
        if Arc::strong_count(&lock) == 2 {
            locks.remove(key);
        }
    }

    fn submit<T, F>(&self, target: &BackupTarget, job: F) -> BackupTask<T>
    where
        T: Send + 'static,
        F: FnOnce(&BackupService) -> T + Send + 'static,
    {
        let key = target.folder_name();
        let lock = self.lock_for(&key);
        let locks = Arc::clone(&self.locks);
        let service = self.service;
        let (tx, rx) = sync_channel(1);
        self.pool.spawn(move || {
            let result = {
                let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
                tracing::debug!("Running backup job for {}", key);
                job(&service)
            };
            Self::release_lock(&locks, &key, lock);
            if tx.send(result).is_err() {
                tracing::debug!("Result of backup job for {} was not collected", key);
            }
        });
        BackupTask { rx }
    }

    pub fn submit_create(
        &self,
        target: BackupTarget,
        policy: RetentionPolicy,
    ) -> BackupTask<BackupOutcome> {
        self.submit(&target.clone(), move |s| s.create_backup(&target, &policy))
    }

    pub fn submit_restore(
        &self,
        target: BackupTarget,
        backup_path: PathBuf,
        policy: RetentionPolicy,
    ) -> BackupTask<BackupOutcome> {
        self.submit(&target.clone(), move |s| {
            s.restore_backup(&target, &backup_path, &policy)
        })
    }

    pub fn submit_list(
        &self,
        target: BackupTarget,
        policy: RetentionPolicy,
    ) -> BackupTask<Result<Vec<BackupEntry>>> {
        self.submit(&target.clone(), move |s| s.list_backups(&target, &policy))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fixture(tmp: &TempDir, title: &str) -> (BackupTarget, RetentionPolicy) {
        let saves = tmp.path().join(title);
        std::fs::create_dir_all(&saves).unwrap();
        std::fs::write(saves.join("slot.sav"), title).unwrap();
        let target = BackupTarget::builder()
            .title(title)
            .source_path(saves)
            .build();
        let policy = RetentionPolicy::builder()
            .backup_root(tmp.path().join("backups"))
            .build();
        (target, policy)
    }

    #[test]
    fn test_create_then_list() {
        let tmp = TempDir::new().unwrap();
        let (target, policy) = fixture(&tmp, "Alpha");
        let worker = BackupWorker::new(Some(2)).unwrap();

        let outcome = worker
            .submit_create(target.clone(), policy.clone())
            .wait()
            .unwrap();
        assert!(outcome.success(), "{}", outcome.message());

        let entries = worker.submit_list(target, policy).wait().unwrap().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(Some(entries[0].path()), outcome.result_path().as_ref());
    }

    #[test]
    fn test_targets_run_independently() {
        let tmp = TempDir::new().unwrap();
        let worker = BackupWorker::new(Some(4)).unwrap();

        let tasks: Vec<_> = ["Alpha", "Beta", "Gamma"]
            .into_iter()
            .map(|title| {
                let (target, policy) = fixture(&tmp, title);
                worker.submit_create(target, policy)
            })
            .collect();

        for task in tasks {
            assert!(task.wait().unwrap().success());
        }
        let folders = std::fs::read_dir(tmp.path().join("backups")).unwrap().count();
        assert_eq!(folders, 3);
    }

    #[test]
    fn test_same_target_calls_all_complete() {
        let tmp = TempDir::new().unwrap();
        let (target, policy) = fixture(&tmp, "Alpha");
        let worker = BackupWorker::new(Some(4)).unwrap();

        let tasks: Vec<_> = (0..4)
            .map(|_| worker.submit_create(target.clone(), policy.clone()))
            .collect();

        for task in tasks {
            let outcome = task.wait().unwrap();
            assert!(outcome.success(), "{}", outcome.message());
        }
    }

    #[test]
    fn test_lock_is_shared_per_folder() {
        let worker = BackupWorker::new(Some(1)).unwrap();
        let a = worker.lock_for("alpha");
        let b = worker.lock_for("alpha");
        let c = worker.lock_for("beta");
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
    }

    #[test]
    fn test_lock_entries_are_released() {
        let tmp = TempDir::new().unwrap();
        let worker = BackupWorker::new(Some(2)).unwrap();

        let tasks: Vec<_> = ["Alpha", "Alpha", "Beta"]
            .into_iter()
            .map(|title| {
                let (target, policy) = fixture(&tmp, title);
                worker.submit_create(target, policy)
            })
            .collect();
        for task in tasks {
            assert!(task.wait().unwrap().success());
        }

        assert!(worker.locks.lock().unwrap().is_empty());
    }

    #[test]
    fn test_release_keeps_lock_still_in_use() {
        let worker = BackupWorker::new(Some(1)).unwrap();
        let first = worker.lock_for("alpha");
        let second = worker.lock_for("alpha");

        BackupWorker::release_lock(&worker.locks, "alpha", first);
        assert!(worker.locks.lock().unwrap().contains_key("alpha"));

        BackupWorker::release_lock(&worker.locks, "alpha", second);
        assert!(worker.locks.lock().unwrap().is_empty());
    }

    #[test]
    fn test_try_result_eventually_yields() {
        let tmp = TempDir::new().unwrap();
        let (target, policy) = fixture(&tmp, "Alpha");
        let worker = BackupWorker::new(Some(1)).unwrap();

        let task = worker.submit_create(target, policy);
        let outcome = loop {
            if let Some(outcome) = task.try_result().unwrap() {
                break outcome;
            }
            std::thread::sleep(std::time::Duration::from_millis(5));
        };
        assert!(outcome.success());
    }

    #[test]
    fn test_restore_missing_backup_through_worker() {
        let tmp = TempDir::new().unwrap();
        let (target, policy) = fixture(&tmp, "Alpha");
        let worker = BackupWorker::new(None).unwrap();

        let outcome = worker
            .submit_restore(target, tmp.path().join("missing"), policy)
            .wait()
            .unwrap();
        assert!(!outcome.success());
    }
}
