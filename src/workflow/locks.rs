//! Per-job mutual exclusion
//!
//! Conversions and deletions of the same import job are serialized; jobs do
//! not block each other.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::OwnedMutexGuard;
use uuid::Uuid;

/// Keyed async locks, one per import job
///
/// An entry lives only while some caller holds or waits for it, so ids that
/// never name a job leave nothing behind.
#[derive(Debug, Default)]
pub struct JobLocks {
    locks: Mutex<HashMap<Uuid, Arc<tokio::sync::Mutex<()>>>>,
}

/// Exclusive access to one job; releasing it drops the idle entry
#[derive(Debug)]
pub struct JobLockGuard<'a> {
    locks: &'a JobLocks,
    job_id: Uuid,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for JobLockGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.locks.release(self.job_id);
    }
}

impl JobLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `job_id`
    pub async fn acquire(&self, job_id: Uuid) -> JobLockGuard<'_> {
        let lock = {
            let mut locks = self.entries();
            locks.entry(job_id).or_default().clone()
        };
        let guard = lock.lock_owned().await;
        JobLockGuard {
            locks: self,
            job_id,
            guard: Some(guard),
        }
    }

    /// Number of jobs with a lock entry
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn release(&self, job_id: Uuid) {
        let mut locks = self.entries();
        // Clones are only taken under the map lock, so a count of one means no waiters
        if locks.get(&job_id).is_some_and(|l| Arc::strong_count(l) == 1) {
            locks.remove(&job_id);
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<Uuid, Arc<tokio::sync::Mutex<()>>>> {
        self.locks.lock().unwrap_or_else(|e| e.into_inner())
    }
}
